//! Configuration registry
//!
//! A hierarchical key/value store with keys like `subsystem/name`. Values
//! keep the type they were last written with; reads under a different type
//! coerce through the narrowest safe numeric conversion, with strings
//! round-tripping through their textual form.
//!
//! The registry is an explicit object threaded through construction; a
//! process-wide instance is available through [`global`] for code that has
//! no context to carry one.

mod ini;
mod value;

pub use ini::IniError;
pub use value::{ConfigType, ConfigValue};

use std::collections::BTreeMap;
use std::sync::OnceLock;

use parking_lot::Mutex;

/// Thread-safe key/value registry. One mutex guards the whole map.
#[derive(Default)]
pub struct ConfigRegistry {
    values: Mutex<BTreeMap<String, ConfigValue>>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: &str, value: ConfigValue) {
        self.values.lock().insert(name.to_string(), value);
    }

    /// Stores a string, reinterpreting it as the most specific type it
    /// parses as (bool, integer, float, then string).
    pub fn set_dynamic(&self, name: &str, value: &str) {
        self.set(name, ConfigValue::from_text(value));
    }

    pub fn get(&self, name: &str) -> Option<ConfigValue> {
        self.values.lock().get(name).cloned()
    }

    /// Type of the stored value, if any.
    pub fn get_type(&self, name: &str) -> Option<ConfigType> {
        self.values.lock().get(name).map(|v| v.config_type())
    }

    pub fn remove(&self, name: &str) {
        self.values.lock().remove(name);
    }

    pub fn clear(&self) {
        self.values.lock().clear();
    }

    /// All keys in lexicographic order.
    pub fn names(&self) -> Vec<String> {
        self.values.lock().keys().cloned().collect()
    }

    pub fn set_bool(&self, name: &str, v: bool) {
        self.set(name, ConfigValue::Bool(v));
    }
    pub fn set_s32(&self, name: &str, v: i32) {
        self.set(name, ConfigValue::Sint32(v));
    }
    pub fn set_u32(&self, name: &str, v: u32) {
        self.set(name, ConfigValue::Uint32(v));
    }
    pub fn set_s64(&self, name: &str, v: i64) {
        self.set(name, ConfigValue::Sint64(v));
    }
    pub fn set_u64(&self, name: &str, v: u64) {
        self.set(name, ConfigValue::Uint64(v));
    }
    pub fn set_float(&self, name: &str, v: f32) {
        self.set(name, ConfigValue::Float(v));
    }
    pub fn set_double(&self, name: &str, v: f64) {
        self.set(name, ConfigValue::Double(v));
    }
    pub fn set_string(&self, name: &str, v: &str) {
        self.set(name, ConfigValue::String(v.to_string()));
    }

    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        self.get(name).map(|v| v.as_bool()).unwrap_or(default)
    }
    pub fn get_s32(&self, name: &str, default: i32) -> i32 {
        self.get(name).map(|v| v.as_s64() as i32).unwrap_or(default)
    }
    pub fn get_u32(&self, name: &str, default: u32) -> u32 {
        self.get(name).map(|v| v.as_u64() as u32).unwrap_or(default)
    }
    pub fn get_s64(&self, name: &str, default: i64) -> i64 {
        self.get(name).map(|v| v.as_s64()).unwrap_or(default)
    }
    pub fn get_u64(&self, name: &str, default: u64) -> u64 {
        self.get(name).map(|v| v.as_u64()).unwrap_or(default)
    }
    pub fn get_float(&self, name: &str, default: f32) -> f32 {
        self.get(name).map(|v| v.as_f64() as f32).unwrap_or(default)
    }
    pub fn get_double(&self, name: &str, default: f64) -> f64 {
        self.get(name).map(|v| v.as_f64()).unwrap_or(default)
    }
    pub fn get_string(&self, name: &str, default: &str) -> String {
        self.get(name).map(|v| v.as_text()).unwrap_or_else(|| default.to_string())
    }
}

/// The process-wide registry.
pub fn global() -> &'static ConfigRegistry {
    static GLOBAL: OnceLock<ConfigRegistry> = OnceLock::new();
    GLOBAL.get_or_init(ConfigRegistry::new)
}
