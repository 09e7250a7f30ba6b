//! Typed configuration values and their coercions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigType {
    Bool,
    Sint32,
    Uint32,
    Sint64,
    Uint64,
    Float,
    Double,
    String,
}

/// A configuration value in the type it was last written with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigValue {
    Bool(bool),
    Sint32(i32),
    Uint32(u32),
    Sint64(i64),
    Uint64(u64),
    Float(f32),
    Double(f64),
    String(String),
}

impl ConfigValue {
    pub fn config_type(&self) -> ConfigType {
        match self {
            ConfigValue::Bool(_) => ConfigType::Bool,
            ConfigValue::Sint32(_) => ConfigType::Sint32,
            ConfigValue::Uint32(_) => ConfigType::Uint32,
            ConfigValue::Sint64(_) => ConfigType::Sint64,
            ConfigValue::Uint64(_) => ConfigType::Uint64,
            ConfigValue::Float(_) => ConfigType::Float,
            ConfigValue::Double(_) => ConfigType::Double,
            ConfigValue::String(_) => ConfigType::String,
        }
    }

    /// Parses text into the most specific value type: bool, then signed or
    /// unsigned integer, then floating point, falling back to a string.
    pub fn from_text(s: &str) -> Self {
        let t = s.trim();
        match t {
            "true" | "yes" | "on" => return ConfigValue::Bool(true),
            "false" | "no" | "off" => return ConfigValue::Bool(false),
            _ => {}
        }
        if let Ok(v) = t.parse::<u64>() {
            return ConfigValue::Uint64(v);
        }
        if let Ok(v) = t.parse::<i64>() {
            return ConfigValue::Sint64(v);
        }
        if let Ok(v) = t.parse::<f64>() {
            return ConfigValue::Double(v);
        }
        ConfigValue::String(s.to_string())
    }

    pub fn as_bool(&self) -> bool {
        match self {
            ConfigValue::Bool(v) => *v,
            ConfigValue::String(s) => matches!(s.trim(), "true" | "yes" | "on" | "1"),
            other => other.as_s64() != 0,
        }
    }

    pub fn as_s64(&self) -> i64 {
        match self {
            ConfigValue::Bool(v) => *v as i64,
            ConfigValue::Sint32(v) => *v as i64,
            ConfigValue::Uint32(v) => *v as i64,
            ConfigValue::Sint64(v) => *v,
            ConfigValue::Uint64(v) => *v as i64,
            ConfigValue::Float(v) => *v as i64,
            ConfigValue::Double(v) => *v as i64,
            ConfigValue::String(s) => {
                let t = s.trim();
                t.parse::<i64>().unwrap_or_else(|_| t.parse::<f64>().map(|f| f as i64).unwrap_or(0))
            }
        }
    }

    pub fn as_u64(&self) -> u64 {
        match self {
            ConfigValue::Bool(v) => *v as u64,
            ConfigValue::Sint32(v) => (*v).max(0) as u64,
            ConfigValue::Uint32(v) => *v as u64,
            ConfigValue::Sint64(v) => (*v).max(0) as u64,
            ConfigValue::Uint64(v) => *v,
            ConfigValue::Float(v) => *v as u64,
            ConfigValue::Double(v) => *v as u64,
            ConfigValue::String(s) => {
                let t = s.trim();
                t.parse::<u64>().unwrap_or_else(|_| t.parse::<f64>().map(|f| f as u64).unwrap_or(0))
            }
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            ConfigValue::Bool(v) => *v as u8 as f64,
            ConfigValue::Sint32(v) => *v as f64,
            ConfigValue::Uint32(v) => *v as f64,
            ConfigValue::Sint64(v) => *v as f64,
            ConfigValue::Uint64(v) => *v as f64,
            ConfigValue::Float(v) => *v as f64,
            ConfigValue::Double(v) => *v,
            ConfigValue::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        }
    }

    /// Textual form; numeric values print in their natural notation.
    pub fn as_text(&self) -> String {
        match self {
            ConfigValue::Bool(v) => v.to_string(),
            ConfigValue::Sint32(v) => v.to_string(),
            ConfigValue::Uint32(v) => v.to_string(),
            ConfigValue::Sint64(v) => v.to_string(),
            ConfigValue::Uint64(v) => v.to_string(),
            ConfigValue::Float(v) => v.to_string(),
            ConfigValue::Double(v) => v.to_string(),
            ConfigValue::String(s) => s.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_text_priorities() {
        assert_eq!(ConfigValue::from_text("true"), ConfigValue::Bool(true));
        assert_eq!(ConfigValue::from_text("17"), ConfigValue::Uint64(17));
        assert_eq!(ConfigValue::from_text("-17"), ConfigValue::Sint64(-17));
        assert_eq!(ConfigValue::from_text("0.5"), ConfigValue::Double(0.5));
        assert_eq!(ConfigValue::from_text("abc"), ConfigValue::String("abc".into()));
    }

    #[test]
    fn text_round_trip_for_numbers() {
        let v = ConfigValue::Uint32(42);
        assert_eq!(ConfigValue::from_text(&v.as_text()).as_u64(), 42);
        let f = ConfigValue::Double(1.25);
        assert_eq!(ConfigValue::from_text(&f.as_text()).as_f64(), 1.25);
    }

    #[test]
    fn negative_to_unsigned_clamps() {
        assert_eq!(ConfigValue::Sint32(-5).as_u64(), 0);
    }
}
