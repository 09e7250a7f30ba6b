//! INI import/export for the configuration registry.
//!
//! `[section] key=value` maps to the registry key `section/key`. Nested
//! registry keys keep everything up to the last slash as their section.

use skein_core::Severity;
use thiserror::Error;
use tracing::warn;

use crate::ConfigRegistry;

#[derive(Error, Debug)]
pub enum IniError {
    #[error("ini parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

impl IniError {
    /// Severity this kind of error is logged with.
    pub fn severity(&self) -> Severity {
        match self {
            IniError::Parse { .. } => Severity::Error,
        }
    }
}

impl ConfigRegistry {
    /// Parses INI text into the registry. Existing keys are overwritten;
    /// unknown lines fail, comments (`#`, `;`) and blanks are skipped.
    pub fn import_ini(&self, text: &str) -> Result<(), IniError> {
        let mut section = String::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[') {
                let name = name.strip_suffix(']').ok_or(IniError::Parse {
                    line: idx + 1,
                    message: "unterminated section header".into(),
                })?;
                section = name.trim().to_string();
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(IniError::Parse {
                    line: idx + 1,
                    message: format!("expected key=value, got '{line}'"),
                });
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(IniError::Parse { line: idx + 1, message: "empty key".into() });
            }
            let full = if section.is_empty() {
                key.to_string()
            } else {
                format!("{section}/{key}")
            };
            self.set_dynamic(&full, value.trim());
        }
        Ok(())
    }

    /// Renders the registry as INI text, one section per key prefix,
    /// deterministically ordered.
    pub fn export_ini(&self) -> String {
        let mut out = String::new();
        let mut current_section: Option<String> = None;
        for name in self.names() {
            let Some(value) = self.get(&name) else { continue };
            let (section, key) = match name.rsplit_once('/') {
                Some((s, k)) => (s.to_string(), k.to_string()),
                None => {
                    warn!(target: "config", name = %name, "key without section is not representable in ini, skipped");
                    continue;
                }
            };
            if current_section.as_deref() != Some(section.as_str()) {
                if current_section.is_some() {
                    out.push('\n');
                }
                out.push_str(&format!("[{section}]\n"));
                current_section = Some(section);
            }
            out.push_str(&format!("{key}={}\n", value.as_text()));
        }
        out
    }
}
