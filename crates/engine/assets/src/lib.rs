//! Content-addressed asset management
//!
//! Assets are units of loadable content keyed by a stable hashed name
//! (see [`skein_core::hash_name`]). The [`AssetManager`] reference-counts
//! them, tracks their dependency graph, streams their bytes from disk on a
//! private IO thread, decompresses on a private decompression thread, runs
//! format-specific decoding on the worker thread their [`AssetScheme`]
//! selects, and publishes the result atomically to consumers. A
//! line-oriented TCP channel triggers hot reloads during development.
//!
//! See the module docs of [`manager`] for the threading contract.

pub mod format;
pub mod manager;
pub mod record;
pub mod scheme;

pub use manager::{AssetManager, AssetManagerConfig, FindHook};
pub use record::{AssetRecord, AssetState, Payload};
pub use scheme::{
    pack_scheme, raw_scheme, scheme_index, zlib_decompress, AssetContext, AssetScheme,
};

use skein_core::Severity;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetsError {
    /// File missing, truncated, or unreadable.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad magic, version mismatch, or a bounds violation in the file.
    #[error("format error: {0}")]
    Format(String),

    /// Operation called against a record whose state forbids it.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl AssetsError {
    /// Severity this kind of error is logged with.
    pub fn severity(&self) -> Severity {
        match self {
            AssetsError::Io(_) => Severity::Error,
            AssetsError::Format(_) => Severity::Error,
            AssetsError::InvalidState(_) => Severity::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_carry_a_severity() {
        let io: AssetsError = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert_eq!(io.severity(), Severity::Error);
        assert_eq!(AssetsError::Format("bad magic".into()).severity(), Severity::Error);
        assert_eq!(AssetsError::InvalidState("not fabricated".into()).severity(), Severity::Error);
    }
}
