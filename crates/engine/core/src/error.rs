//! Engine-wide error kinds.
//!
//! Every failure class used across the engine crates maps onto one variant
//! here. Each kind carries a [`Severity`]; Critical errors are expected to
//! be fatal after logging.

use thiserror::Error;

/// How serious an error is when it reaches a log sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Supplementary context attached to another error.
    Note,
    /// Recoverable; the operation degraded but the engine continues.
    Warning,
    /// The operation failed.
    Error,
    /// The engine cannot continue; abort after logging.
    Critical,
}

/// Common engine error.
#[derive(Error, Debug)]
pub enum EngineError {
    /// File missing, truncated, or inaccessible.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad magic, version mismatch, or out-of-bounds field.
    #[error("format error: {0}")]
    Format(String),

    /// An operation was called in a state that forbids it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An allocator policy signalled exhaustion explicitly.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// Wrapped OS-level error code.
    #[error("system error {code}: {context}")]
    System { code: i32, context: String },

    /// Explicit sentinel for an unimplemented path.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// A child process pipe closed before the expected data arrived.
    #[error("process pipe eof")]
    ProcessPipeEof,

    /// A deserializer ran out of input.
    #[error("not enough data: expected {expected} more bytes, {available} available")]
    NotEnoughData { expected: usize, available: usize },
}

impl EngineError {
    /// Severity this kind of error is logged with.
    pub fn severity(&self) -> Severity {
        match self {
            EngineError::Io(_) => Severity::Error,
            EngineError::Format(_) => Severity::Error,
            EngineError::InvalidState(_) => Severity::Error,
            EngineError::OutOfMemory(_) => Severity::Critical,
            EngineError::System { .. } => Severity::Error,
            EngineError::NotImplemented(_) => Severity::Critical,
            EngineError::ProcessPipeEof => Severity::Warning,
            EngineError::NotEnoughData { .. } => Severity::Error,
        }
    }
}

/// Convenience result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Note < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn out_of_memory_is_critical() {
        let e = EngineError::OutOfMemory("arena exhausted".into());
        assert_eq!(e.severity(), Severity::Critical);
    }
}
