// src/utils/errors.rs
//! Error types for the engine
//!
//! Errors raised inside an interception shim cannot be reported to the host
//! application through its own API, so every variant is classified as either
//! fatal (the shim aborts the process) or recoverable (logged and skipped).

use thiserror::Error;

/// Engine result alias
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by the engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Function prologue does not match any supported signature
    #[error("unknown function prologue at {address:#x}: {bytes:02X?}")]
    UnknownPrologue { address: usize, bytes: [u8; 5] },

    /// Hook installed twice without an intervening reset
    #[error("hook already installed at {0:#x}")]
    HookAlreadyInstalled(usize),

    /// Changing page protection or allocating executable memory failed
    #[error("memory protection error: {0}")]
    MemoryProtection(String),

    /// Operation not available on this platform or architecture
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A required export could not be resolved
    #[error("export not found: {0}")]
    ExportNotFound(String),

    /// Frame header declares an impossible length
    #[error("malformed frame at offset {offset}: declared length {length}, {available} bytes available")]
    MalformedFrame {
        offset: usize,
        length: usize,
        available: usize,
    },

    /// A single send call exceeds the staging buffer
    #[error("frame of {size} bytes exceeds staging capacity {capacity}")]
    FrameTooLarge { size: usize, capacity: usize },

    /// Known message type with a payload shorter than its fixed layout
    #[error("truncated {kind} message: {actual} bytes, expected at least {expected}")]
    Truncated {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Client referenced an entity other than the emulated player
    #[error("entity mismatch: expected {expected}, got {actual}")]
    EntityMismatch { expected: u32, actual: u32 },

    /// String pack write would run past its region
    #[error("string pack overflow: need {needed} bytes, region holds {capacity}")]
    StringPackOverflow { needed: usize, capacity: usize },

    /// Text does not fit a fixed-size wire field
    #[error("field {field} holds at most {max} bytes, got {actual}")]
    FieldTooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl EngineError {
    /// Whether the error leaves the emulation in an unrecoverable state
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::UnknownPrologue { .. }
                | EngineError::HookAlreadyInstalled(_)
                | EngineError::MemoryProtection(_)
                | EngineError::MalformedFrame { .. }
                | EngineError::FrameTooLarge { .. }
                | EngineError::EntityMismatch { .. }
        )
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(EngineError::EntityMismatch { expected: 1, actual: 2 }.is_fatal());
        assert!(EngineError::FrameTooLarge { size: 9000, capacity: 8192 }.is_fatal());
        assert!(!EngineError::Truncated { kind: "Action", expected: 24, actual: 8 }.is_fatal());
        assert!(!EngineError::ConfigError("bad".into()).is_fatal());
    }

    #[test]
    fn test_display() {
        let err = EngineError::UnknownPrologue {
            address: 0x1000,
            bytes: [0x90, 0x90, 0x90, 0x90, 0x90],
        };
        assert_eq!(
            err.to_string(),
            "unknown function prologue at 0x1000: [90, 90, 90, 90, 90]"
        );
    }
}
