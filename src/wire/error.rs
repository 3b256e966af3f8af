//! Protocol error types.

use crate::violation::Violation;
use thiserror::Error;

/// Errors produced while decoding or encoding wire structures.
///
/// Every variant except `ValidationFailed` is a parse failure: the bytes
/// are malformed and no partial structure is returned. `ValidationFailed`
/// exists so callers that prefer a single error type can lift a
/// [`Violation`] into the same enum with `?`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("insufficient data for {at}: expected at least {expected}, got {got}")]
    InsufficientData {
        at: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("unsupported path type: {0}")]
    UnsupportedPathType(u8),

    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    #[error("wrong option type: expected 0x{expected:02x}, got 0x{got:02x}")]
    WrongOptionType { expected: u8, got: u8 },

    #[error("digest mismatch: carried {carried}, computed {computed}")]
    DigestMismatch { carried: String, computed: String },

    #[error("hop limit exceeded: at most {max} hops")]
    TooManyHops { max: usize },

    #[error("validation failed: {0}")]
    ValidationFailed(#[from] Violation),
}

impl ProtocolError {
    /// Check whether this error came from malformed bytes rather than a
    /// policy or trust decision.
    pub fn is_parse_error(&self) -> bool {
        !matches!(self, ProtocolError::ValidationFailed(_))
    }

    pub(crate) fn short(at: &'static str, expected: usize, got: usize) -> Self {
        ProtocolError::InsufficientData { at, expected, got }
    }
}

/// Ensure `buf` holds at least `expected` bytes.
pub(crate) fn require(buf: &[u8], at: &'static str, expected: usize) -> Result<(), ProtocolError> {
    if buf.len() < expected {
        return Err(ProtocolError::short(at, expected, buf.len()));
    }
    Ok(())
}
