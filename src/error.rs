//! # Error Types
//!
//! Custom error types for the AGT codec using `thiserror`.

use thiserror::Error;

/// Main error type for the AGT codec
#[derive(Debug, Error)]
pub enum AgtError {
    /// Field ID is not in the registry
    #[error("unknown field ID 0x{0:02X}")]
    UnknownField(u8),

    /// Missing or misplaced STX/ETX framing, or an undecodable record
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Buffer ended before a field's declared payload
    #[error("truncated message: {context} needs {needed} bytes at offset {offset}, {available} available")]
    TruncatedMessage {
        context: String,
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Received checksum does not match the recomputed one
    #[error("checksum mismatch: expected {expected_a:02X} {expected_b:02X}, got {found_a:02X} {found_b:02X}")]
    ChecksumMismatch {
        expected_a: u8,
        expected_b: u8,
        found_a: u8,
        found_b: u8,
    },

    /// Caller value failed type or range validation (encode side)
    #[error("invalid value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Hex input that does not parse
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl AgtError {
    /// Stable short code identifying the failure kind
    pub fn code(&self) -> &'static str {
        match self {
            AgtError::UnknownField(_) => "UNKNOWN_FIELD",
            AgtError::MalformedMessage(_) => "MALFORMED_MESSAGE",
            AgtError::TruncatedMessage { .. } => "TRUNCATED_MESSAGE",
            AgtError::ChecksumMismatch { .. } => "CHECKSUM_MISMATCH",
            AgtError::InvalidFieldValue { .. } => "INVALID_FIELD_VALUE",
            AgtError::Config(_) => "CONFIG",
            AgtError::Io(_) => "IO",
            AgtError::Json(_) => "JSON",
            AgtError::Hex(_) => "HEX",
        }
    }

    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AgtError::InvalidFieldValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for the AGT codec
pub type Result<T> = std::result::Result<T, AgtError>;
