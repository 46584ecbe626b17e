//! Error types for the MIDI-to-tensor codec

use thiserror::Error;

/// Custom error type for encoding and decoding
#[derive(Debug, Error)]
pub enum CodecError {
    /// E001: Input is not the expected event-stream or message shape,
    /// including multi-independent-track (type 2) layouts
    #[error("E001: Type mismatch - expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// E002: A note-on message lacks a required field
    #[error("E002: Malformed event - {0}")]
    MalformedEvent(String),

    /// E003: Pitch outside every instrument class while unclassified pitches are rejected
    #[error("E003: Pitch {0} does not belong to any instrument class")]
    UnclassifiedPitch(u8),

    /// E004: Time grid cannot be built from the given parameters
    #[error("E004: Invalid context - {0}")]
    InvalidContext(String),

    /// E005: Encoding or batch option out of range
    #[error("E005: Invalid option - {0}")]
    InvalidOption(String),

    /// E006: Configuration validation failed
    #[error("E006: Configuration validation failed - {0}")]
    ConfigValidationFailed(String),

    /// E007: Standard MIDI file could not be parsed
    #[error("E007: MIDI parse error - {0}")]
    MidiParse(String),

    /// E008: File I/O error
    #[error("E008: I/O error - {0}")]
    Io(String),

    /// E009: Tensor or MIDI export error
    #[error("E009: Export error - {0}")]
    Export(String),

    /// E010: Encoding one file of a batch failed
    #[error("E010: Encoding '{file}' failed - {source}")]
    FileFailed {
        file: String,
        #[source]
        source: Box<CodecError>,
    },
}

impl CodecError {
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        CodecError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Attach the identity of the file being encoded
    pub fn in_file(self, file: impl Into<String>) -> Self {
        CodecError::FileFailed {
            file: file.into(),
            source: Box::new(self),
        }
    }
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        CodecError::Io(format!("File I/O error: {}", err))
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::Export(format!("JSON serialization error: {}", err))
    }
}

impl From<midly::Error> for CodecError {
    fn from(err: midly::Error) -> Self {
        CodecError::MidiParse(err.to_string())
    }
}

impl From<anyhow::Error> for CodecError {
    fn from(err: anyhow::Error) -> Self {
        CodecError::ConfigValidationFailed(format!("Generic error: {}", err))
    }
}

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;
