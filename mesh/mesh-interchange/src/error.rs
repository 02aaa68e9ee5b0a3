//! Error types for mesh interchange operations.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::registry::ReadSummary;

/// Result type for mesh interchange operations.
pub type IoResult<T> = Result<T, IoError>;

/// Errors that can occur while reading or writing meshes.
#[derive(Debug, Error)]
pub enum IoError {
    /// The underlying resource could not be opened or read.
    #[error("cannot access {message}")]
    FileAccess {
        /// Resource and description of the failure.
        message: String,
    },

    /// Structurally invalid content (missing header, short mandatory data).
    #[error("invalid file content: {message}")]
    FileParsing {
        /// Description of what was invalid.
        message: String,
    },

    /// Structurally valid content without usable geometry.
    #[error("no usable geometry: {message}")]
    GarbageData {
        /// Description of what was missing.
        message: String,
    },

    /// No registered handler for the extension.
    #[error("format {extension} is not supported")]
    UnknownFormat {
        /// The unrecognized extension.
        extension: String,
    },

    /// The path has no parsable extension.
    #[error("cannot determine the extension of {path}")]
    InvalidFilename {
        /// The offending path.
        path: PathBuf,
    },

    /// A format handler claims an extension that is already registered.
    #[error("format {extension} is already registered")]
    DuplicateFormat {
        /// The conflicting extension.
        extension: String,
    },

    /// Unexpected fault raised while reading, or reader misuse.
    #[error("reader error: {message}")]
    GenericReader {
        /// Original message of the fault.
        message: String,
    },

    /// The meshes handed to a writer cannot be represented by the format.
    #[error("cannot write: {message}")]
    InvalidInput {
        /// Why the input was rejected.
        message: String,
    },

    /// The read was cancelled through its cancellation token.
    #[error("read cancelled")]
    Cancelled,

    /// I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Float parsing error.
    #[error("float parsing error: {0}")]
    ParseFloat(#[from] std::num::ParseFloatError),

    /// Integer parsing error.
    #[error("integer parsing error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),
}

impl IoError {
    /// Create a `FileAccess` error for `path`.
    #[must_use]
    pub fn access(path: &Path, error: &std::io::Error) -> Self {
        Self::FileAccess {
            message: format!("{} for reading: {error}", path.display()),
        }
    }

    /// Create a `FileParsing` error with the given message.
    #[must_use]
    pub fn parsing(message: impl Into<String>) -> Self {
        Self::FileParsing {
            message: message.into(),
        }
    }

    /// Create a `GarbageData` error with the given message.
    #[must_use]
    pub fn garbage(message: impl Into<String>) -> Self {
        Self::GarbageData {
            message: message.into(),
        }
    }

    /// Create an `InvalidInput` error with the given message.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a `GenericReader` error with the given message.
    #[must_use]
    pub fn generic(message: impl Into<String>) -> Self {
        Self::GenericReader {
            message: message.into(),
        }
    }

    /// Result code of this error.
    #[must_use]
    pub const fn code(&self) -> IoCode {
        match self {
            Self::FileAccess { .. } => IoCode::FileAccessError,
            Self::FileParsing { .. } => IoCode::FileParsingError,
            Self::GarbageData { .. } => IoCode::GarbageDataError,
            Self::UnknownFormat { .. } => IoCode::UnknownFormatError,
            Self::InvalidFilename { .. } => IoCode::InvalidFilenameError,
            Self::DuplicateFormat { .. } => IoCode::DuplicateFormatError,
            Self::InvalidInput { .. } => IoCode::InvalidInputError,
            Self::Cancelled => IoCode::Cancelled,
            Self::GenericReader { .. }
            | Self::Io(_)
            | Self::ParseFloat(_)
            | Self::ParseInt(_) => IoCode::GenericReaderError,
        }
    }

    /// Convert low-level faults into `GenericReader`, keeping their message.
    ///
    /// Structural errors produced on purpose by a parser are returned as-is.
    #[must_use]
    pub fn into_reader_fault(self) -> Self {
        match self {
            Self::Io(_) | Self::ParseFloat(_) | Self::ParseInt(_) => Self::GenericReader {
                message: self.to_string(),
            },
            other => other,
        }
    }
}

/// Result codes of a read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoCode {
    /// Success.
    Ok,
    /// Cannot open or read the underlying resource.
    FileAccessError,
    /// Structurally invalid content.
    FileParsingError,
    /// Structurally valid but empty or unusable content.
    GarbageDataError,
    /// No registered handler.
    UnknownFormatError,
    /// No parsable extension.
    InvalidFilenameError,
    /// Registration conflict.
    DuplicateFormatError,
    /// Catch-all for unexpected faults.
    GenericReaderError,
    /// Writer input not representable by the format.
    InvalidInputError,
    /// Cancelled through a cancellation token.
    Cancelled,
}

impl fmt::Display for IoCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Flat outcome of a read: a code and a human readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResult {
    /// Result code.
    pub code: IoCode,
    /// Message, empty on success.
    pub message: String,
}

impl ReadResult {
    /// Whether the read succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.code == IoCode::Ok
    }
}

impl From<IoResult<ReadSummary>> for ReadResult {
    fn from(result: IoResult<ReadSummary>) -> Self {
        match result {
            Ok(_) => Self {
                code: IoCode::Ok,
                message: String::new(),
            },
            Err(e) => Self {
                code: e.code(),
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_variants() {
        assert_eq!(IoError::parsing("x").code(), IoCode::FileParsingError);
        assert_eq!(IoError::garbage("x").code(), IoCode::GarbageDataError);
        assert_eq!(IoError::Cancelled.code(), IoCode::Cancelled);
        let io = IoError::from(std::io::Error::other("boom"));
        assert_eq!(io.code(), IoCode::GenericReaderError);
    }

    #[test]
    fn faults_keep_their_message() {
        let fault = "abc".parse::<f64>().map_err(IoError::from);
        let Err(fault) = fault else {
            panic!("expected a parse failure");
        };
        let converted = fault.into_reader_fault();
        assert!(matches!(converted, IoError::GenericReader { .. }));
        assert!(converted.to_string().contains("float parsing error"));

        let structural = IoError::garbage("no vertices").into_reader_fault();
        assert!(matches!(structural, IoError::GarbageData { .. }));
    }

    #[test]
    fn read_result_from_error() {
        let result = ReadResult::from(Err(IoError::UnknownFormat {
            extension: "xyz".into(),
        }));
        assert_eq!(result.code, IoCode::UnknownFormatError);
        assert!(result.message.contains("xyz"));
        assert!(!result.is_ok());
    }
}
