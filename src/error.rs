//! Error types for colloquy.
//!
//! Every failure a session can hit is one variant of [`Error`].  Errors fall into three
//! operator-facing families (see [`Error::is_user_input`], [`Error::is_attachment`], and
//! [`Error::is_completion_engine`]) and all of them render as a single line suitable for
//! reporting back at the prompt.

use std::error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The main error type for colloquy.
#[derive(Clone, Debug)]
pub enum Error {
    /// A `model` command named a key that is not in the registry.
    InvalidModelKey {
        /// The key the operator supplied.
        key: String,
    },

    /// A command argument was missing or could not be parsed.
    InvalidArgument {
        /// Human-readable error message.
        message: String,
        /// The command whose argument was rejected.
        param: Option<String>,
    },

    /// An attachment path does not name a regular file.
    FileNotFound {
        /// The offending path.
        path: PathBuf,
    },

    /// An attachment is larger than the size guard allows.
    FileTooLarge {
        /// The offending path.
        path: PathBuf,
        /// Size of the file in bytes.
        size: u64,
        /// Largest accepted size in bytes.
        limit: u64,
    },

    /// A non-image attachment is not valid UTF-8 text.
    UnsupportedBinary {
        /// The offending path.
        path: PathBuf,
    },

    /// Text could not be extracted from a PDF attachment.
    PdfExtraction {
        /// The offending path.
        path: PathBuf,
        /// Human-readable error message.
        message: String,
    },

    /// The completion engine failed to produce a response.
    CompletionEngine {
        /// Human-readable error message.
        message: String,
        /// HTTP status code, when the failure came from an HTTP response.
        status_code: Option<u16>,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// No credential is available for the completion engine.
    Authentication {
        /// Human-readable error message.
        message: String,
    },

    /// I/O error.
    Io {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },

    /// Error during JSON serialization or deserialization.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new invalid model key error.
    pub fn invalid_model_key(key: impl Into<String>) -> Self {
        Error::InvalidModelKey { key: key.into() }
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(message: impl Into<String>, param: Option<String>) -> Self {
        Error::InvalidArgument {
            message: message.into(),
            param,
        }
    }

    /// Creates a new file not found error.
    pub fn file_not_found(path: impl AsRef<Path>) -> Self {
        Error::FileNotFound {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Creates a new file too large error.
    pub fn file_too_large(path: impl AsRef<Path>, size: u64, limit: u64) -> Self {
        Error::FileTooLarge {
            path: path.as_ref().to_path_buf(),
            size,
            limit,
        }
    }

    /// Creates a new unsupported binary error.
    pub fn unsupported_binary(path: impl AsRef<Path>) -> Self {
        Error::UnsupportedBinary {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Creates a new PDF extraction error.
    pub fn pdf_extraction(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Error::PdfExtraction {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Creates a new completion engine error.
    pub fn completion_engine(
        message: impl Into<String>,
        status_code: Option<u16>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::CompletionEngine {
            message: message.into(),
            status_code,
            source: source.map(Arc::from),
        }
    }

    /// Creates a new authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            message: message.into(),
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Returns true if this error was caused by operator input: an unknown model key, a bad
    /// command argument, or a missing or oversized file.
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            Error::InvalidModelKey { .. }
                | Error::InvalidArgument { .. }
                | Error::FileNotFound { .. }
                | Error::FileTooLarge { .. }
        )
    }

    /// Returns true if this error means an attachment was skipped.
    pub fn is_attachment(&self) -> bool {
        matches!(
            self,
            Error::FileNotFound { .. }
                | Error::FileTooLarge { .. }
                | Error::UnsupportedBinary { .. }
                | Error::PdfExtraction { .. }
        )
    }

    /// Returns true if this error came from the completion engine.
    pub fn is_completion_engine(&self) -> bool {
        matches!(
            self,
            Error::CompletionEngine { .. } | Error::Authentication { .. }
        )
    }

    /// Returns true if this error is an unknown model key.
    pub fn is_invalid_model_key(&self) -> bool {
        matches!(self, Error::InvalidModelKey { .. })
    }

    /// Returns true if this error is an invalid argument.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument { .. })
    }

    /// Returns the path associated with this error, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Error::FileNotFound { path }
            | Error::FileTooLarge { path, .. }
            | Error::UnsupportedBinary { path }
            | Error::PdfExtraction { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Returns the status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::CompletionEngine { status_code, .. } => *status_code,
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidModelKey { key } => {
                write!(f, "Invalid model key: {key}")
            }
            Error::InvalidArgument { message, param } => {
                if let Some(param) = param {
                    write!(f, "Invalid argument: {message} (command: {param})")
                } else {
                    write!(f, "Invalid argument: {message}")
                }
            }
            Error::FileNotFound { path } => {
                write!(f, "File does not exist: {}", path.display())
            }
            Error::FileTooLarge { path, size, limit } => {
                write!(
                    f,
                    "File size exceeds {} bytes: {} ({size} bytes)",
                    limit,
                    path.display()
                )
            }
            Error::UnsupportedBinary { path } => {
                write!(
                    f,
                    "File {} appears to be binary and not an image; only text, PDF, and image files are supported",
                    path.display()
                )
            }
            Error::PdfExtraction { path, message } => {
                write!(f, "Error processing PDF file {}: {message}", path.display())
            }
            Error::CompletionEngine {
                message,
                status_code,
                ..
            } => {
                if let Some(status_code) = status_code {
                    write!(f, "Completion engine error: {message} (status {status_code})")
                } else {
                    write!(f, "Completion engine error: {message}")
                }
            }
            Error::Authentication { message } => {
                write!(f, "Authentication error: {message}")
            }
            Error::Io { message, .. } => {
                write!(f, "I/O error: {message}")
            }
            Error::Serialization { message, .. } => {
                write!(f, "Serialization error: {message}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::CompletionEngine { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source),
            Error::Serialization { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

/// A specialized Result type for colloquy operations.
pub type Result<T> = std::result::Result<T, Error>;
