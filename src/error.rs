//! Error taxonomy for the store
//!
//! Information Hiding:
//! - Underlying io/serde failures wrapped with the path or operation that failed
//! - Callers branch on the error kind, never on message text

use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Sanitization rejected the identifier
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// Resolved path left the data root after sanitization
    #[error("path escapes the data root: {}", .0.display())]
    PathEscape(PathBuf),

    /// File exists but is empty, unparsable, or missing required fields
    #[error("corrupt document at {}: {reason}", .path.display())]
    CorruptDocument { path: PathBuf, reason: String },

    #[error("{len} items exceed queue capacity {capacity}")]
    CapacityExceeded { len: usize, capacity: usize },

    /// An externally supplied value failed the validation gate
    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("storage I/O failed ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptDocument {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidValue {
            field,
            reason: reason.into(),
        }
    }

    /// Errors the end user can fix by changing their input
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            Error::InvalidKey(_) | Error::CapacityExceeded { .. } | Error::InvalidValue { .. }
        )
    }

    /// Errors that mean the data directory cannot be trusted right now
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            Error::Io { .. } | Error::CorruptDocument { .. } | Error::PathEscape(_)
        )
    }

    /// Message suitable for showing to a chat user.
    ///
    /// Storage failures collapse into one generic message; the detail belongs
    /// in the operator log, not in the channel.
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidKey(reason) => {
                format!("That name can't be used for storage ({reason}). Try a different one.")
            }
            Error::CapacityExceeded { len, capacity } => format!(
                "The conversation holds {len} messages but the history limit is {capacity}. \
                 Clear the history or raise the limit."
            ),
            Error::InvalidValue { field, reason } => format!("Invalid {field}: {reason}."),
            Error::PathEscape(_) | Error::CorruptDocument { .. } | Error::Io { .. } => {
                "Storage is currently unavailable. Please try again later.".to_string()
            }
        }
    }
}
