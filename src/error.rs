//! Error taxonomy for board operations.
//!
//! Every fallible library call returns [`BoardError`]. The variants map onto
//! what the UI does with them: validation failures are refused up front,
//! format and IO failures abort the operation with the prior state intact,
//! render failures are logged and the editing session carries on.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BoardError>;

#[derive(Debug, Error)]
pub enum BoardError {
    /// A request that would break a collection invariant (last project,
    /// last page, blank name, page cap).
    #[error("{0}")]
    Validation(String),

    /// An imported project file is missing required envelope fields or does
    /// not decode.
    #[error("invalid project file: {0}")]
    Format(String),

    /// File read/write or asset decode failure.
    #[error("io error: {0}")]
    Io(String),

    /// Export rasterization failed.
    #[error("render failed: {0}")]
    Render(String),

    /// An id that does not exist in the store or registry.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

impl BoardError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<std::io::Error> for BoardError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BoardError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Self::Io(err.to_string())
        } else {
            Self::Format(err.to_string())
        }
    }
}

impl From<image::ImageError> for BoardError {
    fn from(err: image::ImageError) -> Self {
        Self::Io(format!("image decode: {err}"))
    }
}
