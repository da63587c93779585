//! Error types for sequence loading.

use std::path::Path;

use thiserror::Error;

/// Errors that can occur while building a dataset or assembling samples.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// The dataset configuration or file lists are unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// A sample index outside `[0, len)` was requested.
    #[error("sample index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    /// Sequence assembly ran past the last available file.
    #[error("file index {file_index} out of range ({available} files available)")]
    FileOutOfRange { file_index: usize, available: usize },

    /// The variable extractor failed for a source file.
    #[error("failed to extract variables from {path}: {message}")]
    Extraction { path: String, message: String },

    /// Array shapes could not be combined.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// The static mask could not be loaded.
    #[error("failed to load spatial mask: {0}")]
    Mask(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoaderError {
    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an Extraction error for the given file.
    pub fn extraction(path: impl AsRef<Path>, msg: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.as_ref().display().to_string(),
            message: msg.into(),
        }
    }

    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Create a Mask error.
    pub fn mask(msg: impl Into<String>) -> Self {
        Self::Mask(msg.into())
    }

    /// Whether this error means the caller asked for something that cannot exist,
    /// as opposed to a broken source file.
    pub fn is_index_error(&self) -> bool {
        matches!(
            self,
            Self::IndexOutOfRange { .. } | Self::FileOutOfRange { .. }
        )
    }
}

impl From<serde_yaml::Error> for LoaderError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for sequence loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;
