//! Errors raised while reading WRF NetCDF output.

use thiserror::Error;

pub type NetCdfResult<T> = Result<T, NetCdfError>;

#[derive(Error, Debug)]
pub enum NetCdfError {
    /// A requested variable, or a field needed to post-process it, is absent.
    #[error("missing variable: {0}")]
    MissingVariable(String),

    /// The file could not be opened or a variable could not be decoded.
    #[error("unreadable NetCDF: {0}")]
    Unreadable(String),

    /// Variables in one file disagree on their grid.
    #[error("{variable} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        variable: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}
