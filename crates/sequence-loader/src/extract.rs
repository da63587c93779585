//! Variable extraction from source files.
//!
//! The assembler only sees the [`VariableExtractor`] trait. Pre-extracted
//! `.npy` stacks are read by [`NpyExtractor`]; live reads from native WRF
//! NetCDF output live in the `netcdf-parser` crate and implement the same
//! trait.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ndarray::{Array2, Array4, ArrayD, Ix2, Ix4};
use ndarray_npy::{ReadNpyError, ReadNpyExt};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{LoaderError, Result};
use crate::types::GridFile;

/// Reads a stack of named variables from one source file.
///
/// Implementations must be `Send + Sync` so samples can be assembled from
/// several worker threads at once.
pub trait VariableExtractor: Send + Sync {
    /// Extract `variables` from `file` as a `(time, variable, rows, cols)` array.
    fn extract(&self, file: &GridFile, variables: &[String]) -> Result<Array4<f32>>;

    /// Short name for logging.
    fn name(&self) -> &str;
}

/// Which extractor implementation a source uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    /// Pre-extracted `(T, C, H, W)` `.npy` stacks.
    #[default]
    Npy,
    /// Live extraction from WRF NetCDF output.
    NetCdf,
}

impl FromStr for ExtractorKind {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "npy" => Ok(Self::Npy),
            "netcdf" | "nc" | "native" => Ok(Self::NetCdf),
            _ => Err(LoaderError::config(format!(
                "unknown extractor '{}' (expected npy or netcdf)",
                s
            ))),
        }
    }
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Npy => write!(f, "npy"),
            Self::NetCdf => write!(f, "netcdf"),
        }
    }
}

/// Reads pre-extracted `.npy` stacks of shape `(T, C, H, W)`.
///
/// The stack already contains the requested variables in order, so the
/// variable list is only used to check the channel count.
#[derive(Debug, Clone, Default)]
pub struct NpyExtractor {
    expected_time_steps: Option<usize>,
}

impl NpyExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject files that do not hold exactly `file_len` time steps.
    pub fn with_file_len(mut self, file_len: usize) -> Self {
        self.expected_time_steps = Some(file_len);
        self
    }
}

impl VariableExtractor for NpyExtractor {
    fn extract(&self, file: &GridFile, variables: &[String]) -> Result<Array4<f32>> {
        let stack = read_npy_4d(file.path())?;
        let (time, channels, rows, cols) = stack.dim();
        trace!(
            file = %file.name(),
            time = time,
            channels = channels,
            rows = rows,
            cols = cols,
            "Read npy stack"
        );

        if !variables.is_empty() && channels != variables.len() {
            return Err(LoaderError::extraction(
                file.path(),
                format!(
                    "stack has {} channels but {} variables were requested ({})",
                    channels,
                    variables.len(),
                    variables.join(", ")
                ),
            ));
        }
        if let Some(expected) = self.expected_time_steps {
            if time != expected {
                return Err(LoaderError::extraction(
                    file.path(),
                    format!("expected {} time steps, found {}", expected, time),
                ));
            }
        }
        Ok(stack)
    }

    fn name(&self) -> &str {
        "npy"
    }
}

/// Serves stacks held in memory, keyed by file path.
#[derive(Debug, Clone, Default)]
pub struct MemoryExtractor {
    stacks: HashMap<GridFile, Array4<f32>>,
}

impl MemoryExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the stack returned for `file`.
    pub fn insert(&mut self, file: impl Into<GridFile>, stack: Array4<f32>) {
        self.stacks.insert(file.into(), stack);
    }

    pub fn with(mut self, file: impl Into<GridFile>, stack: Array4<f32>) -> Self {
        self.insert(file, stack);
        self
    }
}

impl VariableExtractor for MemoryExtractor {
    fn extract(&self, file: &GridFile, variables: &[String]) -> Result<Array4<f32>> {
        let stack = self
            .stacks
            .get(file)
            .ok_or_else(|| LoaderError::extraction(file.path(), "no such file"))?;
        let channels = stack.dim().1;
        if !variables.is_empty() && channels != variables.len() {
            return Err(LoaderError::extraction(
                file.path(),
                format!(
                    "stack has {} channels but {} variables were requested",
                    channels,
                    variables.len()
                ),
            ));
        }
        Ok(stack.clone())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Read a float array of any dimensionality, accepting `f32` or `f64` data.
fn read_npy_dyn(path: &Path) -> Result<ArrayD<f32>> {
    let open = || {
        std::fs::File::open(path).map_err(|e| LoaderError::extraction(path, e.to_string()))
    };

    match ArrayD::<f32>::read_npy(open()?) {
        Ok(arr) => Ok(arr),
        Err(ReadNpyError::WrongDescriptor(_)) => {
            let arr = ArrayD::<f64>::read_npy(open()?)
                .map_err(|e| LoaderError::extraction(path, e.to_string()))?;
            Ok(arr.mapv(|v| v as f32))
        }
        Err(e) => Err(LoaderError::extraction(path, e.to_string())),
    }
}

/// Load a 4-D `(T, C, H, W)` float array from an `.npy` file.
pub fn read_npy_4d(path: &Path) -> Result<Array4<f32>> {
    let arr = read_npy_dyn(path)?;
    let shape = arr.shape().to_vec();
    arr.into_dimensionality::<Ix4>().map_err(|_| {
        LoaderError::extraction(path, format!("expected 4-D array, got shape {:?}", shape))
    })
}

/// Load a 2-D float array from an `.npy` file.
pub fn read_npy_2d(path: &Path) -> Result<Array2<f32>> {
    let arr = read_npy_dyn(path)?;
    let shape = arr.shape().to_vec();
    arr.into_dimensionality::<Ix2>().map_err(|_| {
        LoaderError::extraction(path, format!("expected 2-D array, got shape {:?}", shape))
    })
}
