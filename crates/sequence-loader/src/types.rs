//! Core types for sequence loading.

use std::fmt;
use std::path::{Path, PathBuf};

use ndarray::{Array4, Axis};
use serde::{Deserialize, Serialize};

/// A 4D array of shape `(seq_len, channels, height, width)`.
pub type Sequence = Array4<f32>;

/// Reference to one on-disk source file covering `file_len` time steps.
///
/// Ordering is by path, which is how both source lists are sorted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridFile {
    path: PathBuf,
}

impl GridFile {
    /// Create a new file reference.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without directories, for logging.
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("")
    }
}

impl fmt::Display for GridFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl From<PathBuf> for GridFile {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&str> for GridFile {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// Which of the two aligned sources a file list belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Simulated weather-model output (network input).
    Wrf,
    /// Reanalysis reference data (training target).
    Era,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wrf => "wrf",
            Self::Era => "era",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One training sample: an input sequence and its target sequence.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Global sample index this pair was drawn from.
    pub index: usize,
    /// Model-output sequence, mirrored along the height axis.
    pub input: Sequence,
    /// Reference sequence, never mirrored.
    pub target: Sequence,
}

impl Sample {
    /// Number of time steps in the sample.
    pub fn seq_len(&self) -> usize {
        self.input.len_of(Axis(0))
    }

    /// Input shape as `(seq_len, channels, height, width)`.
    pub fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.input.dim()
    }

    /// Target shape as `(seq_len, channels, height, width)`.
    pub fn target_shape(&self) -> (usize, usize, usize, usize) {
        self.target.dim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_file_sorts_by_path() {
        let mut files = vec![
            GridFile::new("data/wrf_2019-01-03.npy"),
            GridFile::new("data/wrf_2019-01-01.npy"),
            GridFile::new("data/wrf_2019-01-02.npy"),
        ];
        files.sort();

        let names: Vec<&str> = files.iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            vec!["wrf_2019-01-01.npy", "wrf_2019-01-02.npy", "wrf_2019-01-03.npy"]
        );
    }

    #[test]
    fn test_source_kind_display() {
        assert_eq!(SourceKind::Wrf.to_string(), "wrf");
        assert_eq!(SourceKind::Era.to_string(), "era");
    }

    #[test]
    fn test_sample_shapes() {
        let sample = Sample {
            index: 3,
            input: Array4::zeros((4, 2, 5, 6)),
            target: Array4::zeros((4, 3, 5, 6)),
        };
        assert_eq!(sample.seq_len(), 4);
        assert_eq!(sample.input_shape(), (4, 2, 5, 6));
        assert_eq!(sample.target_shape(), (4, 3, 5, 6));
    }
}
