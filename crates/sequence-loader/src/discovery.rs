//! File discovery and chronological train/validation/test splitting.

use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{LoaderError, Result};
use crate::types::GridFile;

/// Default basename pattern for pre-extracted stacks.
pub const DEFAULT_PATTERN: &str = "*.npy";

/// Recursively find files under `directory` whose basename matches `pattern`.
///
/// Paths use `/` separators and are returned sorted.
pub fn find_files(directory: impl AsRef<Path>, pattern: &str) -> Result<Vec<PathBuf>> {
    let directory = directory.as_ref();
    let matcher = Pattern::new(pattern)
        .map_err(|e| LoaderError::config(format!("invalid file pattern '{}': {}", pattern, e)))?;

    let mut files = Vec::new();
    for entry in WalkDir::new(directory).follow_links(true) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .file_name()
            .to_str()
            .map(|name| matcher.matches(name))
            .unwrap_or(false);
        if matches {
            let normalized = entry.path().to_string_lossy().replace('\\', "/");
            files.push(PathBuf::from(normalized));
        }
    }
    files.sort();

    debug!(
        directory = %directory.display(),
        pattern = pattern,
        count = files.len(),
        "Discovered files"
    );
    Ok(files)
}

/// Fractions of the file pairs assigned to each split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitFractions {
    pub train: f64,
    pub val: f64,
    pub test: f64,
}

impl Default for SplitFractions {
    fn default() -> Self {
        Self {
            train: 0.7,
            val: 0.1,
            test: 0.2,
        }
    }
}

impl SplitFractions {
    pub fn new(train: f64, val: f64, test: f64) -> Self {
        Self { train, val, test }
    }

    /// Validate the fractions.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("train", self.train), ("val", self.val), ("test", self.test)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(LoaderError::config(format!(
                    "{} fraction must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        let total = self.train + self.val + self.test;
        if total > 1.0 + 1e-9 {
            return Err(LoaderError::config(format!(
                "split fractions sum to {} (must be <= 1)",
                total
            )));
        }
        Ok(())
    }

    /// File counts `(train, val, test)` for `n` pairs.
    ///
    /// Each count is floored and capped at the pairs left after the earlier
    /// splits, so the total never exceeds `n` even for unvalidated fractions.
    pub fn counts(&self, n: usize) -> (usize, usize, usize) {
        // `as usize` saturates: negative and NaN products become 0.
        let share = |fraction: f64| ((n as f64) * fraction).floor() as usize;
        let train = share(self.train).min(n);
        let val = share(self.val).min(n - train);
        let test = share(self.test).min(n - train - val);
        (train, val, test)
    }
}

/// Aligned input and target file lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePairs {
    pub wrf: Vec<GridFile>,
    pub era: Vec<GridFile>,
}

impl FilePairs {
    /// Pair two sorted lists by position.
    pub fn new(wrf: Vec<GridFile>, era: Vec<GridFile>) -> Result<Self> {
        if wrf.len() != era.len() {
            return Err(LoaderError::config(format!(
                "input and target file counts differ ({} vs {})",
                wrf.len(),
                era.len()
            )));
        }
        Ok(Self { wrf, era })
    }

    pub fn len(&self) -> usize {
        self.wrf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wrf.is_empty()
    }

    fn range(&self, start: usize, end: usize) -> Self {
        Self {
            wrf: self.wrf[start..end].to_vec(),
            era: self.era[start..end].to_vec(),
        }
    }
}

/// Contiguous chronological partition of the file pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetSplit {
    pub train: FilePairs,
    pub val: FilePairs,
    pub test: FilePairs,
}

impl DatasetSplit {
    /// Partition already-paired files in order: train, then val, then test.
    pub fn from_pairs(pairs: &FilePairs, fractions: SplitFractions) -> Result<Self> {
        fractions.validate()?;
        let (train, val, test) = fractions.counts(pairs.len());
        Ok(Self {
            train: pairs.range(0, train),
            val: pairs.range(train, train + val),
            test: pairs.range(train + val, train + val + test),
        })
    }
}

/// Discover both sources with `pattern` and split them chronologically.
pub fn split_train_val_test(
    wrf_dir: impl AsRef<Path>,
    era_dir: impl AsRef<Path>,
    pattern: &str,
    fractions: SplitFractions,
) -> Result<DatasetSplit> {
    let wrf: Vec<GridFile> = find_files(wrf_dir, pattern)?
        .into_iter()
        .map(GridFile::from)
        .collect();
    let era: Vec<GridFile> = find_files(era_dir, pattern)?
        .into_iter()
        .map(GridFile::from)
        .collect();

    let pairs = FilePairs::new(wrf, era)?;
    let split = DatasetSplit::from_pairs(&pairs, fractions)?;
    info!(
        total = pairs.len(),
        train = split.train.len(),
        val = split.val.len(),
        test = split.test.len(),
        "Split file pairs"
    );
    Ok(split)
}
