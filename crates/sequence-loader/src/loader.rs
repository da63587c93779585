//! Shuffled, batched iteration over a dataset with parallel sample fetches.

use std::sync::Arc;

use ndarray::{stack, Array5, ArrayView4, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{thread_rng, SeedableRng};
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, warn};

use crate::config::LoaderConfig;
use crate::dataset::SequenceDataset;
use crate::error::{LoaderError, Result};
use crate::types::Sample;

/// A stacked batch of samples.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Sample indices in batch order.
    pub indices: Vec<usize>,
    /// `(batch, seq_len, channels, rows, cols)`
    pub inputs: Array5<f32>,
    /// `(batch, seq_len, channels, rows, cols)`
    pub targets: Array5<f32>,
}

impl Batch {
    /// Stack samples along a new leading axis.
    pub fn from_samples(samples: &[Sample]) -> Result<Self> {
        let first = samples
            .first()
            .ok_or_else(|| LoaderError::config("cannot build an empty batch"))?;

        let inputs: Vec<ArrayView4<f32>> = samples.iter().map(|s| s.input.view()).collect();
        let targets: Vec<ArrayView4<f32>> = samples.iter().map(|s| s.target.view()).collect();

        let inputs = stack(Axis(0), &inputs).map_err(|_| {
            mismatch(first.input.shape(), samples.iter().map(|s| s.input.shape()))
        })?;
        let targets = stack(Axis(0), &targets).map_err(|_| {
            mismatch(first.target.shape(), samples.iter().map(|s| s.target.shape()))
        })?;

        Ok(Self {
            indices: samples.iter().map(|s| s.index).collect(),
            inputs,
            targets,
        })
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

fn mismatch<'a>(
    expected: &'a [usize],
    mut shapes: impl Iterator<Item = &'a [usize]>,
) -> LoaderError {
    let actual = shapes.find(|s| *s != expected).unwrap_or(expected);
    LoaderError::shape_mismatch(expected, actual)
}

/// Drives a [`SequenceDataset`] in batches.
pub struct SampleLoader {
    dataset: Arc<dyn SequenceDataset>,
    config: LoaderConfig,
    pool: Option<ThreadPool>,
    indices: Vec<usize>,
    epoch: u64,
}

impl SampleLoader {
    /// Create a loader over `dataset`.
    pub fn new(dataset: Arc<dyn SequenceDataset>, config: LoaderConfig) -> Result<Self> {
        config.validate()?;

        let pool = if config.workers > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.workers)
                .thread_name(|i| format!("sample-worker-{}", i))
                .build()
                .map_err(|e| LoaderError::config(format!("failed to build worker pool: {}", e)))?;
            Some(pool)
        } else {
            None
        };

        let indices = (0..dataset.len()).collect();
        Ok(Self {
            dataset,
            config,
            pool,
            indices,
            epoch: 0,
        })
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Number of batches per epoch.
    pub fn num_batches(&self) -> usize {
        let n = self.dataset.len();
        if self.config.drop_last {
            n / self.config.batch_size
        } else {
            n.div_ceil(self.config.batch_size)
        }
    }

    /// Reorder sample indices for the next epoch.
    ///
    /// With a seed, epoch `e` is shuffled by `seed + e` so runs are
    /// reproducible but epochs differ.
    fn reshuffle(&mut self) {
        if !self.config.shuffle {
            return;
        }
        self.indices.sort_unstable();
        match self.config.seed {
            Some(seed) => {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(self.epoch));
                self.indices.shuffle(&mut rng);
            }
            None => self.indices.shuffle(&mut thread_rng()),
        }
    }

    /// Start a new epoch and iterate its batches.
    pub fn epoch(&mut self) -> EpochIter<'_> {
        self.reshuffle();
        self.epoch += 1;
        debug!(
            dataset = self.dataset.name(),
            epoch = self.epoch,
            batches = self.num_batches(),
            "Starting epoch"
        );
        EpochIter {
            loader: self,
            batch: 0,
        }
    }

    /// Fetch the given samples, in parallel when a worker pool is configured.
    pub fn fetch(&self, indices: &[usize]) -> Vec<Result<Sample>> {
        let dataset = &self.dataset;
        match &self.pool {
            Some(pool) if indices.len() > 1 => {
                pool.install(|| indices.par_iter().map(|&i| dataset.get(i)).collect())
            }
            _ => indices.iter().map(|&i| dataset.get(i)).collect(),
        }
    }

    fn load_batch(&self, indices: &[usize]) -> Result<Option<Batch>> {
        let mut samples = Vec::with_capacity(indices.len());
        for (index, result) in indices.iter().zip(self.fetch(indices)) {
            match result {
                Ok(sample) => samples.push(sample),
                Err(e) if self.config.skip_failed => {
                    warn!(
                        dataset = self.dataset.name(),
                        index = index,
                        error = %e,
                        "Skipping failed sample"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        if samples.is_empty() {
            return Ok(None);
        }
        Batch::from_samples(&samples).map(Some)
    }
}

/// Batches of one epoch.
pub struct EpochIter<'a> {
    loader: &'a SampleLoader,
    batch: usize,
}

impl Iterator for EpochIter<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch_size = self.loader.config.batch_size;
        let total = self.loader.indices.len();

        while self.batch < self.loader.num_batches() {
            let start = self.batch * batch_size;
            let end = (start + batch_size).min(total);
            self.batch += 1;

            match self.loader.load_batch(&self.loader.indices[start..end]) {
                Ok(Some(batch)) => return Some(Ok(batch)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}
