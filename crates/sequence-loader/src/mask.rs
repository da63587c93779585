//! Static spatial mask, loaded once and shared by every sample.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ndarray::Array2;
use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{LoaderError, Result};

/// A 2D `(rows, cols)` mask plane.
pub type SpatialMask = Array2<f32>;

/// Where the static mask is read from.
pub trait MaskSource: Send + Sync {
    /// Read the mask. Called at most once per successful provider initialization.
    fn load(&self) -> Result<SpatialMask>;

    /// Human-readable description for logging.
    fn describe(&self) -> String;
}

/// Reads a 2D `.npy` array from disk.
#[derive(Debug, Clone)]
pub struct NpyMaskSource {
    path: PathBuf,
}

impl NpyMaskSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MaskSource for NpyMaskSource {
    fn load(&self) -> Result<SpatialMask> {
        crate::extract::read_npy_2d(&self.path)
            .map_err(|e| LoaderError::mask(format!("{}: {}", self.path.display(), e)))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A mask that is already in memory.
#[derive(Debug, Clone)]
pub struct InMemoryMaskSource {
    mask: SpatialMask,
}

impl InMemoryMaskSource {
    pub fn new(mask: SpatialMask) -> Self {
        Self { mask }
    }
}

impl MaskSource for InMemoryMaskSource {
    fn load(&self) -> Result<SpatialMask> {
        Ok(self.mask.clone())
    }

    fn describe(&self) -> String {
        let (rows, cols) = self.mask.dim();
        format!("in-memory {}x{}", rows, cols)
    }
}

/// Optional adjustment applied once to the mask right after loading.
///
/// Nothing is installed by default.
pub trait MaskPostProcess: Send + Sync {
    fn apply(&self, mask: &mut SpatialMask);
}

/// Spreads land/sea edges into their neighbours.
///
/// Zero cells take the maximum of their 4-neighbours divided by `multiplier`;
/// one cells take that maximum multiplied by `multiplier`. Border cells are
/// left untouched. Cells are updated in place in row-major order, so later
/// cells see already-adjusted neighbours.
#[derive(Debug, Clone, Copy)]
pub struct NeighbourGradient {
    pub multiplier: f32,
}

impl MaskPostProcess for NeighbourGradient {
    fn apply(&self, mask: &mut SpatialMask) {
        let (rows, cols) = mask.dim();
        if rows < 3 || cols < 3 {
            return;
        }
        for i in 1..rows - 1 {
            for j in 1..cols - 1 {
                let neighbours = mask[[i - 1, j]]
                    .max(mask[[i + 1, j]])
                    .max(mask[[i, j + 1]])
                    .max(mask[[i, j - 1]]);
                if mask[[i, j]] == 0.0 {
                    mask[[i, j]] = neighbours / self.multiplier;
                }
                if mask[[i, j]] == 1.0 {
                    mask[[i, j]] = neighbours * self.multiplier;
                }
            }
        }
    }
}

/// Loads the static mask on first use and serves the cached copy afterwards.
///
/// Concurrent first callers block until a single load finishes. A failed load
/// is not cached; the next caller tries again.
pub struct StaticMaskProvider {
    source: Box<dyn MaskSource>,
    post_process: Option<Box<dyn MaskPostProcess>>,
    cell: OnceCell<Arc<SpatialMask>>,
    loads: AtomicU64,
}

impl StaticMaskProvider {
    /// Create a provider reading from `source`.
    pub fn new(source: impl MaskSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            post_process: None,
            cell: OnceCell::new(),
            loads: AtomicU64::new(0),
        }
    }

    /// Create a provider reading a `.npy` mask file.
    pub fn from_npy(path: impl Into<PathBuf>) -> Self {
        Self::new(NpyMaskSource::new(path))
    }

    /// Install a post-processing hook run once after the load.
    pub fn with_post_process(mut self, hook: impl MaskPostProcess + 'static) -> Self {
        self.post_process = Some(Box::new(hook));
        self
    }

    /// The mask, loading it if this is the first access.
    pub fn mask(&self) -> Result<Arc<SpatialMask>> {
        self.cell
            .get_or_try_init(|| {
                self.loads.fetch_add(1, Ordering::SeqCst);
                let mut mask = self.source.load()?;
                if let Some(hook) = &self.post_process {
                    hook.apply(&mut mask);
                }
                let (rows, cols) = mask.dim();
                info!(
                    source = %self.source.describe(),
                    rows = rows,
                    cols = cols,
                    "Loaded static mask"
                );
                Ok(Arc::new(mask))
            })
            .map(Arc::clone)
    }

    /// Whether the mask has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Number of times the underlying source was read.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::SeqCst)
    }

    /// Load the mask now rather than on the first sample.
    pub fn preload(&self) -> Result<()> {
        let mask = self.mask()?;
        debug!(shape = ?mask.dim(), "Static mask preloaded");
        Ok(())
    }
}

impl fmt::Debug for StaticMaskProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticMaskProvider")
            .field("source", &self.source.describe())
            .field("post_process", &self.post_process.is_some())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::time::Duration;

    /// Source that counts reads and sleeps to widen the race window.
    struct SlowSource {
        reads: Arc<AtomicUsize>,
    }

    impl MaskSource for SlowSource {
        fn load(&self) -> Result<SpatialMask> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            Ok(Array2::ones((4, 5)))
        }

        fn describe(&self) -> String {
            "slow".to_string()
        }
    }

    struct FailingSource;

    impl MaskSource for FailingSource {
        fn load(&self) -> Result<SpatialMask> {
            Err(LoaderError::mask("disk on fire"))
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    #[test]
    fn test_mask_cached_after_first_load() {
        let provider = StaticMaskProvider::new(InMemoryMaskSource::new(Array2::ones((3, 3))));
        assert!(!provider.is_loaded());

        let a = provider.mask().unwrap();
        let b = provider.mask().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(provider.load_count(), 1);
    }

    #[test]
    fn test_concurrent_first_access_loads_once() {
        let reads = Arc::new(AtomicUsize::new(0));
        let provider = Arc::new(StaticMaskProvider::new(SlowSource {
            reads: reads.clone(),
        }));

        let callers = 16;
        let barrier = Arc::new(Barrier::new(callers));
        let handles: Vec<_> = (0..callers)
            .map(|_| {
                let provider = provider.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    provider.mask().unwrap().dim()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), (4, 5));
        }
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert_eq!(provider.load_count(), 1);
    }

    #[test]
    fn test_failed_load_is_retried() {
        let provider = StaticMaskProvider::new(FailingSource);
        assert!(matches!(provider.mask(), Err(LoaderError::Mask(_))));
        assert!(provider.mask().is_err());
        assert!(!provider.is_loaded());
        assert_eq!(provider.load_count(), 2);
    }

    #[test]
    fn test_no_post_processing_by_default() {
        let mut raw = Array2::zeros((4, 4));
        raw[[1, 1]] = 1.0;
        let provider = StaticMaskProvider::new(InMemoryMaskSource::new(raw.clone()));
        assert_eq!(*provider.mask().unwrap(), raw);
    }

    #[test]
    fn test_neighbour_gradient_hook() {
        let mut raw = Array2::zeros((3, 3));
        raw[[0, 1]] = 1.0;
        let provider = StaticMaskProvider::new(InMemoryMaskSource::new(raw))
            .with_post_process(NeighbourGradient { multiplier: 2.0 });

        let mask = provider.mask().unwrap();
        // Centre was sea next to a land cell: 1.0 / 2.0.
        assert_eq!(mask[[1, 1]], 0.5);
        // Border cells unchanged.
        assert_eq!(mask[[0, 1]], 1.0);
        assert_eq!(mask[[2, 2]], 0.0);
    }

    #[test]
    fn test_npy_source_reads_mask() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("landmask.npy");
        let coast = test_utils::coastline_mask(6, 5, 2);
        ndarray_npy::write_npy(&path, &coast).unwrap();

        let provider = StaticMaskProvider::from_npy(&path);
        provider.preload().unwrap();
        assert!(provider.is_loaded());
        assert_eq!(*provider.mask().unwrap(), coast);
    }

    #[test]
    fn test_npy_source_missing_file() {
        let provider = StaticMaskProvider::from_npy("/nonexistent/landmask.npy");
        let err = provider.mask().unwrap_err();
        assert!(err.to_string().contains("landmask.npy"));
    }
}
