//! Windowed sequence loading for WRF / reanalysis training pairs.
//!
//! This crate stitches per-file gridded weather data into fixed-length
//! temporal sequences. Every source file covers `file_len` hourly steps; a
//! sample starting near the end of one file continues into the next. A
//! static land mask is stacked onto every time step as an extra channel.
//!
//! # Architecture
//!
//! ```text
//! SampleLoader (batches, shuffle, rayon workers)
//!      │
//!      ▼
//! WindowedDataset::get(i)
//!      │
//!      ├─► SequenceAssembler::assemble(input files)  ──► mirror rows
//!      │         │
//!      │         ├─► IndexMapper::locate(i) → (file, offset)
//!      │         ├─► VariableExtractor::extract(file)
//!      │         ├─► GridConvention → StaticMaskProvider::mask() or zero plane
//!      │         └─► slice, advance to next file, concatenate
//!      │
//!      └─► SequenceAssembler::assemble(target files)
//!               │
//!               ▼
//!          Sample { input, target }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sequence_loader::{split_train_val_test, DatasetConfig, SplitFractions, WindowedDataset};
//!
//! let split = split_train_val_test("data/wrf", "data/era", "*.npy", SplitFractions::default())?;
//! let dataset = WindowedDataset::builder()
//!     .config(DatasetConfig::from_env())
//!     .input_files(split.train.wrf)
//!     .target_files(split.train.era)
//!     .build()?;
//!
//! let sample = dataset.get(0)?;
//! assert_eq!(sample.seq_len(), dataset.seq_len());
//! ```

pub mod assembler;
pub mod config;
pub mod convention;
pub mod dataset;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod index;
pub mod loader;
pub mod mask;
pub mod types;

// Re-export commonly used types at crate root
pub use assembler::{mirror_vertical, SequenceAssembler, SequenceSource};
pub use config::{DatasetConfig, LoaderConfig, SPATIOTEMPORAL_VARIABLES};
pub use convention::{ConventionPolicy, GridConvention, ERA_MASK_SHAPE, WRF_GRID_ROWS};
pub use dataset::{DatasetBuilder, SequenceDataset, WindowedDataset};
pub use discovery::{find_files, split_train_val_test, DatasetSplit, FilePairs, SplitFractions};
pub use error::{LoaderError, Result};
pub use extract::{
    read_npy_2d, read_npy_4d, ExtractorKind, MemoryExtractor, NpyExtractor, VariableExtractor,
};
pub use index::{FilePosition, IndexMapper};
pub use loader::{Batch, EpochIter, SampleLoader};
pub use mask::{
    InMemoryMaskSource, MaskPostProcess, MaskSource, NeighbourGradient, NpyMaskSource,
    SpatialMask, StaticMaskProvider,
};
pub use types::{GridFile, Sample, Sequence, SourceKind};
