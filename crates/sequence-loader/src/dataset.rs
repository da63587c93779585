//! The windowed dataset: random access to aligned (input, target) sequences.

use std::sync::Arc;

use tracing::{debug, info};

use crate::assembler::{mirror_vertical, SequenceAssembler, SequenceSource};
use crate::config::DatasetConfig;
use crate::error::{LoaderError, Result};
use crate::extract::{NpyExtractor, VariableExtractor};
use crate::index::IndexMapper;
use crate::mask::StaticMaskProvider;
use crate::types::{GridFile, Sample, Sequence, SourceKind};

/// Random-access collection of samples.
pub trait SequenceDataset: Send + Sync {
    /// Number of samples.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build sample `index`.
    fn get(&self, index: usize) -> Result<Sample>;

    /// Short name for logging.
    fn name(&self) -> &str;
}

/// Pairs of fixed-length sequences drawn from two aligned file lists.
///
/// Input sequences come from model output and are mirrored along the height
/// axis; target sequences come from reanalysis and are returned as assembled.
#[derive(Debug)]
pub struct WindowedDataset {
    name: String,
    input: SequenceSource,
    target: SequenceSource,
    assembler: SequenceAssembler,
    seq_len: usize,
}

impl WindowedDataset {
    pub fn builder() -> DatasetBuilder {
        DatasetBuilder::new()
    }

    /// Number of time steps per sample.
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    /// Number of time steps per file.
    pub fn file_len(&self) -> usize {
        self.assembler.mapper().file_len()
    }

    pub fn input_files(&self) -> &[GridFile] {
        &self.input.files
    }

    pub fn target_files(&self) -> &[GridFile] {
        &self.target.files
    }

    pub fn input_variables(&self) -> &[String] {
        &self.input.variables
    }

    pub fn target_variables(&self) -> &[String] {
        &self.target.variables
    }

    /// Build sample `index`, accepting signed indices from outside callers.
    pub fn get_signed(&self, index: i64) -> Result<Sample> {
        let unsigned = usize::try_from(index).map_err(|_| LoaderError::IndexOutOfRange {
            index,
            len: self.len(),
        })?;
        self.get(unsigned)
    }

    /// Assemble the input sequence starting at `index` without mirroring.
    pub fn assemble_input_raw(&self, index: usize) -> Result<Sequence> {
        self.check_index(index)?;
        self.assembler.assemble(&self.input, index, self.seq_len)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let len = self.len();
        if index >= len {
            return Err(LoaderError::IndexOutOfRange {
                index: i64::try_from(index).unwrap_or(i64::MAX),
                len,
            });
        }
        Ok(())
    }
}

impl SequenceDataset for WindowedDataset {
    /// `files * file_len - seq_len`, floored at zero.
    fn len(&self) -> usize {
        (self.input.len() * self.file_len()).saturating_sub(self.seq_len)
    }

    fn get(&self, index: usize) -> Result<Sample> {
        self.check_index(index)?;

        let input = self.assembler.assemble(&self.input, index, self.seq_len)?;
        let input = mirror_vertical(&input);
        let target = self.assembler.assemble(&self.target, index, self.seq_len)?;

        debug!(
            dataset = %self.name,
            index = index,
            input_shape = ?input.dim(),
            target_shape = ?target.dim(),
            "Assembled sample"
        );
        Ok(Sample {
            index,
            input,
            target,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`WindowedDataset`].
pub struct DatasetBuilder {
    name: String,
    config: DatasetConfig,
    input_files: Vec<GridFile>,
    target_files: Vec<GridFile>,
    input_extractor: Option<Arc<dyn VariableExtractor>>,
    target_extractor: Option<Arc<dyn VariableExtractor>>,
    masks: Option<Arc<StaticMaskProvider>>,
}

impl Default for DatasetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetBuilder {
    pub fn new() -> Self {
        Self {
            name: "windowed".to_string(),
            config: DatasetConfig::default(),
            input_files: Vec::new(),
            target_files: Vec::new(),
            input_extractor: None,
            target_extractor: None,
            masks: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn config(mut self, config: DatasetConfig) -> Self {
        self.config = config;
        self
    }

    pub fn seq_len(mut self, seq_len: usize) -> Self {
        self.config.seq_len = seq_len;
        self
    }

    pub fn file_len(mut self, file_len: usize) -> Self {
        self.config.file_len = file_len;
        self
    }

    /// Model-output files. Sorted during `build`.
    pub fn input_files<I, F>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<GridFile>,
    {
        self.input_files = files.into_iter().map(Into::into).collect();
        self
    }

    /// Reanalysis files. Sorted during `build`.
    pub fn target_files<I, F>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<GridFile>,
    {
        self.target_files = files.into_iter().map(Into::into).collect();
        self
    }

    /// Use the same extractor for both sources.
    pub fn extractor(mut self, extractor: Arc<dyn VariableExtractor>) -> Self {
        self.input_extractor = Some(extractor.clone());
        self.target_extractor = Some(extractor);
        self
    }

    pub fn input_extractor(mut self, extractor: Arc<dyn VariableExtractor>) -> Self {
        self.input_extractor = Some(extractor);
        self
    }

    pub fn target_extractor(mut self, extractor: Arc<dyn VariableExtractor>) -> Self {
        self.target_extractor = Some(extractor);
        self
    }

    /// Share a mask provider, e.g. between the splits of one run.
    pub fn masks(mut self, masks: Arc<StaticMaskProvider>) -> Self {
        self.masks = Some(masks);
        self
    }

    /// Validate the inputs and build the dataset.
    ///
    /// Missing extractors default to [`NpyExtractor`]; a missing mask
    /// provider reads `config.mask_path` lazily.
    pub fn build(self) -> Result<WindowedDataset> {
        let Self {
            name,
            config,
            mut input_files,
            mut target_files,
            input_extractor,
            target_extractor,
            masks,
        } = self;

        config.validate()?;
        if input_files.is_empty() {
            return Err(LoaderError::config("input file list is empty"));
        }
        if target_files.is_empty() {
            return Err(LoaderError::config("target file list is empty"));
        }
        if input_files.len() != target_files.len() {
            return Err(LoaderError::config(format!(
                "input and target file counts differ ({} vs {})",
                input_files.len(),
                target_files.len()
            )));
        }
        input_files.sort();
        target_files.sort();

        let default_extractor = || -> Arc<dyn VariableExtractor> {
            Arc::new(NpyExtractor::new().with_file_len(config.file_len))
        };
        let masks =
            masks.unwrap_or_else(|| Arc::new(StaticMaskProvider::from_npy(&config.mask_path)));

        let input = SequenceSource {
            kind: SourceKind::Wrf,
            files: input_files,
            variables: config.input_variables(),
            extractor: input_extractor.unwrap_or_else(default_extractor),
            convention: config.wrf_convention,
        };
        let target = SequenceSource {
            kind: SourceKind::Era,
            files: target_files,
            variables: config.target_variables(),
            extractor: target_extractor.unwrap_or_else(default_extractor),
            convention: config.era_convention,
        };

        let dataset = WindowedDataset {
            name,
            assembler: SequenceAssembler::new(IndexMapper::new(config.file_len)?, masks),
            seq_len: config.seq_len,
            input,
            target,
        };

        info!(
            dataset = %dataset.name,
            files = dataset.input.len(),
            file_len = dataset.file_len(),
            seq_len = dataset.seq_len,
            samples = dataset.len(),
            input_extractor = dataset.input.extractor.name(),
            target_extractor = dataset.target.extractor.name(),
            spatiotemporal = config.use_spatiotemporal_encoding,
            "Built windowed dataset"
        );
        Ok(dataset)
    }
}
