//! Assembly of fixed-length sequences that may span several files.
//!
//! ```text
//! start index ──► IndexMapper::locate ──► (file, offset)
//!                                            │
//!        ┌───────────────────────────────────┘
//!        ▼
//!   extract(file) ─► resolve convention ─► slice [offset, offset + remaining)
//!        │                                        │
//!        │                                        ▼
//!        │                              stack mask plane as last channel
//!        │                                        │
//!        └── remaining > 0 ? next file, offset 0 ◄┘
//!                                        │
//!                                        ▼
//!                           concatenate along time axis
//! ```

use std::fmt;
use std::sync::Arc;

use ndarray::{concatenate, s, Array2, Array4, ArrayView2, ArrayView4, Axis};
use tracing::{debug, trace};

use crate::convention::{ConventionPolicy, GridConvention};
use crate::error::{LoaderError, Result};
use crate::extract::VariableExtractor;
use crate::index::IndexMapper;
use crate::mask::StaticMaskProvider;
use crate::types::{GridFile, Sequence, SourceKind};

/// One ordered file list together with how to read it.
#[derive(Clone)]
pub struct SequenceSource {
    pub kind: SourceKind,
    pub files: Vec<GridFile>,
    pub variables: Vec<String>,
    pub extractor: Arc<dyn VariableExtractor>,
    pub convention: ConventionPolicy,
}

impl SequenceSource {
    /// Number of files in the source.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl fmt::Debug for SequenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceSource")
            .field("kind", &self.kind)
            .field("files", &self.files.len())
            .field("variables", &self.variables)
            .field("extractor", &self.extractor.name())
            .field("convention", &self.convention)
            .finish()
    }
}

/// Builds sequences by walking forward through a source's files.
#[derive(Debug, Clone)]
pub struct SequenceAssembler {
    mapper: IndexMapper,
    masks: Arc<StaticMaskProvider>,
}

impl SequenceAssembler {
    pub fn new(mapper: IndexMapper, masks: Arc<StaticMaskProvider>) -> Self {
        Self { mapper, masks }
    }

    pub fn mapper(&self) -> &IndexMapper {
        &self.mapper
    }

    /// Assemble `seq_len` consecutive time steps starting at global index `start`.
    ///
    /// Every step carries one extra trailing channel holding the mask plane
    /// selected by the file's grid convention. No mirroring is applied here.
    pub fn assemble(
        &self,
        source: &SequenceSource,
        start: usize,
        seq_len: usize,
    ) -> Result<Sequence> {
        if seq_len == 0 {
            return Err(LoaderError::config("seq_len must be > 0"));
        }

        let mut position = self.mapper.locate(start);
        let mut remaining = seq_len;
        let mut parts: Vec<Array4<f32>> = Vec::new();

        while remaining > 0 {
            let file = source
                .files
                .get(position.file_index)
                .ok_or(LoaderError::FileOutOfRange {
                    file_index: position.file_index,
                    available: source.files.len(),
                })?;

            let stack = source.extractor.extract(file, &source.variables)?;
            let convention = source.convention.resolve(stack.dim());

            let time = stack.len_of(Axis(0));
            let begin = position.time_offset.min(time);
            let end = (begin + remaining).min(time);
            if begin == end {
                return Err(LoaderError::extraction(
                    file.path(),
                    format!(
                        "no time steps available at offset {} (file holds {})",
                        position.time_offset, time
                    ),
                ));
            }

            let part = self.stack_mask(stack.slice(s![begin..end, .., .., ..]), convention)?;
            trace!(
                source = %source.kind,
                file = %file.name(),
                convention = %convention,
                begin = begin,
                end = end,
                "Took time steps"
            );

            remaining -= end - begin;
            parts.push(part);
            position = position.advance();
        }

        if parts.len() > 1 {
            debug!(
                source = %source.kind,
                start = start,
                files = parts.len(),
                "Sequence spans file boundary"
            );
        }

        let views: Vec<ArrayView4<f32>> = parts.iter().map(|p| p.view()).collect();
        concatenate(Axis(0), &views).map_err(|_| {
            let first = parts[0].shape().to_vec();
            let mismatched = parts
                .iter()
                .map(|p| p.shape().to_vec())
                .find(|shape| shape[1..] != first[1..])
                .unwrap_or_default();
            LoaderError::shape_mismatch(&first, &mismatched)
        })
    }

    /// Append the convention's mask plane as an extra channel to every time step.
    pub fn stack_mask(
        &self,
        steps: ArrayView4<f32>,
        convention: GridConvention,
    ) -> Result<Array4<f32>> {
        let (time, channels, rows, cols) = steps.dim();

        let zeros: Array2<f32>;
        let loaded;
        let plane: ArrayView2<f32> = match convention.zero_mask_shape() {
            Some(shape) => {
                zeros = Array2::zeros(shape);
                zeros.view()
            }
            None => {
                loaded = self.masks.mask()?;
                loaded.view()
            }
        };

        if plane.dim() != (rows, cols) {
            return Err(LoaderError::shape_mismatch(&[rows, cols], plane.shape()));
        }

        let mut out = Array4::zeros((time, channels + 1, rows, cols));
        out.slice_mut(s![.., ..channels, .., ..]).assign(&steps);
        out.slice_mut(s![.., channels, .., ..]).assign(&plane);
        Ok(out)
    }
}

/// Reverse the height axis of a `(seq, channel, rows, cols)` sequence.
pub fn mirror_vertical(sequence: &Sequence) -> Sequence {
    let mut out = Array4::zeros(sequence.dim());
    out.assign(&sequence.slice(s![.., .., ..;-1, ..]));
    out
}
