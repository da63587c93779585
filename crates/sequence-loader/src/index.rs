//! Mapping from flat sample indices to file positions.

use crate::error::{LoaderError, Result};

/// Position of a time step inside the ordered file list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilePosition {
    pub file_index: usize,
    pub time_offset: usize,
}

impl FilePosition {
    /// First time step of the following file.
    pub fn advance(self) -> Self {
        Self {
            file_index: self.file_index + 1,
            time_offset: 0,
        }
    }
}

/// Converts a global sample index into `(file_index, time_offset)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexMapper {
    file_len: usize,
}

impl IndexMapper {
    /// Create a mapper for files holding `file_len` time steps each.
    pub fn new(file_len: usize) -> Result<Self> {
        if file_len == 0 {
            return Err(LoaderError::config("file_len must be > 0"));
        }
        Ok(Self { file_len })
    }

    pub fn file_len(&self) -> usize {
        self.file_len
    }

    /// Locate the file and intra-file offset of sample `index`.
    pub fn locate(&self, index: usize) -> FilePosition {
        FilePosition {
            file_index: index / self.file_len,
            time_offset: index % self.file_len,
        }
    }

    /// Locate a signed index, rejecting negative values instead of wrapping.
    pub fn locate_signed(&self, index: i64) -> Result<FilePosition> {
        let unsigned = usize::try_from(index).map_err(|_| LoaderError::IndexOutOfRange {
            index,
            len: usize::MAX,
        })?;
        Ok(self.locate(unsigned))
    }

    /// Inverse of [`locate`](Self::locate).
    pub fn flat_index(&self, position: FilePosition) -> usize {
        position.file_index * self.file_len + position.time_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_file_boundaries() {
        let mapper = IndexMapper::new(24).unwrap();
        for k in 0..10 {
            assert_eq!(
                mapper.locate(24 * k),
                FilePosition {
                    file_index: k,
                    time_offset: 0
                }
            );
        }
    }

    #[test]
    fn test_locate_within_file() {
        let mapper = IndexMapper::new(24).unwrap();
        for k in 0..4 {
            for r in 0..24 {
                let pos = mapper.locate(24 * k + r);
                assert_eq!(pos.file_index, k);
                assert_eq!(pos.time_offset, r);
                assert_eq!(mapper.flat_index(pos), 24 * k + r);
            }
        }
    }

    #[test]
    fn test_advance_resets_offset() {
        let mapper = IndexMapper::new(24).unwrap();
        let next = mapper.locate(22).advance();
        assert_eq!(
            next,
            FilePosition {
                file_index: 1,
                time_offset: 0
            }
        );
    }

    #[test]
    fn test_negative_index_rejected() {
        let mapper = IndexMapper::new(24).unwrap();
        assert!(matches!(
            mapper.locate_signed(-1),
            Err(LoaderError::IndexOutOfRange { index: -1, .. })
        ));
        assert_eq!(mapper.locate_signed(25).unwrap().file_index, 1);
    }

    #[test]
    fn test_zero_file_len_rejected() {
        assert!(matches!(IndexMapper::new(0), Err(LoaderError::Config(_))));
    }
}
