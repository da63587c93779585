//! On-disk `.npy` fixtures for paired WRF / reanalysis datasets.

use std::path::{Path, PathBuf};

use ndarray::Array2;
use ndarray_npy::write_npy;
use tempfile::TempDir;

use crate::generators::encoded_stack;

/// Common grid shapes `(rows, cols)`.
pub mod grid {
    /// Narrow stand-in for the native WRF grid; 210 rows marks the convention.
    pub const WRF_NARROW: (usize, usize) = (210, 8);

    /// Reanalysis grid; matches the zero mask shape.
    pub const ERA: (usize, usize) = (67, 215);
}

/// Time steps per fixture file.
pub const FIXTURE_FILE_LEN: usize = 24;

/// Paired input/target directories of `(T, C, H, W)` stacks plus a land mask.
///
/// File `k` of both sources holds [`encoded_stack`] with file id `k`, so a
/// value read back identifies the file, step, channel and row it came from.
pub struct PairedFixture {
    dir: TempDir,
    pub wrf_files: Vec<PathBuf>,
    pub era_files: Vec<PathBuf>,
    pub mask_path: PathBuf,
}

impl PairedFixture {
    /// Write `files` pairs. Input files use `wrf_grid` with `wrf_channels`
    /// channels; target files use `era_grid` with `era_channels` channels.
    /// The mask matches `wrf_grid` and holds `1.0` on even rows.
    pub fn write(
        files: usize,
        wrf_channels: usize,
        wrf_grid: (usize, usize),
        era_channels: usize,
        era_grid: (usize, usize),
    ) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("paired_fixture_").tempdir()?;
        let wrf_dir = dir.path().join("wrf");
        let era_dir = dir.path().join("era");
        std::fs::create_dir_all(&wrf_dir)?;
        std::fs::create_dir_all(&era_dir)?;

        let mut wrf_files = Vec::with_capacity(files);
        let mut era_files = Vec::with_capacity(files);
        for k in 0..files {
            let day = k + 1;
            let wrf = wrf_dir.join(format!("wrf_2019-01-{:02}.npy", day));
            let era = era_dir.join(format!("era_2019-01-{:02}.npy", day));

            let (rows, cols) = wrf_grid;
            write_npy(&wrf, &encoded_stack(k, (FIXTURE_FILE_LEN, wrf_channels, rows, cols)))
                .map_err(to_io)?;
            let (rows, cols) = era_grid;
            write_npy(&era, &encoded_stack(k, (FIXTURE_FILE_LEN, era_channels, rows, cols)))
                .map_err(to_io)?;

            wrf_files.push(wrf);
            era_files.push(era);
        }

        let mask_path = dir.path().join("landmask.npy");
        let (rows, cols) = wrf_grid;
        let mask =
            Array2::from_shape_fn((rows, cols), |(h, _)| if h % 2 == 0 { 1.0f32 } else { 0.0 });
        write_npy(&mask_path, &mask).map_err(to_io)?;

        Ok(Self {
            dir,
            wrf_files,
            era_files,
            mask_path,
        })
    }

    /// Root of the fixture.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn wrf_dir(&self) -> PathBuf {
        self.dir.path().join("wrf")
    }

    pub fn era_dir(&self) -> PathBuf {
        self.dir.path().join("era")
    }
}

fn to_io(err: ndarray_npy::WriteNpyError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
}
