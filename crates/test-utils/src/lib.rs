//! Test support for the sequence loader workspace.
//!
//! - [`generators`]: stacks whose values encode their own position, and
//!   simple mask planes.
//! - [`fixtures`]: temporary directories of paired WRF / reanalysis `.npy`
//!   files plus a land mask.
//! - [`paths`]: lookup of optional real data files (WRF NetCDF samples are
//!   too large to commit).
//!
//! ```ignore
//! use test_utils::{grid, PairedFixture};
//!
//! let fixture = PairedFixture::write(2, 3, grid::WRF_NARROW, 3, grid::ERA)?;
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Resolve an optional data file or return early from the test.
///
/// ```ignore
/// #[test]
/// fn test_reads_wrfout() {
///     let path = require_test_file!("wrfout_d01_sample.nc");
///     // ...
/// }
/// ```
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        let name = $name;
        let Some(path) = $crate::find_test_file(name) else {
            eprintln!("skipping: '{}' not found (set TEST_DATA_DIR to run)", name);
            return;
        };
        path
    }};
}

/// Assert two numbers are within `epsilon` of each other.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let (left, right, epsilon) = ($left as f64, $right as f64, $epsilon as f64);
        assert!(
            (left - right).abs() <= epsilon,
            "assertion failed: {} is not within {} of {} (diff {})",
            left,
            epsilon,
            right,
            (left - right).abs()
        );
    }};
}
