//! Locating optional on-disk test data.

use std::path::{Path, PathBuf};

/// Environment variable pointing at an extra test data directory.
pub const TEST_DATA_ENV: &str = "TEST_DATA_DIR";

/// Workspace root, two levels above this crate's manifest.
pub fn workspace_root() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest
        .ancestors()
        .nth(2)
        .unwrap_or(manifest)
        .to_path_buf()
}

/// `crates/<crate_name>/testdata`.
pub fn crate_testdata_dir(crate_name: &str) -> PathBuf {
    workspace_root().join("crates").join(crate_name).join("testdata")
}

/// Directories searched by [`find_test_file`], in order.
pub fn test_data_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::env::var_os(TEST_DATA_ENV)
        .map(PathBuf::from)
        .into_iter()
        .collect();
    dirs.push(crate_testdata_dir("netcdf-parser"));
    dirs.push(crate_testdata_dir("sequence-loader"));
    dirs.push(workspace_root().join("testdata"));
    dirs
}

/// First existing `name` under [`test_data_dirs`].
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    test_data_dirs()
        .into_iter()
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
}
