//! Test utilities shared across test modules

use crate::paths::Paths;
use std::fs;
use tempfile::TempDir;

/// Paths rooted at `<temp>/.codex`, mimicking the real layout.
pub fn setup_test_paths(temp_dir: &TempDir) -> Paths {
    Paths::with_home(temp_dir.path().join(".codex"), true)
}

/// Write `contents` as the active credential.
pub fn write_active(paths: &Paths, contents: &str) {
    fs::create_dir_all(&paths.home).unwrap();
    fs::write(&paths.auth_file, contents).unwrap();
}
