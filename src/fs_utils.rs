//! Filesystem helpers for credential-bearing files.
//!
//! Every write lands in a `<name>.tmp` sibling first and is then renamed over
//! the destination, so a reader sees either the old bytes or the new bytes.
//! Files are restricted to the owner (`0600`), freshly created directories to
//! `0700`. Permission changes are best-effort: some mounts (e.g. DrvFs under
//! WSL) silently ignore or reject mode bits.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, SwitchError};

const PRIVATE_FILE_MODE: u32 = 0o600;
const PRIVATE_DIR_MODE: u32 = 0o700;

/// Create `path` (and parents) if missing.
///
/// Only a directory created by this call is chmod'ed; an existing directory is
/// left untouched.
pub fn ensure_private_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path).map_err(SwitchError::io("create directory", path))?;
    set_mode_best_effort(path, PRIVATE_DIR_MODE);
    Ok(())
}

/// Atomically replace `path` with `bytes`, owner-only.
pub fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_private_dir(parent)?;
    }

    let tmp = temp_sibling(path);
    if let Err(e) = write_temp(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    set_mode_best_effort(&tmp, PRIVATE_FILE_MODE);

    if let Err(source) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(SwitchError::Io {
            op: "move into place",
            path: path.to_path_buf(),
            source,
        });
    }

    // Not every filesystem carries the mode across a rename.
    set_mode_best_effort(path, PRIVATE_FILE_MODE);
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote private file");
    Ok(())
}

/// Atomically copy `src` over `dst`, owner-only.
///
/// The source is read fully into memory first; credential files are a few
/// kilobytes at most.
pub fn copy_private(src: &Path, dst: &Path) -> Result<()> {
    let bytes = fs::read(src).map_err(SwitchError::io("read", src))?;
    write_private(dst, &bytes)?;
    tracing::debug!(from = %src.display(), to = %dst.display(), "copied private file");
    Ok(())
}

/// `auth.json` -> `auth.json.tmp`
pub fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_temp(tmp: &Path, bytes: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.create(true).truncate(true).write(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(PRIVATE_FILE_MODE);
    }

    let mut file = options.open(tmp).map_err(SwitchError::io("create", tmp))?;
    file.write_all(bytes).map_err(SwitchError::io("write", tmp))?;
    file.sync_all().map_err(SwitchError::io("flush", tmp))?;
    Ok(())
}

#[cfg(unix)]
fn set_mode_best_effort(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
        tracing::debug!(path = %path.display(), "could not restrict permissions: {e}");
    }
}

#[cfg(not(unix))]
fn set_mode_best_effort(_path: &Path, _mode: u32) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_private_creates_parents_and_leaves_no_temp() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a/b/auth.json");

        write_private(&path, br#"{"x":1}"#).unwrap();

        assert_eq!(fs::read(&path).unwrap(), br#"{"x":1}"#);
        assert!(!temp_sibling(&path).exists());
    }

    #[test]
    fn test_write_private_replaces_existing_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("auth.json");
        fs::write(&path, "old old old old").unwrap();

        write_private(&path, b"new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_copy_private_is_byte_identical() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src.json");
        let dst = temp_dir.path().join("out/dst.json");
        let bytes = b"{\n  \"tokens\": {\"account_id\": \"acc1\"}\n}\r\n";
        fs::write(&src, bytes).unwrap();

        copy_private(&src, &dst).unwrap();

        assert_eq!(fs::read(&dst).unwrap(), bytes);
    }

    #[test]
    fn test_copy_private_missing_source_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = copy_private(&temp_dir.path().join("nope"), &temp_dir.path().join("dst"))
            .unwrap_err();
        assert!(matches!(err, SwitchError::Io { op: "read", .. }));
        assert!(!temp_dir.path().join("dst").exists());
    }

    #[test]
    fn test_temp_sibling_name() {
        let tmp = temp_sibling(Path::new("/h/auth.json"));
        assert_eq!(tmp, PathBuf::from("/h/auth.json.tmp"));
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("private");
        let path = dir.join("auth.json");

        write_private(&path, b"{}").unwrap();

        let file_mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        let dir_mode = fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        assert_eq!(dir_mode, 0o700);
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_private_dir_leaves_existing_dir_alone() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("shared");
        fs::create_dir(&dir).unwrap();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();

        ensure_private_dir(&dir).unwrap();

        let mode = fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
    }
}
