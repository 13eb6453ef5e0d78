//! Active-credential store.
//!
//! `~/.codex/auth.json` is the one file Codex actually reads. Switching
//! replaces it atomically, after copying whatever was there into
//! `account_profiles/_backups/auth_<UTC timestamp>.json`. Backups are never
//! pruned.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SwitchError};
use crate::fs_utils::{copy_private, ensure_private_dir, write_private};
use crate::identity::{self, IdentitySummary};
use crate::paths::Paths;
use crate::profiles::Profile;

const BACKUP_PREFIX: &str = "auth_";
const BACKUP_SUFFIX: &str = ".json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// State of the active credential file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    Missing,
    /// Present, but not a JSON document.
    Unparseable,
    Present(IdentitySummary),
}

impl AuthStatus {
    pub fn detect(path: &Path) -> Self {
        match fs::read(path) {
            Err(_) if !path.exists() => Self::Missing,
            Err(_) => Self::Unparseable,
            Ok(bytes) => match serde_json::from_slice::<serde_json::Value>(&bytes) {
                Ok(document) => Self::Present(identity::extract(&document)),
                Err(_) => Self::Unparseable,
            },
        }
    }
}

/// Identity of the active credential; empty if missing or malformed.
pub fn read_current_identity(paths: &Paths) -> IdentitySummary {
    if !paths.auth_file.exists() {
        return IdentitySummary::default();
    }
    identity::extract_from_path(&paths.auth_file)
}

/// Result of a switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchOutcome {
    /// Copy of the previous active credential, if there was one.
    pub backup: Option<PathBuf>,
}

/// Make `profile` the active credential.
pub fn switch_to_profile(paths: &Paths, profile: &Profile) -> Result<SwitchOutcome> {
    if !profile.auth_path.is_file() {
        return Err(SwitchError::not_found("Profile credential", &profile.auth_path));
    }

    let backup = replace_active(paths, &profile.auth_path)?;
    tracing::info!(profile = %profile.name, "switched active credential");
    Ok(SwitchOutcome { backup })
}

/// Copy a backup back into the active location.
///
/// The current active credential is itself backed up first.
pub fn restore_backup(paths: &Paths, id: &str) -> Result<SwitchOutcome> {
    let source = backup_path(paths, id)?;
    let backup = replace_active(paths, &source)?;
    tracing::info!(backup = id, "restored backup");
    Ok(SwitchOutcome { backup })
}

fn replace_active(paths: &Paths, source: &Path) -> Result<Option<PathBuf>> {
    // Read first: the source may be a backup that the backup below replaces.
    let bytes = fs::read(source).map_err(SwitchError::io("read", source))?;
    ensure_private_dir(&paths.home)?;
    let backup = backup_active_auth(paths, Utc::now())?;
    write_private(&paths.auth_file, &bytes)?;
    Ok(backup)
}

/// Copy the active credential into the backups area.
///
/// Returns `None` when there is nothing to back up. Two backups taken within
/// the same second share a name; the later one wins.
pub fn backup_active_auth(paths: &Paths, now: DateTime<Utc>) -> Result<Option<PathBuf>> {
    if !paths.auth_file.exists() {
        return Ok(None);
    }
    ensure_private_dir(&paths.backups_dir)?;
    let backup = paths.backups_dir.join(backup_file_name(now));
    copy_private(&paths.auth_file, &backup)?;
    tracing::debug!(backup = %backup.display(), "backed up active credential");
    Ok(Some(backup))
}

/// `auth_20240115T103000Z.json`
pub fn backup_file_name(at: DateTime<Utc>) -> String {
    format!(
        "{}{}{}",
        BACKUP_PREFIX,
        at.format(BACKUP_TIMESTAMP_FORMAT),
        BACKUP_SUFFIX
    )
}

/// Timestamp encoded in a backup file name.
pub fn parse_backup_time(file_name: &str) -> Option<DateTime<Utc>> {
    let stamp = file_name
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(BACKUP_SUFFIX)?;
    NaiveDateTime::parse_from_str(stamp, BACKUP_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    /// File name, used as the id for restore.
    pub id: String,
    pub path: PathBuf,
    pub taken_at: DateTime<Utc>,
    pub size: u64,
    pub identity: IdentitySummary,
}

/// List backups, most recent first.
pub fn list_backups(paths: &Paths) -> Result<Vec<BackupEntry>> {
    if !paths.backups_dir.is_dir() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(&paths.backups_dir)
        .map_err(SwitchError::io("read directory", &paths.backups_dir))?;

    let mut backups: Vec<BackupEntry> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let id = e.file_name().to_str()?.to_string();
            let taken_at = parse_backup_time(&id)?;
            let metadata = e.metadata().ok().filter(|m| m.is_file())?;
            let path = e.path();
            Some(BackupEntry {
                identity: identity::extract_from_path(&path),
                id,
                path,
                taken_at,
                size: metadata.len(),
            })
        })
        .collect();

    backups.sort_by(|a, b| b.taken_at.cmp(&a.taken_at));
    Ok(backups)
}

fn backup_path(paths: &Paths, id: &str) -> Result<PathBuf> {
    if parse_backup_time(id).is_none() {
        return Err(SwitchError::not_found("Backup", paths.backups_dir.join(id)));
    }
    let path = paths.backups_dir.join(id);
    if !path.is_file() {
        return Err(SwitchError::not_found("Backup", path));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::{find_profile, save_current_as_profile};
    use crate::test_utils::{setup_test_paths, write_active};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn backup_count(paths: &Paths) -> usize {
        list_backups(paths).unwrap().len()
    }

    #[test]
    fn test_auth_status_detect() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);

        assert_eq!(AuthStatus::detect(&paths.auth_file), AuthStatus::Missing);

        write_active(&paths, "{oops");
        assert_eq!(AuthStatus::detect(&paths.auth_file), AuthStatus::Unparseable);

        write_active(&paths, r#"{"tokens":{"account_id":"acc1"}}"#);
        match AuthStatus::detect(&paths.auth_file) {
            AuthStatus::Present(identity) => {
                assert_eq!(identity.account_id.as_deref(), Some("acc1"))
            }
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[test]
    fn test_read_current_identity_degrades() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        assert!(read_current_identity(&paths).is_empty());

        write_active(&paths, "[]");
        assert!(read_current_identity(&paths).is_empty());
    }

    #[test]
    fn test_switch_replaces_active_and_backs_up() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);

        write_active(&paths, r#"{"tokens":{"account_id":"work"}}"#);
        save_current_as_profile(&paths, "work", false).unwrap();
        let before = r#"{"tokens":{"account_id":"home"}}"#;
        write_active(&paths, before);

        let profile = find_profile(&paths, "work").unwrap();
        let outcome = switch_to_profile(&paths, &profile).unwrap();

        assert_eq!(
            fs::read(&paths.auth_file).unwrap(),
            fs::read(&profile.auth_path).unwrap()
        );
        let backup = outcome.backup.expect("backup taken");
        assert_eq!(fs::read_to_string(&backup).unwrap(), before);
        assert_eq!(backup_count(&paths), 1);
        assert_eq!(
            read_current_identity(&paths).account_id.as_deref(),
            Some("work")
        );
    }

    #[test]
    fn test_switch_without_existing_active_takes_no_backup() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        write_active(&paths, "{}");
        let profile = save_current_as_profile(&paths, "p", false).unwrap();
        fs::remove_file(&paths.auth_file).unwrap();

        let outcome = switch_to_profile(&paths, &profile).unwrap();

        assert!(outcome.backup.is_none());
        assert_eq!(backup_count(&paths), 0);
        assert_eq!(fs::read_to_string(&paths.auth_file).unwrap(), "{}");
    }

    #[test]
    fn test_switch_to_missing_profile_credential() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        write_active(&paths, "{}");
        let profile = save_current_as_profile(&paths, "p", false).unwrap();
        fs::remove_file(&profile.auth_path).unwrap();

        let err = switch_to_profile(&paths, &profile).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(backup_count(&paths), 0);
    }

    #[test]
    fn test_backup_naming() {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(backup_file_name(at), "auth_20240115T103000Z.json");
        assert_eq!(parse_backup_time("auth_20240115T103000Z.json"), Some(at));
        assert_eq!(parse_backup_time("auth_garbage.json"), None);
        assert_eq!(parse_backup_time("settings.json"), None);
    }

    #[test]
    fn test_same_second_backup_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();

        write_active(&paths, "first");
        backup_active_auth(&paths, at).unwrap();
        write_active(&paths, "second");
        let path = backup_active_auth(&paths, at).unwrap().unwrap();

        assert_eq!(backup_count(&paths), 1);
        assert_eq!(fs::read_to_string(path).unwrap(), "second");
    }

    #[test]
    fn test_list_backups_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        write_active(&paths, "{}");
        let older = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        backup_active_auth(&paths, older).unwrap();
        backup_active_auth(&paths, newer).unwrap();
        fs::write(paths.backups_dir.join("README"), "ignored").unwrap();

        let backups = list_backups(&paths).unwrap();
        assert_eq!(backups.len(), 2);
        assert_eq!(backups[0].taken_at, newer);
        assert_eq!(backups[1].taken_at, older);
    }

    #[test]
    fn test_restore_backup() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        write_active(&paths, r#"{"tokens":{"account_id":"old"}}"#);
        backup_active_auth(&paths, at).unwrap();
        write_active(&paths, r#"{"tokens":{"account_id":"new"}}"#);

        let outcome = restore_backup(&paths, "auth_20240115T103000Z.json").unwrap();

        assert_eq!(
            read_current_identity(&paths).account_id.as_deref(),
            Some("old")
        );
        let safety = outcome.backup.unwrap();
        assert_eq!(
            fs::read_to_string(safety).unwrap(),
            r#"{"tokens":{"account_id":"new"}}"#
        );
    }

    #[test]
    fn test_restore_unknown_backup() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        assert!(restore_backup(&paths, "auth_20240115T103000Z.json")
            .unwrap_err()
            .is_not_found());
        assert!(restore_backup(&paths, "../auth.json").unwrap_err().is_not_found());
    }
}
