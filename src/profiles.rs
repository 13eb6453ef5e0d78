//! Profile registry.
//!
//! A profile is a directory under `account_profiles/` holding a byte-for-byte
//! copy of `auth.json` plus a `meta.json` describing who it belongs to:
//!
//! ```text
//! account_profiles/
//!   work/auth.json
//!   work/meta.json
//!   _backups/            (reserved: names starting with `_` are not profiles)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SwitchError};
use crate::fs_utils::{copy_private, ensure_private_dir, write_private};
use crate::identity::{self, IdentitySummary, LoginType};
use crate::paths::Paths;

/// A saved profile as found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub directory: PathBuf,
    pub auth_path: PathBuf,
    pub meta_path: PathBuf,
    /// Identity read from the profile's own `auth.json`.
    pub identity: IdentitySummary,
}

impl Profile {
    fn at(paths: &Paths, name: &str, identity: IdentitySummary) -> Self {
        Self {
            name: name.to_string(),
            directory: paths.profile_dir(name),
            auth_path: paths.profile_auth(name),
            meta_path: paths.profile_meta(name),
            identity,
        }
    }

    /// Cached metadata written at save time.
    pub fn meta(&self) -> Result<ProfileMeta> {
        ProfileMeta::read(&self.meta_path)
    }
}

/// Contents of `meta.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileMeta {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub account_id: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "identity::login_type_or_unknown")]
    pub login_type: LoginType,
}

impl ProfileMeta {
    pub fn new(name: &str, identity: &IdentitySummary) -> Self {
        Self {
            name: name.to_string(),
            created_at: Utc::now(),
            account_id: identity.account_id.clone(),
            email: identity.email.clone(),
            login_type: identity.login_type,
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SwitchError::not_found("Profile metadata", path));
        }
        let content = fs::read(path).map_err(SwitchError::io("read", path))?;
        serde_json::from_slice(&content).map_err(|source| SwitchError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).map_err(|source| SwitchError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        write_private(path, content.as_bytes())
    }
}

/// Which filesystem naming rules apply to profile directory names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamePolicy {
    Posix,
    /// Case-insensitive filesystems with reserved characters and no trailing
    /// space or dot.
    Windows,
}

impl NamePolicy {
    pub fn native() -> Self {
        if cfg!(windows) { Self::Windows } else { Self::Posix }
    }
}

const WINDOWS_RESERVED_CHARS: &str = "<>:\"/\\|?*";

/// Validate a profile name under the native policy.
///
/// Returns the name with surrounding whitespace removed.
pub fn validate_profile_name(name: &str) -> Result<String> {
    validate_profile_name_with(name, NamePolicy::native())
}

pub fn validate_profile_name_with(name: &str, policy: NamePolicy) -> Result<String> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(SwitchError::invalid_name(name, "name is empty"));
    }
    if trimmed == "." || trimmed == ".." || trimmed.starts_with('_') {
        return Err(SwitchError::invalid_name(name, "name is reserved"));
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(SwitchError::invalid_name(
            name,
            "name must not contain '/' or '\\'",
        ));
    }
    if policy == NamePolicy::Windows {
        if trimmed.chars().any(|c| WINDOWS_RESERVED_CHARS.contains(c)) {
            return Err(SwitchError::invalid_name(
                name,
                format!("name must not contain any of {}", WINDOWS_RESERVED_CHARS),
            ));
        }
        if trimmed.ends_with(' ') || trimmed.ends_with('.') {
            return Err(SwitchError::invalid_name(
                name,
                "name must not end with a space or a dot",
            ));
        }
    }

    Ok(trimmed.to_string())
}

/// List profiles, sorted case-insensitively by name.
///
/// Directories without an `auth.json` and names starting with `_` are skipped.
pub fn list_profiles(paths: &Paths) -> Result<Vec<Profile>> {
    if !paths.profiles_dir.is_dir() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(&paths.profiles_dir)
        .map_err(SwitchError::io("read directory", &paths.profiles_dir))?;

    let mut profiles = Vec::new();
    for entry in entries {
        let entry = entry.map_err(SwitchError::io("read directory", &paths.profiles_dir))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('_') {
            continue;
        }
        let auth_path = paths.profile_auth(name);
        if !auth_path.is_file() {
            tracing::debug!(profile = name, "skipping profile without auth.json");
            continue;
        }
        let identity = identity::extract_from_path(&auth_path);
        profiles.push(Profile::at(paths, name, identity));
    }

    profiles.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(profiles)
}

/// Check if a profile directory exists
pub fn profile_exists(paths: &Paths, name: &str) -> bool {
    paths.profile_dir(name).exists()
}

/// Look up a single profile by name.
pub fn find_profile(paths: &Paths, name: &str) -> Result<Profile> {
    let name = validate_profile_name(name)?;
    let auth_path = paths.profile_auth(&name);
    if !auth_path.is_file() {
        return Err(SwitchError::not_found("Profile", paths.profile_dir(&name)));
    }
    let identity = identity::extract_from_path(&auth_path);
    Ok(Profile::at(paths, &name, identity))
}

/// Snapshot the active `auth.json` under `name`.
///
/// An existing profile is only replaced when `overwrite` is set.
pub fn save_current_as_profile(paths: &Paths, name: &str, overwrite: bool) -> Result<Profile> {
    let name = validate_profile_name(name)?;
    if !paths.auth_file.is_file() {
        return Err(SwitchError::not_found("Active credential", &paths.auth_file));
    }

    ensure_private_dir(&paths.profiles_dir)?;
    let profile_dir = paths.profile_dir(&name);
    if profile_dir.exists() && !overwrite {
        return Err(SwitchError::AlreadyExists {
            name,
            path: profile_dir,
        });
    }

    ensure_private_dir(&profile_dir)?;
    let auth_dst = paths.profile_auth(&name);
    copy_private(&paths.auth_file, &auth_dst)?;

    let identity = identity::extract_from_path(&auth_dst);
    ProfileMeta::new(&name, &identity).write(&paths.profile_meta(&name))?;

    tracing::info!(profile = %name, overwrite, "saved profile");
    Ok(Profile::at(paths, &name, identity))
}

/// Remove a profile directory and everything in it.
pub fn delete_profile(paths: &Paths, name: &str) -> Result<()> {
    let name = validate_profile_name(name)?;
    let profile_dir = paths.profile_dir(&name);

    if !profile_dir.exists() {
        return Err(SwitchError::not_found("Profile", profile_dir));
    }

    fs::remove_dir_all(&profile_dir).map_err(SwitchError::io("remove", &profile_dir))?;
    tracing::info!(profile = %name, "deleted profile");
    Ok(())
}
