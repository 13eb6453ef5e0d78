use anyhow::{Context, Result};
use directories::BaseDirs;
use std::path::{Path, PathBuf};

use crate::config::Settings;

pub const AUTH_FILE: &str = "auth.json";
pub const META_FILE: &str = "meta.json";
pub const PROFILES_DIR: &str = "account_profiles";
pub const BACKUPS_DIR: &str = "_backups";
/// Directory name of the Codex home under a user profile.
pub const HOME_DIR_NAME: &str = ".codex";

/// All computed paths used by codex-switch
#[derive(Debug, Clone)]
pub struct Paths {
    /// ~/.codex (or `CODEX_HOME`)
    pub home: PathBuf,
    /// ~/.codex/auth.json
    pub auth_file: PathBuf,
    /// ~/.codex/account_profiles
    pub profiles_dir: PathBuf,
    /// ~/.codex/account_profiles/_backups
    pub backups_dir: PathBuf,
    /// True when the home came from `CODEX_HOME` rather than the default.
    pub home_overridden: bool,
}

impl Paths {
    pub fn new(settings: &Settings) -> Result<Self> {
        match &settings.home_override {
            Some(raw) => {
                let home = expand_tilde(raw).context("Failed to expand CODEX_HOME")?;
                Ok(Self::with_home(home, true))
            }
            None => {
                let base_dirs = BaseDirs::new().context("Failed to determine home directory")?;
                Ok(Self::with_home(base_dirs.home_dir().join(HOME_DIR_NAME), false))
            }
        }
    }

    /// Lay out paths under an explicit home directory.
    pub fn with_home(home: impl Into<PathBuf>, home_overridden: bool) -> Self {
        let home = home.into();
        let auth_file = home.join(AUTH_FILE);
        let profiles_dir = home.join(PROFILES_DIR);
        let backups_dir = profiles_dir.join(BACKUPS_DIR);

        Self {
            home,
            auth_file,
            profiles_dir,
            backups_dir,
            home_overridden,
        }
    }

    /// Get the path to a specific profile directory
    pub fn profile_dir(&self, name: &str) -> PathBuf {
        self.profiles_dir.join(name)
    }

    /// Get the path to a specific profile's auth.json
    pub fn profile_auth(&self, name: &str) -> PathBuf {
        self.profile_dir(name).join(AUTH_FILE)
    }

    /// Get the path to a specific profile's meta.json
    pub fn profile_meta(&self, name: &str) -> PathBuf {
        self.profile_dir(name).join(META_FILE)
    }
}

/// Expand a leading `~` or `~/` against the user's home directory.
pub fn expand_tilde(raw: &str) -> Result<PathBuf> {
    let rest = if raw == "~" {
        ""
    } else if let Some(rest) = raw.strip_prefix("~/") {
        rest
    } else {
        return Ok(PathBuf::from(raw));
    };
    let base_dirs = BaseDirs::new().context("Failed to determine home directory")?;
    Ok(base_dirs.home_dir().join(rest))
}

/// `<host_home>/auth.json`
pub fn auth_file_in(home: &Path) -> PathBuf {
    home.join(AUTH_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = Paths::with_home("/tmp/h", true);
        assert_eq!(paths.auth_file, PathBuf::from("/tmp/h/auth.json"));
        assert_eq!(paths.profiles_dir, PathBuf::from("/tmp/h/account_profiles"));
        assert_eq!(
            paths.backups_dir,
            PathBuf::from("/tmp/h/account_profiles/_backups")
        );
        assert_eq!(
            paths.profile_auth("x"),
            PathBuf::from("/tmp/h/account_profiles/x/auth.json")
        );
        assert_eq!(
            paths.profile_meta("x"),
            PathBuf::from("/tmp/h/account_profiles/x/meta.json")
        );
    }

    #[test]
    fn test_override_from_settings() {
        let settings = Settings {
            home_override: Some("/srv/codex".to_string()),
            ..Settings::default()
        };
        let paths = Paths::new(&settings).unwrap();
        assert_eq!(paths.home, PathBuf::from("/srv/codex"));
        assert!(paths.home_overridden);
    }

    #[test]
    fn test_default_home() {
        let paths = Paths::new(&Settings::default()).unwrap();
        assert!(paths.home.ends_with(".codex"));
        assert!(!paths.home_overridden);
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/abs").unwrap(), PathBuf::from("/abs"));
        assert_eq!(expand_tilde("rel/x").unwrap(), PathBuf::from("rel/x"));
        let expanded = expand_tilde("~/codex").unwrap();
        assert!(expanded.is_absolute());
        assert!(expanded.ends_with("codex"));
    }
}
