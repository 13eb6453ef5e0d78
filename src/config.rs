//! Environment-driven configuration.
//!
//! | Variable                      | Effect                                      |
//! |-------------------------------|---------------------------------------------|
//! | `CODEX_HOME`                  | home directory (disables the WSL bridge)    |
//! | `CODEX_WIN_HOME`              | host-side home directory for the bridge     |
//! | `CODEX_WSL_AUTOSYNC`          | `bootstrap` (default), `newest`, `off`      |
//! | `CODEX_WSL_SYNC_THRESHOLD_MS` | `newest` tie window, default 1000           |

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_HOME: &str = "CODEX_HOME";
pub const ENV_HOST_HOME: &str = "CODEX_WIN_HOME";
pub const ENV_SYNC_MODE: &str = "CODEX_WSL_AUTOSYNC";
pub const ENV_SYNC_THRESHOLD_MS: &str = "CODEX_WSL_SYNC_THRESHOLD_MS";

pub const DEFAULT_SYNC_THRESHOLD: Duration = Duration::from_secs(1);

/// Policy for reconciling the local and host-side `auth.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    Off,
    /// Import from the host only when nothing exists locally.
    #[default]
    Bootstrap,
    /// Copy whichever side was modified last over the other.
    Newest,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Off => "off",
            SyncMode::Bootstrap => "bootstrap",
            SyncMode::Newest => "newest",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "bootstrap" => Ok(Self::Bootstrap),
            "newest" => Ok(Self::Newest),
            "off" | "0" | "false" | "no" => Ok(Self::Off),
            other => Err(format!("invalid sync mode: {}", other)),
        }
    }
}

/// Resolved configuration for one process run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Raw `CODEX_HOME` value, if set and non-empty.
    pub home_override: Option<String>,
    /// Raw `CODEX_WIN_HOME` value, if set and non-empty.
    pub host_home_override: Option<String>,
    pub sync_mode: SyncMode,
    /// Modification times closer than this are treated as in sync.
    pub sync_threshold: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            home_override: None,
            host_home_override: None,
            sync_mode: SyncMode::default(),
            sync_threshold: DEFAULT_SYNC_THRESHOLD,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let sync_mode = match non_empty(ENV_SYNC_MODE) {
            None => SyncMode::default(),
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!("{ENV_SYNC_MODE}: {e}; sync disabled");
                SyncMode::Off
            }),
        };

        let sync_threshold = match non_empty(ENV_SYNC_THRESHOLD_MS) {
            None => DEFAULT_SYNC_THRESHOLD,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) => Duration::from_millis(ms),
                Err(e) => {
                    tracing::warn!("{ENV_SYNC_THRESHOLD_MS}={raw:?} is not a number ({e}); using default");
                    DEFAULT_SYNC_THRESHOLD
                }
            },
        };

        Self {
            home_override: non_empty(ENV_HOME),
            host_home_override: non_empty(ENV_HOST_HOME),
            sync_mode,
            sync_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_sync_mode_parse() {
        assert_eq!("bootstrap".parse::<SyncMode>().unwrap(), SyncMode::Bootstrap);
        assert_eq!(" Newest ".parse::<SyncMode>().unwrap(), SyncMode::Newest);
        for off in ["off", "0", "false", "NO"] {
            assert_eq!(off.parse::<SyncMode>().unwrap(), SyncMode::Off);
        }
        assert!("sometimes".parse::<SyncMode>().is_err());
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[]));
        assert_eq!(settings.sync_mode, SyncMode::Bootstrap);
        assert_eq!(settings.sync_threshold, Duration::from_secs(1));
        assert!(settings.home_override.is_none());
        assert!(settings.host_home_override.is_none());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            (ENV_HOME, "/tmp/h"),
            (ENV_HOST_HOME, "C:\\Users\\me\\.codex"),
            (ENV_SYNC_MODE, "newest"),
            (ENV_SYNC_THRESHOLD_MS, "2500"),
        ]));
        assert_eq!(settings.home_override.as_deref(), Some("/tmp/h"));
        assert_eq!(
            settings.host_home_override.as_deref(),
            Some("C:\\Users\\me\\.codex")
        );
        assert_eq!(settings.sync_mode, SyncMode::Newest);
        assert_eq!(settings.sync_threshold, Duration::from_millis(2500));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let settings = Settings::from_lookup(lookup(&[(ENV_HOME, "  "), (ENV_SYNC_MODE, "")]));
        assert!(settings.home_override.is_none());
        assert_eq!(settings.sync_mode, SyncMode::Bootstrap);
    }

    #[test]
    fn test_invalid_values() {
        let settings = Settings::from_lookup(lookup(&[
            (ENV_SYNC_MODE, "always"),
            (ENV_SYNC_THRESHOLD_MS, "soon"),
        ]));
        assert_eq!(settings.sync_mode, SyncMode::Off);
        assert_eq!(settings.sync_threshold, DEFAULT_SYNC_THRESHOLD);
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        // SAFETY: serialized with the other env-reading tests.
        unsafe {
            std::env::set_var(ENV_SYNC_MODE, "off");
        }
        let settings = Settings::from_env();
        unsafe {
            std::env::remove_var(ENV_SYNC_MODE);
        }
        assert_eq!(settings.sync_mode, SyncMode::Off);
    }
}
