//! Typed failures surfaced by the profile registry and the active-credential store.
//!
//! Display-only work (identity extraction, host discovery) never produces one of
//! these; it degrades to empty values instead.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SwitchError {
    #[error("{what} not found: {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },

    #[error("Profile '{name}' already exists: {}", path.display())]
    AlreadyExists { name: String, path: PathBuf },

    #[error("Invalid profile name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Failed to {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl SwitchError {
    pub fn not_found(what: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            what,
            path: path.into(),
        }
    }

    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Adapter for `map_err` that tags an I/O error with the operation and path.
    pub fn io<'a>(op: &'static str, path: &'a Path) -> impl FnOnce(std::io::Error) -> Self + 'a {
        move |source| Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub fn is_invalid_name(&self) -> bool {
        matches!(self, Self::InvalidName { .. })
    }
}

pub type Result<T> = std::result::Result<T, SwitchError>;
