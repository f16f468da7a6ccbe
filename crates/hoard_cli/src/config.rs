//! Runtime settings for the interactive shell.
//!
//! The binary takes no flags; everything has a default and can be
//! overridden through environment variables.

use hoard_core::default_log_level;
use std::path::{Path, PathBuf};

/// Database file, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "entity-hoarder/entities.db";
/// Log directory, relative to the working directory.
pub const DEFAULT_LOG_DIR: &str = "entity-hoarder/logs";

pub const DB_PATH_ENV: &str = "ENTITY_HOARD_DB";
pub const LOG_LEVEL_ENV: &str = "ENTITY_HOARD_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "ENTITY_HOARD_LOG_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoardConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// Always absolute; the logger rejects relative directories.
    pub log_dir: PathBuf,
}

impl HoardConfig {
    /// Resolves settings from the process environment.
    pub fn from_env() -> std::io::Result<Self> {
        let cwd = std::env::current_dir()?;
        Ok(Self::resolve(|key| std::env::var(key).ok(), &cwd))
    }

    /// Resolves settings from `lookup`, anchoring relative paths at `cwd`.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>, cwd: &Path) -> Self {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let db_path = non_blank(DB_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
        let log_level =
            non_blank(LOG_LEVEL_ENV).unwrap_or_else(|| default_log_level().to_string());
        let log_dir = non_blank(LOG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));
        let log_dir = if log_dir.is_absolute() {
            log_dir
        } else {
            cwd.join(log_dir)
        };

        Self {
            db_path,
            log_level,
            log_dir,
        }
    }
}
