//! Platform directory resolution.

use std::path::{Path, PathBuf};

const APP_NAME: &str = "strata";

/// Errors raised while resolving directories.
#[derive(Debug, thiserror::Error)]
pub enum DirsError {
    #[error("could not determine OS configuration directory")]
    NoConfigDir,

    #[error("failed to create directory: {0}")]
    Io(#[from] std::io::Error),
}

/// OS-specific locations used by the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrataDirs {
    /// Holds `config.ron`.
    pub config_dir: PathBuf,
    /// Holds log files.
    pub log_dir: PathBuf,
}

impl StrataDirs {
    /// Resolve the platform locations without touching the disk.
    ///
    /// # Errors
    ///
    /// Returns [`DirsError::NoConfigDir`] if the OS exposes no configuration
    /// directory.
    pub fn resolve() -> Result<Self, DirsError> {
        let base = dirs::config_dir().ok_or(DirsError::NoConfigDir)?;
        Ok(Self::with_root(&base))
    }

    /// Locations rooted under `root`; an explicit `--config` directory uses
    /// this.
    pub fn with_root(root: &Path) -> Self {
        let app_dir = root.join(APP_NAME);
        Self {
            config_dir: app_dir.clone(),
            log_dir: app_dir.join("logs"),
        }
    }

    /// Create every directory on disk.
    ///
    /// # Errors
    ///
    /// Returns [`DirsError::Io`] if a directory cannot be created.
    pub fn create_dirs(&self) -> Result<(), DirsError> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }
}
