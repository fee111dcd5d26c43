//! Application path management for portable and installed modes.
//!
//! The bridge usually runs from inside a plugin bundle, next to its own
//! `config.yaml`. That is portable mode: config and logs live beside the
//! executable. Without a bundled config the platform config and data
//! directories are used instead (installed mode).
//!
//! An explicit `--config` path always wins.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application name used for directories in installed mode
const APP_NAME: &str = "Deck Bridge";

const CONFIG_FILE: &str = "config.yaml";

const PROFILES_FILE: &str = "profiles.json";

/// Application paths for config and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// Path to the configuration file (may not exist)
    pub config: PathBuf,
    /// Path to the logs directory
    pub logs_dir: PathBuf,
    /// Whether running in portable mode (config next to exe)
    pub is_portable: bool,
}

impl AppPaths {
    /// Detect paths from the running executable and the platform directories.
    ///
    /// Called before logging is initialized.
    pub fn detect(explicit_config: Option<PathBuf>) -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));

        Self::resolve(
            explicit_config,
            &exe_dir,
            dirs::config_dir().map(|dir| dir.join(APP_NAME)),
            dirs::data_dir().map(|dir| dir.join(APP_NAME)),
        )
    }

    /// Resolution rules, with every input explicit
    pub fn resolve(
        explicit_config: Option<PathBuf>,
        exe_dir: &Path,
        config_dir: Option<PathBuf>,
        data_dir: Option<PathBuf>,
    ) -> Self {
        let bundled = exe_dir.join(CONFIG_FILE);

        if let Some(config) = explicit_config {
            let logs_dir = config
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(|parent| parent.join("logs"))
                .unwrap_or_else(|| PathBuf::from("logs"));
            return Self {
                config,
                logs_dir,
                is_portable: true,
            };
        }

        if bundled.exists() {
            return Self {
                config: bundled,
                logs_dir: exe_dir.join("logs"),
                is_portable: true,
            };
        }

        match (config_dir, data_dir) {
            (Some(config_dir), data_dir) => {
                let logs_dir = data_dir
                    .unwrap_or_else(|| config_dir.clone())
                    .join("logs");
                Self {
                    config: config_dir.join(CONFIG_FILE),
                    logs_dir,
                    is_portable: false,
                }
            }
            // No platform directories: stay next to the executable
            (None, _) => Self {
                config: bundled,
                logs_dir: exe_dir.join("logs"),
                is_portable: true,
            },
        }
    }

    /// Articulation profile library, kept beside the configuration file
    pub fn profiles(&self) -> PathBuf {
        self.config.with_file_name(PROFILES_FILE)
    }

    /// Ensure the logs directory exists.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        if !self.logs_dir.exists() {
            debug!("Creating logs directory: {}", self.logs_dir.display());
            std::fs::create_dir_all(&self.logs_dir).with_context(|| {
                format!("Failed to create logs directory {}", self.logs_dir.display())
            })?;
        }
        Ok(())
    }
}
