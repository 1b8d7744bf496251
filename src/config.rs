//! Optional settings file

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// SQLite catalog used when `--database` is not given
    pub database: PathBuf,
    /// env_logger filter used when RUST_LOG is unset
    pub log_level: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("craft_planner.db"),
            log_level: "warn".to_string(),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "craft-planner").map(|dirs| dirs.config_dir().join("config.toml"))
}

impl PlannerConfig {
    /// Read `path`, or the per-user config file when `path` is `None`.
    ///
    /// A missing per-user file gives the defaults. An explicit path that is
    /// missing, or any file that does not parse, is an error; the caller
    /// logs it once the logger is up and falls back to the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match default_config_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound && !explicit => return Ok(Self::default()),
            Err(e) => return Err(e).with_context(|| format!("Failed to read config {}", path.display())),
        };

        toml::from_str(&contents).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn save(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("Failed to create config directory: {e}");
                return;
            }
        }
        match toml::to_string_pretty(self) {
            Ok(contents) => {
                if let Err(e) = fs::write(path, contents) {
                    warn!("Failed to write config: {e}");
                }
            }
            Err(e) => warn!("Failed to serialize config: {e}"),
        }
    }
}
