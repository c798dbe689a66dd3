use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::proctor::devtools::DevtoolsHeuristic;
use crate::session::SessionConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub poll_interval_ms: u64,
    pub restore_attempts: u32,
    pub restore_backoff_ms: u64,
    pub devtools_threshold_cols: u32,
    pub devtools_threshold_rows: u32,
    pub min_cols: u16,
    pub min_rows: u16,
    pub escape_opens_quit: bool,
    pub toast_ttl_ms: u64,
    pub shuffle: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            restore_attempts: 3,
            restore_backoff_ms: 250,
            devtools_threshold_cols: 20,
            devtools_threshold_rows: 8,
            min_cols: 60,
            min_rows: 20,
            escape_opens_quit: true,
            toast_ttl_ms: 3000,
            shuffle: false,
        }
    }
}

impl Config {
    /// Session settings for a quiz lasting `duration`.
    pub fn session_config(&self, duration: Duration) -> SessionConfig {
        SessionConfig {
            duration,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            restore_attempts: self.restore_attempts,
            restore_backoff: Duration::from_millis(self.restore_backoff_ms),
            devtools: DevtoolsHeuristic {
                width_threshold: self.devtools_threshold_cols,
                height_threshold: self.devtools_threshold_rows,
            },
            escape_opens_quit: self.escape_opens_quit,
        }
    }

    pub fn toast_ttl(&self) -> Duration {
        Duration::from_millis(self.toast_ttl_ms)
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "quizguard") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("quizguard_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the config, writing the defaults out first when no file exists
    /// yet so there is one to edit.
    pub fn load_or_init(&self) -> Config {
        if self.path.exists() {
            return self.load();
        }
        let cfg = Config::default();
        if let Err(e) = self.save(&cfg) {
            tracing::warn!(path = %self.path.display(), error = %e, "could not write default config");
        }
        cfg
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable config");
                }
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
