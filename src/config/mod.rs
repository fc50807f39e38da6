use crate::errors::{AppError, AppResult};
use crate::utils::path::expand_tilde;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod migrate; // use submodule at src/config/migrate.rs

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_seconds: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Extra idle allowance before a resume turns into an auto clock-out.
    /// Unset means "same as the idle threshold".
    #[serde(default)]
    pub recovery_grace_margin_seconds: Option<u64>,
    #[serde(default)]
    pub lock_triggers_idle: bool,
    #[serde(default = "default_sleep_gap")]
    pub sleep_gap_seconds: u64,
    #[serde(default)]
    pub activity_file: Option<String>,
    #[serde(default = "default_retry_limit")]
    pub persist_retry_limit: u32,
    #[serde(default = "default_backoff_ms")]
    pub persist_backoff_ms: u64,
    #[serde(default = "default_log_tail")]
    pub log_tail_entries: usize,
}

fn default_database() -> String {
    Config::database_file().to_string_lossy().to_string()
}
fn default_data_dir() -> String {
    Config::config_dir().to_string_lossy().to_string()
}
fn default_idle_threshold() -> u64 {
    300
}
fn default_poll_interval() -> u64 {
    10
}
fn default_sleep_gap() -> u64 {
    120
}
fn default_retry_limit() -> u32 {
    5
}
fn default_backoff_ms() -> u64 {
    200
}
fn default_log_tail() -> usize {
    500
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database(),
            data_dir: default_data_dir(),
            idle_threshold_seconds: default_idle_threshold(),
            poll_interval_seconds: default_poll_interval(),
            recovery_grace_margin_seconds: None,
            lock_triggers_idle: false,
            sleep_gap_seconds: default_sleep_gap(),
            activity_file: None,
            persist_retry_limit: default_retry_limit(),
            persist_backoff_ms: default_backoff_ms(),
            log_tail_entries: default_log_tail(),
        }
    }
}

impl Config {
    /// Keys written by `init`; `config --check` reports the ones missing from the file.
    pub const KEYS: [&'static str; 11] = [
        "database",
        "data_dir",
        "idle_threshold_seconds",
        "poll_interval_seconds",
        "recovery_grace_margin_seconds",
        "lock_triggers_idle",
        "sleep_gap_seconds",
        "activity_file",
        "persist_retry_limit",
        "persist_backoff_ms",
        "log_tail_entries",
    ];

    /// Return the standard configuration directory depending on the platform
    pub fn config_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            let appdata = env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(appdata).join("rworkclock")
        } else {
            let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".rworkclock")
        }
    }

    /// Return the full path of the config file
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("rworkclock.conf")
    }

    /// Return the full path of the SQLite database
    pub fn database_file() -> PathBuf {
        Self::config_dir().join("rworkclock.sqlite")
    }

    /// Load configuration from the standard file, or return defaults if not found
    pub fn load() -> AppResult<Self> {
        Self::load_from(&Self::config_file())
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path).map_err(|_| AppError::ConfigLoad)?;
        let cfg: Config = serde_yaml::from_str(&content)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml).map_err(|_| AppError::ConfigSave)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.idle_threshold_seconds == 0 {
            return Err(AppError::Config(
                "idle_threshold_seconds must be greater than zero".into(),
            ));
        }
        if self.poll_interval_seconds == 0 {
            return Err(AppError::Config(
                "poll_interval_seconds must be greater than zero".into(),
            ));
        }
        if self.persist_retry_limit == 0 {
            return Err(AppError::Config(
                "persist_retry_limit must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Relocate database and data files under `dir` (the `--data-dir` override).
    pub fn with_data_dir(mut self, dir: &str) -> Self {
        let base = expand_tilde(dir);
        self.database = base
            .join("rworkclock.sqlite")
            .to_string_lossy()
            .to_string();
        self.data_dir = base.to_string_lossy().to_string();
        self
    }

    pub fn grace_margin_seconds(&self) -> u64 {
        self.recovery_grace_margin_seconds
            .unwrap_or(self.idle_threshold_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn data_path(&self) -> PathBuf {
        expand_tilde(&self.data_dir)
    }

    pub fn database_path(&self) -> PathBuf {
        expand_tilde(&self.database)
    }

    pub fn heartbeat_path(&self) -> PathBuf {
        self.data_path().join("heartbeat.json")
    }

    pub fn json_log_path(&self) -> PathBuf {
        self.data_path().join("activity_log.jsonl")
    }

    pub fn csv_log_path(&self) -> PathBuf {
        self.data_path().join("activity_log.csv")
    }

    pub fn activity_file_path(&self) -> Option<PathBuf> {
        self.activity_file.as_deref().map(expand_tilde)
    }

    /// Initialize configuration directory, config file and data directory.
    /// Returns the configuration that was written.
    pub fn init_all(data_dir: Option<&str>) -> AppResult<Config> {
        let dir = Self::config_dir();
        fs::create_dir_all(&dir)?;

        let path = Self::config_file();
        let config = if path.exists() {
            // Existing file wins; only the command-line override is applied on top.
            let loaded = Self::load_from(&path)?;
            match data_dir {
                Some(d) => loaded.with_data_dir(d),
                None => loaded,
            }
        } else {
            let fresh = match data_dir {
                Some(d) => Config::default().with_data_dir(d),
                None => Config::default(),
            };
            fresh.save_to(&path)?;
            fresh
        };

        fs::create_dir_all(config.data_path())?;
        if let Some(parent) = config.database_path().parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(config)
    }
}
