#![allow(dead_code)]
use assert_cmd::{Command, cargo_bin_cmd};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rworkclock::config::Config;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The binary with HOME pointed at `home`, so config and data stay inside it.
pub fn rwc(home: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("rworkclock");
    cmd.env("HOME", home)
        .env_remove("RUST_LOG")
        .env_remove("RWORKCLOCK_DEBUG_LOG");
    cmd
}

/// Fresh home directory with `init` already run.
pub fn init_home() -> TempDir {
    let home = TempDir::new().expect("create temp home");
    rwc(home.path()).arg("init").assert().success();
    home
}

/// Default data directory under a test HOME.
pub fn data_dir(home: &Path) -> PathBuf {
    home.join(".rworkclock")
}

/// 2025-03-10 09:00:00 UTC plus `secs`.
pub fn t(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap() + Duration::seconds(secs)
}

/// Config rooted in `dir` that retries without sleeping.
pub fn test_config(dir: &Path) -> Config {
    let mut cfg = Config::default().with_data_dir(&dir.to_string_lossy());
    cfg.idle_threshold_seconds = 60;
    cfg.recovery_grace_margin_seconds = Some(60);
    cfg.poll_interval_seconds = 1;
    cfg.persist_retry_limit = 2;
    cfg.persist_backoff_ms = 0;
    cfg
}
