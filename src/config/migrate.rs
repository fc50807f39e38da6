use super::Config;
use crate::errors::{AppError, AppResult};
use crate::ui::messages::{info, success};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;

/// File name used by the original desktop tracker for its settings.
pub const LEGACY_CONFIG_NAME: &str = "tracker_config.json";

fn read_mapping(conf: &Path) -> AppResult<Mapping> {
    let content = fs::read_to_string(conf).map_err(|_| AppError::ConfigLoad)?;
    match serde_yaml::from_str::<Value>(&content)? {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        _ => Err(AppError::Config(format!(
            "{} is not a YAML mapping",
            conf.display()
        ))),
    }
}

/// Serialize the mapping and inject short documentation comments after the
/// keys whose meaning is not obvious from the name.
fn write_mapping(conf: &Path, map: Mapping) -> AppResult<()> {
    let serialized = serde_yaml::to_string(&Value::Mapping(map))?;

    let mut content = String::new();
    for line in serialized.lines() {
        content.push_str(line);
        content.push('\n');

        if line.starts_with("recovery_grace_margin_seconds:") {
            content.push_str(
                "  # extra idle allowance before a return from idle becomes an auto clock-out\n\
                 #   null → same as idle_threshold_seconds\n",
            );
        } else if line.starts_with("lock_triggers_idle:") {
            content.push_str("  # true → workstation lock suspends the session like a sleep\n");
        }
    }

    fs::write(conf, content).map_err(|_| AppError::ConfigSave)
}

/// Keys of the current schema that are absent from the config file.
pub fn missing_keys(conf: &Path) -> AppResult<Vec<&'static str>> {
    let map = read_mapping(conf)?;
    Ok(Config::KEYS
        .into_iter()
        .filter(|k| !map.contains_key(*k))
        .collect())
}

/// Add every missing key with its default value. Existing values are kept.
/// Returns the keys that were added.
pub fn add_missing_keys(conf: &Path) -> AppResult<Vec<String>> {
    let mut map = read_mapping(conf)?;

    let defaults = match serde_yaml::to_value(Config::default())? {
        Value::Mapping(m) => m,
        _ => return Err(AppError::Other("default config is not a mapping".into())),
    };

    let mut added = Vec::new();
    for (key, value) in defaults {
        if !map.contains_key(&key) {
            if let Some(name) = key.as_str() {
                added.push(name.to_string());
            }
            map.insert(key, value);
        }
    }

    if !added.is_empty() {
        write_mapping(conf, map)?;
        success(format!("Added missing config keys: {}", added.join(", ")));
    }

    Ok(added)
}

/// Import the idle timeout from the original tracker's JSON settings file
/// (`{"idle_timeout_minutes": 5, ...}`) into the YAML config.
///
/// Returns the imported threshold in seconds, or `None` when the legacy file
/// does not exist or carries no timeout.
pub fn import_legacy_settings(legacy: &Path, conf: &Path) -> AppResult<Option<u64>> {
    if !legacy.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(legacy)?;
    let json: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| AppError::CorruptState(format!("{}: {}", legacy.display(), e)))?;

    let minutes = match json.get("idle_timeout_minutes").and_then(|v| v.as_u64()) {
        Some(m) if m > 0 => m,
        _ => return Ok(None),
    };
    let seconds = minutes * 60;

    let mut map = if conf.exists() {
        read_mapping(conf)?
    } else {
        Mapping::new()
    };
    map.insert(
        Value::String("idle_threshold_seconds".into()),
        Value::Number(seconds.into()),
    );
    write_mapping(conf, map)?;

    info(format!(
        "Imported idle timeout from {}: {} minutes",
        legacy.display(),
        minutes
    ));

    Ok(Some(seconds))
}
