use anyhow::Context;
use include_dir::{include_dir, Dir};
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use std::path::Path;

use super::paths;
use super::AppConfig;

// Embed the entire configs directory at compile time
static CONFIGS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/resources/configs");

const DEFAULTS_FILE: &str = "preflight.yaml";

/// Load a YAML file from disk
pub fn load_yaml<T: DeserializeOwned>(path: impl AsRef<Path>) -> anyhow::Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_yaml(&content)
}

/// Parse YAML from string
pub fn parse_yaml<T: DeserializeOwned>(content: &str) -> anyhow::Result<T> {
    let config: T = serde_yaml::from_str(content)?;
    Ok(config)
}

/// Overlay `overlay` onto `base`; mappings merge key by key, anything
/// else replaces.
pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn embedded_defaults() -> Value {
    let Some(content) = CONFIGS_DIR
        .get_file(DEFAULTS_FILE)
        .and_then(|file| file.contents_utf8())
    else {
        tracing::warn!("Embedded config {} not found, using defaults", DEFAULTS_FILE);
        return Value::Null;
    };

    match parse_yaml::<Value>(content) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!("Failed to parse embedded config {}: {}", DEFAULTS_FILE, e);
            Value::Null
        }
    }
}

/// Embedded defaults overlaid with the settings file at `settings_path`.
/// A missing or unreadable settings file leaves the defaults in place.
pub fn load_config_from(settings_path: &Path) -> AppConfig {
    let mut config = embedded_defaults();

    if settings_path.exists() {
        match load_yaml::<Value>(settings_path) {
            Ok(Value::Null) => {
                tracing::debug!("Settings file {:?} is empty", settings_path);
            }
            Ok(overlay) => {
                tracing::info!("Loaded user settings from {:?}", settings_path);
                merge(&mut config, overlay);
            }
            Err(e) => {
                tracing::warn!("Failed to parse {:?}: {:#}, using defaults", settings_path, e);
            }
        }
    } else {
        tracing::debug!("No settings file at {:?}, using defaults", settings_path);
    }

    if config.is_null() {
        return AppConfig::default();
    }
    match serde_yaml::from_value(config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}, using defaults", e);
            AppConfig::default()
        }
    }
}

/// Load configuration from the embedded defaults and the user's settings.yaml
pub fn load_config() -> AppConfig {
    load_config_from(&paths::settings_path())
}
