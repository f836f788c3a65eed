use std::path::PathBuf;

/// Platform configuration directory for preflight
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("preflight")
}

/// User overrides on top of the embedded defaults
pub fn settings_path() -> PathBuf {
    config_dir().join("settings.yaml")
}

pub fn log_dir() -> PathBuf {
    config_dir().join("logs")
}
