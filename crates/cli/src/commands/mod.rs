pub mod doctor;
pub mod health;
pub mod run;
pub mod status;
pub mod templates;
pub mod tools;

use maestro_config::{AppConfig, ConfigError};
use maestro_orchestrator::Orchestrator;
use std::path::{Path, PathBuf};

/// Load from `path` when given, otherwise from the default location.
/// Environment overrides apply either way.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let Some(path) = path else {
        return AppConfig::load();
    };
    let mut config = AppConfig::load_from(path)?;
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

pub fn config_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

pub fn orchestrator(path: Option<&Path>) -> Result<Orchestrator, Box<dyn std::error::Error>> {
    let config = load_config(path).map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(Orchestrator::from_config(&config))
}
