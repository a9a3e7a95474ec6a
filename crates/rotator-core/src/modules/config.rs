//! Rotator configuration persistence (`rotator_config.json`).

use std::fs;
use std::path::Path;

use rotator_types::RotatorConfig;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::utils::fs::atomic_write;

pub const CONFIG_FILE: &str = "rotator_config.json";

/// Load configuration from `data_dir`, falling back to defaults when the file is absent.
///
/// A file that exists but does not parse is an error; it is never silently replaced.
pub fn load_config(data_dir: &Path) -> AppResult<RotatorConfig> {
    let config_path = data_dir.join(CONFIG_FILE);

    if !config_path.exists() {
        return Ok(RotatorConfig::default());
    }

    let content = fs::read_to_string(&config_path)
        .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;

    serde_json::from_str(&content)
        .map_err(|e| AppError::Config(format!("Failed to parse config file: {}", e)))
}

/// Save configuration atomically.
pub fn save_config(data_dir: &Path, config: &RotatorConfig) -> AppResult<()> {
    let config_path = data_dir.join(CONFIG_FILE);
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?;

    atomic_write(&config_path, content.as_bytes())
        .map_err(|e| AppError::Config(format!("Failed to save config file: {}", e)))?;
    info!("[Config] Saved {}", config_path.display());
    Ok(())
}

/// Load configuration, writing the defaults out on first run.
pub fn load_or_init_config(data_dir: &Path) -> AppResult<RotatorConfig> {
    let existed = data_dir.join(CONFIG_FILE).exists();
    let config = load_config(data_dir)?;
    if !existed {
        if let Err(e) = save_config(data_dir, &config) {
            warn!("[Config] Could not write default config: {}", e);
        }
    }
    Ok(config)
}
