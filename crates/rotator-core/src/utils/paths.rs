//! Data directory and target application paths.

use std::fs;
use std::path::PathBuf;

const DATA_DIR: &str = ".antigravity_rotator";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "ROTATOR_DATA_DIR";

/// Get data directory path.
///
/// Priority:
/// 1. `ROTATOR_DATA_DIR` environment variable
/// 2. `~/.antigravity_rotator`
pub fn get_data_dir() -> Result<PathBuf, String> {
    let data_dir = if let Ok(custom_dir) = std::env::var(DATA_DIR_ENV) {
        PathBuf::from(custom_dir)
    } else {
        let home = dirs::home_dir().ok_or("Failed to resolve home directory")?;
        home.join(DATA_DIR)
    };

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)
            .map_err(|e| format!("Failed to create data directory: {}", e))?;
    }

    Ok(data_dir)
}

/// Default location of the target application's `state.vscdb`.
///
/// - macOS: `~/Library/Application Support/Antigravity/User/globalStorage/state.vscdb`
/// - Windows: `%APPDATA%\Antigravity\User\globalStorage\state.vscdb`
/// - Linux: `~/.config/Antigravity/User/globalStorage/state.vscdb`
pub fn default_state_db_path() -> Result<PathBuf, String> {
    let config_dir = dirs::config_dir().ok_or("Failed to resolve user config directory")?;
    Ok(config_dir.join("Antigravity").join("User").join("globalStorage").join("state.vscdb"))
}

/// Default executable used when launching the target directly.
pub fn default_executable_path() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        PathBuf::from("/Applications/Antigravity.app/Contents/MacOS/Antigravity")
    }

    #[cfg(target_os = "windows")]
    {
        dirs::data_local_dir()
            .map(|d| d.join("Programs").join("Antigravity").join("Antigravity.exe"))
            .unwrap_or_else(|| PathBuf::from("Antigravity.exe"))
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        ["/usr/share/antigravity/antigravity", "/opt/Antigravity/antigravity"]
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .unwrap_or_else(|| PathBuf::from("antigravity"))
    }
}

/// Running under Windows Subsystem for Linux.
pub fn is_wsl() -> bool {
    if !cfg!(target_os = "linux") {
        return false;
    }
    if std::env::var_os("WSL_DISTRO_NAME").is_some() {
        return true;
    }
    fs::read_to_string("/proc/version")
        .map(|v| v.to_lowercase().contains("microsoft"))
        .unwrap_or(false)
}

/// Convert `/mnt/c/Users/x` to `C:\Users\x`; other paths only get their separators flipped.
pub fn wsl_to_windows_path(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("/mnt/") {
        let mut rest_chars = rest.chars();
        if let (Some(drive), Some('/')) = (rest_chars.next(), rest_chars.next()) {
            if drive.is_ascii_alphabetic() {
                let tail: String = rest_chars.collect();
                return format!("{}:\\{}", drive.to_ascii_uppercase(), tail.replace('/', "\\"));
            }
        }
    }
    path.replace('/', "\\")
}
