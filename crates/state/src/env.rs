use anyhow::Result;
use std::path::PathBuf;

/// Returns the user's home directory.
pub fn home_dir() -> Result<PathBuf> {
    #[cfg(unix)]
    if let Ok(home) = std::env::var("HOME") {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir().ok_or_else(|| anyhow::anyhow!("home directory not found"))
}

/// Directory holding repopicks state (`REPOPICKS_HOME`, default `~/.repopicks`).
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("REPOPICKS_HOME") {
        let trimmed = dir.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }
    Ok(home_dir()?.join(".repopicks"))
}

/// Location of the file-backed cache (`REPOPICKS_CACHE_PATH` overrides).
pub fn default_cache_file() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("REPOPICKS_CACHE_PATH") {
        return Ok(PathBuf::from(path));
    }
    Ok(data_dir()?.join("cache.json"))
}

/// Location of the optional TOML configuration file (`REPOPICKS_CONFIG_PATH` overrides).
pub fn config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("REPOPICKS_CONFIG_PATH") {
        return Some(PathBuf::from(path));
    }
    data_dir().ok().map(|d| d.join("config.toml"))
}
