use std::path::PathBuf;

use etcetera::BaseStrategy;

/// Overrides the user configuration directory
pub const CONFIG_DIR_ENV: &str = "BUNDLUA_CONFIG_DIR";
pub const CONFIG_FILE_NAME: &str = "bundlua.toml";

/// Directory holding the user-level `bundlua.toml`
pub fn user_config_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|dir| !dir.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    etcetera::choose_base_strategy()
        .ok()
        .map(|strategy| strategy.config_dir().join("bundlua"))
}

/// Path of the user-level config file, whether or not it exists
pub fn user_config_file() -> Option<PathBuf> {
    user_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}
