//! Per-user directories for the config file and the log.
use once_cell::sync::Lazy;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "simplellm";

static PLATFORM_CONFIG_HOME: Lazy<PathBuf> =
    Lazy::new(|| dirs::config_dir().unwrap_or_else(|| home_relative(".config")));

static PLATFORM_DATA_HOME: Lazy<PathBuf> =
    Lazy::new(|| dirs::data_local_dir().unwrap_or_else(|| home_relative(".local/share")));

fn home_relative(dir: &str) -> PathBuf {
    dirs::home_dir().unwrap_or_default().join(dir)
}

/// `<base>/simplellm`. A non-empty XDG override replaces the platform base.
fn app_dir(xdg_override: Option<OsString>, platform_base: &Path) -> PathBuf {
    xdg_override
        .filter(|base| !base.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| platform_base.to_path_buf())
        .join(APP_NAME)
}

pub fn get_config_dir() -> PathBuf {
    app_dir(std::env::var_os("XDG_CONFIG_HOME"), &PLATFORM_CONFIG_HOME)
}

/// Directory for the log file. Created on first use.
pub fn get_data_dir() -> std::io::Result<PathBuf> {
    let path = app_dir(std::env::var_os("XDG_DATA_HOME"), &PLATFORM_DATA_HOME);
    std::fs::create_dir_all(&path)?;
    Ok(path)
}
