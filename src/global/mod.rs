use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

const APP_DIR: &str = "scriba";

pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .context("Unable to determine config directory")
}

pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = dirs::data_dir() {
        return Ok(dir.join(APP_DIR));
    }
    if let Some(home) = dirs::home_dir() {
        return Ok(home.join(".local").join("share").join(APP_DIR));
    }
    Err(anyhow!("Unable to determine data directory"))
}

pub fn db_file() -> Result<PathBuf> {
    Ok(data_dir()?.join("scriba.db"))
}

/// Singleton recording session record, shared between processes.
pub fn session_file() -> Result<PathBuf> {
    Ok(data_dir()?.join("session.json"))
}

/// Advisory lock taken for the duration of a batch run.
pub fn batch_lock_file() -> Result<PathBuf> {
    Ok(data_dir()?.join("batch.lock"))
}

pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("Unable to determine home directory")
}
