use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;

/// Fixed logical name of the encrypted database file.
pub const DATABASE_NAME: &str = "consumed_entries_database";

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("", "", "foodtracker")
            .context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join(DATABASE_NAME);

        Ok(Config { db_path, data_dir })
    }
}
