//! Guided out-of-box experience.
//!
//! This performs automatic setup for people running `hatchd`
//! directly without specifying any configurations. The goal is
//! to let them quickly try Hatch with a config template that
//! guides them towards a more permanent setup.
//!
//! Paths:
//! - Config: `~/.config/hatch/server.toml`
//! - SQLite: `~/.local/share/hatch/server.db`
//! - Uploads: `~/.local/share/hatch/storage`

use std::path::Path;

use anyhow::{anyhow, Result};
use tokio::fs::{self, OpenOptions};

use crate::config;

const CONFIG_TEMPLATE: &str = include_str!("config-template.toml");

pub async fn run_oobe() -> Result<()> {
    let config_path = config::get_xdg_config_path()?;

    if config_path.exists() {
        return Ok(());
    }

    let data_path = config::get_xdg_data_path()?;

    // Generate a simple config
    let database_path = data_path.join("server.db");
    let database_url = format!("sqlite://{}", path_str(&database_path)?);
    OpenOptions::new()
        .create(true)
        .write(true)
        .open(&database_path)
        .await?;

    let storage_path = data_path.join("storage");
    fs::create_dir_all(&storage_path).await?;

    let config_content = render_template(&database_url, path_str(&storage_path)?);
    fs::write(&config_path, config_content.as_bytes()).await?;

    eprintln!();
    eprintln!("-----------------");
    eprintln!("Welcome to Hatch!");
    eprintln!();
    eprintln!("A simple setup using SQLite and local storage has been configured for you in:");
    eprintln!();
    eprintln!("    {}", config_path.display());
    eprintln!();
    eprintln!("Uploads will be stored in:");
    eprintln!();
    eprintln!("    {}", storage_path.display());
    eprintln!();
    eprintln!("Enjoy!");
    eprintln!("-----------------");
    eprintln!();

    Ok(())
}

fn render_template(database_url: &str, storage_path: &str) -> String {
    CONFIG_TEMPLATE
        .replace("%database_url%", database_url)
        .replace("%storage_path%", storage_path)
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow!("Path {:?} is not valid UTF-8", path))
}
