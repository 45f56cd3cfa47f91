//! Init command implementation

use anyhow::{bail, Result};
use std::path::Path;

use vigil::config::DEFAULT_CONFIG;

/// Write a starter `.vigil/config.toml` into the working directory
pub async fn init_command(work_dir: &Path, force: bool) -> Result<i32> {
    let config_dir = work_dir.join(".vigil");
    let config_path = config_dir.join("config.toml");

    if config_path.exists() && !force {
        bail!(
            "Configuration already exists: {}\nUse --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::create_dir_all(&config_dir)?;
    std::fs::write(&config_path, DEFAULT_CONFIG)?;
    println!("Created: {}", config_path.display());
    println!("Edit the [scanner.*] tables to point at your installed tools.");
    Ok(0)
}
