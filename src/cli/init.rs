use std::fs;

use anyhow::{Context, Result};

use crate::core::AppConfig;
use crate::core::db::async_db;

pub async fn run(config: &AppConfig) -> Result<()> {
    println!("Initializing db...");
    fs::create_dir_all(&config.storage_path)
        .with_context(|| format!("Failed to create {}", config.storage_path))?;
    // Opening the db creates the schema
    async_db(&config.db_path).await?;
    println!("Finished initializing db at {}", config.db_path);
    Ok(())
}
