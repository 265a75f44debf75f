//! Init command: write the default configuration

use crate::config::Config;
use crate::error::Result;
use crate::store::CatalogStore;
use std::path::PathBuf;
use tracing::{info, warn};

/// Create the config directory, write a default config file, and try to
/// initialize the database schema.
///
/// An unreachable database is not fatal here: the schema is also created
/// lazily on first connection, so init still succeeds with a warning.
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<PathBuf> {
    let base_dir = base_dir.unwrap_or_else(Config::default_base_dir);
    let config_path = base_dir.join("config.toml");

    let config = if config_path.exists() && !force {
        info!("Config already exists at {:?}", config_path);
        Config::load(&config_path)?
    } else {
        let config = Config::default();
        config.save(&config_path)?;
        info!("Wrote default config to {:?}", config_path);
        config
    };

    // Connecting initializes the schema when it is missing
    match CatalogStore::connect(&config).await {
        Ok(_) => info!("Catalog schema ready"),
        Err(e) => warn!(
            "Database not reachable yet ({}); schema will be created on first use",
            e
        ),
    }

    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_writes_config() {
        let tmp = TempDir::new().unwrap();
        let path = cmd_init(Some(tmp.path().join("geodex")), false).await.unwrap();
        assert!(path.exists());
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.api.base_path, "/catalog");
    }

    #[tokio::test]
    async fn test_init_preserves_existing_without_force() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("geodex");
        let path = cmd_init(Some(base.clone()), false).await.unwrap();
        std::fs::write(&path, "[api]\nbase_path = \"/custom\"\n").unwrap();

        cmd_init(Some(base), false).await.unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.api.base_path, "/custom");
    }
}
