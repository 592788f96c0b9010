pub mod config;
pub mod import;
pub mod list;
pub mod run;
pub mod stats;

use anyhow::Context;
use std::path::Path;
use unfollow_core::config::Config;
use unfollow_core::store::Store;

/// Load the config and open the store it points at.
pub fn open(home: &Path) -> anyhow::Result<(Config, Store)> {
    let config = Config::load(home).context("failed to load config")?;
    let db = config.database_path(home);
    let store = Store::open(&db).with_context(|| format!("failed to open {}", db.display()))?;
    Ok((config, store))
}
