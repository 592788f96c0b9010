use std::path::{Path, PathBuf};

use anyhow::Context;
use unfollow_core::paths;

/// Resolve the state directory.
///
/// Priority:
/// 1. `--home` flag / `UNFOLLOW_HOME` env var (passed in as `explicit`)
/// 2. `~/.unfollow`
/// 3. `./.unfollow` when no home directory is known
pub fn resolve_home(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }
    match paths::default_home() {
        Ok(home) => Ok(home),
        Err(_) => {
            let cwd = std::env::current_dir().context("cannot determine current directory")?;
            Ok(cwd.join(paths::HOME_DIR))
        }
    }
}
