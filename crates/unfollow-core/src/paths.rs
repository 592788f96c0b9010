use crate::error::{Result, UnfollowError};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const HOME_DIR: &str = ".unfollow";
pub const CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_DATABASE: &str = "unfollow.redb";
pub const PROFILE_DIR: &str = "chrome-profile";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// `~/.unfollow`
pub fn default_home() -> Result<PathBuf> {
    home::home_dir()
        .map(|h| h.join(HOME_DIR))
        .ok_or(UnfollowError::HomeNotFound)
}

pub fn config_path(home: &Path) -> PathBuf {
    home.join(CONFIG_FILE)
}

pub fn profile_dir(home: &Path) -> PathBuf {
    home.join(PROFILE_DIR)
}

/// Resolve a configured path against `home` unless it is already absolute.
pub fn resolve(home: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        home.join(configured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_keeps_absolute_paths() {
        let home = Path::new("/tmp/unfollow-home");
        assert_eq!(
            resolve(home, Path::new("/var/lib/db.redb")),
            PathBuf::from("/var/lib/db.redb")
        );
        assert_eq!(
            resolve(home, Path::new("db.redb")),
            PathBuf::from("/tmp/unfollow-home/db.redb")
        );
    }
}
