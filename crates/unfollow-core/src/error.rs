use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UnfollowError {
    #[error("not initialized: no config at {0} (run 'unfollow config init')")]
    NotInitialized(PathBuf),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("import error: {0}")]
    Import(String),

    #[error("remote session error: {0}")]
    Remote(String),

    #[error("manual login not completed within {}s", .0.as_secs())]
    LoginTimeout(Duration),

    #[error("home directory not found: set HOME or pass --home")]
    HomeNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, UnfollowError>;

/// Collapse any redb error into [`UnfollowError::Storage`].
pub(crate) fn storage<E: std::fmt::Display>(e: E) -> UnfollowError {
    UnfollowError::Storage(e.to_string())
}
