use std::time::Duration;

use thiserror::Error;
use unfollow_core::UnfollowError;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("webdriver request failed: {0}")]
    Http(String),

    #[error("webdriver error ({error}): {message}")]
    WebDriver { error: String, message: String },

    #[error("unexpected webdriver response: {0}")]
    Protocol(String),

    #[error("chromedriver unavailable: {0}")]
    DriverUnavailable(String),

    #[error("manual login not completed within {}s", .0.as_secs())]
    LoginTimeout(Duration),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for BrowserError {
    fn from(err: reqwest::Error) -> Self {
        BrowserError::Http(err.to_string())
    }
}

impl From<BrowserError> for UnfollowError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::LoginTimeout(after) => UnfollowError::LoginTimeout(after),
            BrowserError::Io(e) => UnfollowError::Io(e),
            other => UnfollowError::Remote(other.to_string()),
        }
    }
}
