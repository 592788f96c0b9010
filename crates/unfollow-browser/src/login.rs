//! Waiting for a person to sign in inside the automated browser.

use std::time::Duration;

use unfollow_core::clock::Clock;

use crate::driver::Driver;
use crate::error::{BrowserError, Result};
use crate::scripts;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginWait {
    pub home_url: String,
    pub login_url: String,
    /// Pause after each navigation before the page is inspected.
    pub settle: Duration,
    pub poll: Duration,
    pub timeout: Duration,
    pub progress_every: Duration,
}

impl LoginWait {
    pub fn new(base_url: &str, timeout: Duration, poll: Duration) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            home_url: format!("{base}/"),
            login_url: format!("{base}/accounts/login/"),
            settle: Duration::from_secs(3),
            poll,
            timeout,
            progress_every: Duration::from_secs(30),
        }
    }
}

fn logged_in<D: Driver>(driver: &mut D) -> Result<bool> {
    driver.run_inspection(scripts::LOGGED_IN)
}

/// Return once the browser shows a signed-in session.
///
/// The login page is loaded once and then only inspected, never reloaded,
/// so a half-typed password survives the polling.
pub fn wait_for_manual_login<D: Driver, C: Clock>(
    driver: &mut D,
    clock: &C,
    wait: &LoginWait,
) -> Result<()> {
    driver.navigate(&wait.home_url)?;
    clock.sleep(wait.settle);
    if logged_in(driver)? {
        tracing::info!("already logged in");
        return Ok(());
    }

    tracing::info!(
        timeout_secs = wait.timeout.as_secs(),
        "not logged in, please log in manually in the browser window"
    );
    driver.navigate(&wait.login_url)?;
    clock.sleep(wait.settle);

    let poll = wait.poll.max(Duration::from_secs(1));
    let attempts = wait.timeout.as_secs().div_ceil(poll.as_secs()).max(1);
    let mut last_progress = Duration::ZERO;
    for attempt in 1..=attempts {
        clock.sleep(poll);
        if logged_in(driver)? {
            tracing::info!("login detected");
            return Ok(());
        }
        let elapsed = poll * attempt as u32;
        if elapsed - last_progress >= wait.progress_every {
            last_progress = elapsed;
            tracing::info!(elapsed_secs = elapsed.as_secs(), "waiting for login");
        }
    }
    Err(BrowserError::LoginTimeout(wait.timeout))
}
