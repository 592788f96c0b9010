//! Local chromedriver process.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde_json::Value;

use crate::error::{BrowserError, Result};

const READY_TIMEOUT: Duration = Duration::from_secs(10);
const READY_POLL: Duration = Duration::from_millis(250);

/// A spawned `chromedriver`, killed on drop.
pub struct ChromeDriver {
    child: Child,
    url: String,
}

impl ChromeDriver {
    /// Locate `chromedriver` on `PATH`.
    pub fn locate() -> Result<PathBuf> {
        which::which("chromedriver").map_err(|e| {
            BrowserError::DriverUnavailable(format!(
                "chromedriver not found on PATH ({e}); install it or set browser.webdriver_url"
            ))
        })
    }

    /// Spawn chromedriver on `port` and wait until it reports ready.
    pub fn spawn(port: u16) -> Result<Self> {
        let binary = Self::locate()?;
        let child = Command::new(&binary)
            .arg(format!("--port={port}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                BrowserError::DriverUnavailable(format!("failed to start {}: {e}", binary.display()))
            })?;

        let mut driver = Self {
            child,
            url: format!("http://127.0.0.1:{port}"),
        };
        driver.wait_ready()?;
        tracing::info!(url = %driver.url, "chromedriver ready");
        Ok(driver)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn wait_ready(&mut self) -> Result<()> {
        let client = Client::builder().timeout(Duration::from_secs(2)).build()?;
        let deadline = Instant::now() + READY_TIMEOUT;
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Err(BrowserError::DriverUnavailable(format!(
                    "chromedriver exited during startup ({status})"
                )));
            }
            if is_ready(&client, &self.url) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::DriverUnavailable(format!(
                    "chromedriver not ready after {}s",
                    READY_TIMEOUT.as_secs()
                )));
            }
            std::thread::sleep(READY_POLL);
        }
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// `GET /status` answered with `value.ready == true`.
pub fn is_ready(client: &Client, base_url: &str) -> bool {
    let Ok(resp) = client.get(format!("{base_url}/status")).send() else {
        return false;
    };
    if !resp.status().is_success() {
        return false;
    }
    resp.json::<Value>()
        .ok()
        .and_then(|v| v.get("value")?.get("ready")?.as_bool())
        .unwrap_or(false)
}
