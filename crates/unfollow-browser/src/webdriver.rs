//! W3C WebDriver client over blocking HTTP.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::driver::{ControlLocator, Driver};
use crate::error::{BrowserError, Result};
use crate::fidelity::LaunchProfile;
use crate::scripts;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// One browser session on a WebDriver endpoint. Deleted on drop.
pub struct WebDriverSession {
    client: Client,
    base_url: String,
    session_id: String,
    closed: bool,
}

impl WebDriverSession {
    /// Create a session for `profile` and install the stealth script.
    pub fn start(endpoint: &str, profile: &LaunchProfile) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base_url = endpoint.trim_end_matches('/').to_string();

        let value = send(
            &client,
            Method::POST,
            &format!("{base_url}/session"),
            Some(&profile.capabilities()),
        )?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Protocol("new session response has no sessionId".into()))?
            .to_string();

        tracing::info!(
            session = %session_id,
            user_agent = %profile.user_agent,
            window = ?profile.window,
            "browser session started"
        );

        let session = Self {
            client,
            base_url,
            session_id,
            closed: false,
        };
        session.add_init_script(scripts::STEALTH)?;
        Ok(session)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn command(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}/session/{}{}", self.base_url, self.session_id, path);
        send(&self.client, method, &url, body)
    }

    /// Run `source` before any page script on every future navigation.
    fn add_init_script(&self, source: &str) -> Result<()> {
        self.command(
            Method::POST,
            "/goog/cdp/execute",
            Some(&json!({
                "cmd": "Page.addScriptToEvaluateOnNewDocument",
                "params": { "source": source },
            })),
        )?;
        Ok(())
    }

    pub fn execute(&self, script: &str) -> Result<Value> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(&json!({ "script": script, "args": [] })),
        )
    }

    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.command(Method::DELETE, "", None)?;
        tracing::debug!(session = %self.session_id, "browser session closed");
        Ok(())
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "failed to close browser session");
        }
    }
}

impl Driver for WebDriverSession {
    fn navigate(&mut self, url: &str) -> Result<()> {
        self.command(Method::POST, "/url", Some(&json!({ "url": url })))?;
        Ok(())
    }

    fn run_inspection<T: DeserializeOwned>(&mut self, script: &str) -> Result<T> {
        Ok(serde_json::from_value(self.execute(script)?)?)
    }

    fn invoke_control(&mut self, locator: &ControlLocator) -> Result<bool> {
        let clicked = self.execute(&scripts::human_click(locator))?;
        Ok(clicked.as_bool().unwrap_or(false))
    }

    fn wait(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Send one command and unwrap the W3C `{"value": ...}` envelope.
fn send(client: &Client, method: Method, url: &str, body: Option<&Value>) -> Result<Value> {
    let mut req = client.request(method, url);
    if let Some(body) = body {
        req = req.json(body);
    }
    let resp = req.send()?;
    let status = resp.status();
    let text = resp.text()?;

    let mut envelope: Value = serde_json::from_str(&text).map_err(|_| {
        BrowserError::Protocol(format!("status {}: {}", status.as_u16(), text.trim()))
    })?;
    let value = envelope
        .get_mut("value")
        .map(Value::take)
        .unwrap_or(Value::Null);

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(BrowserError::WebDriver {
            error: error.to_string(),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }
    if !status.is_success() {
        return Err(BrowserError::Protocol(format!(
            "status {}: {}",
            status.as_u16(),
            text.trim()
        )));
    }
    Ok(value)
}
