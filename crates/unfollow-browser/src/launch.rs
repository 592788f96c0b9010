//! Bringing up a browser session from configuration.

use unfollow_core::config::BrowserConfig;

use crate::chromedriver::ChromeDriver;
use crate::error::Result;
use crate::fidelity::LaunchProfile;
use crate::webdriver::WebDriverSession;

/// A WebDriver session plus the chromedriver it runs on, when spawned here.
///
/// Field order matters: the session is deleted before the driver is killed.
pub struct Browser {
    session: WebDriverSession,
    _driver: Option<ChromeDriver>,
}

impl Browser {
    /// Use `browser.webdriver_url` when set, otherwise spawn chromedriver.
    pub fn launch(cfg: &BrowserConfig, profile: &LaunchProfile) -> Result<Self> {
        std::fs::create_dir_all(&profile.profile_dir)?;

        let (endpoint, driver) = match &cfg.webdriver_url {
            Some(url) => (url.clone(), None),
            None => {
                let driver = ChromeDriver::spawn(cfg.chromedriver_port)?;
                (driver.url().to_string(), Some(driver))
            }
        };
        let session = WebDriverSession::start(&endpoint, profile)?;
        Ok(Self {
            session,
            _driver: driver,
        })
    }

    pub fn session(&mut self) -> &mut WebDriverSession {
        &mut self.session
    }
}
