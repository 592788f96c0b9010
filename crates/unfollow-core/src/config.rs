use crate::error::{Result, UnfollowError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// LimitsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_window")]
    pub window_seconds: u64,
    #[serde(default = "default_quota")]
    pub hourly_quota: u32,
    #[serde(default = "default_margin")]
    pub safety_margin_seconds: u64,
    #[serde(default = "default_min_wait")]
    pub min_wait_seconds: u64,
    #[serde(default = "default_fallback_wait")]
    pub fallback_wait_seconds: u64,
}

fn default_window() -> u64 {
    3600
}

fn default_quota() -> u32 {
    50
}

fn default_margin() -> u64 {
    60
}

fn default_min_wait() -> u64 {
    60
}

fn default_fallback_wait() -> u64 {
    300
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            window_seconds: default_window(),
            hourly_quota: default_quota(),
            safety_margin_seconds: default_margin(),
            min_wait_seconds: default_min_wait(),
            fallback_wait_seconds: default_fallback_wait(),
        }
    }
}

// ---------------------------------------------------------------------------
// PacingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_delay")]
    pub unfollow_delay_seconds: u64,
    #[serde(default = "default_jitter")]
    pub jitter_percent: u8,
    #[serde(default = "default_error_backoff")]
    pub error_backoff_seconds: u64,
    /// A longer break is taken after every N successful actions, with N drawn
    /// from `[long_break_every_min, long_break_every_max]`. 0 disables it.
    #[serde(default = "default_break_every_min")]
    pub long_break_every_min: u32,
    #[serde(default = "default_break_every_max")]
    pub long_break_every_max: u32,
    /// Extra pause added on top of the regular delay when a break is due.
    #[serde(default = "default_break_min")]
    pub long_break_min_seconds: u64,
    #[serde(default = "default_break_max")]
    pub long_break_max_seconds: u64,
}

fn default_delay() -> u64 {
    60
}

fn default_jitter() -> u8 {
    30
}

fn default_error_backoff() -> u64 {
    3
}

fn default_break_every_min() -> u32 {
    5
}

fn default_break_every_max() -> u32 {
    10
}

fn default_break_min() -> u64 {
    30
}

fn default_break_max() -> u64 {
    90
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            unfollow_delay_seconds: default_delay(),
            jitter_percent: default_jitter(),
            error_backoff_seconds: default_error_backoff(),
            long_break_every_min: default_break_every_min(),
            long_break_every_max: default_break_every_max(),
            long_break_min_seconds: default_break_min(),
            long_break_max_seconds: default_break_max(),
        }
    }
}

// ---------------------------------------------------------------------------
// VerificationConfig
// ---------------------------------------------------------------------------

/// What to do when the post-action check cannot tell whether the action landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownAfterAction {
    /// Report `Error`; the candidate stays in the set and is re-checked next pass.
    #[default]
    Error,
    /// Report `Success` and log a warning.
    AssumeSuccess,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VerificationConfig {
    #[serde(default)]
    pub unknown_after_action: UnknownAfterAction,
}

// ---------------------------------------------------------------------------
// BrowserConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingProfile {
    /// Randomized human-like pauses around every remote step.
    #[default]
    Human,
    /// No pauses beyond what the page needs.
    Fast,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub headless: bool,
    /// Persistent browser profile. Defaults to `<home>/chrome-profile`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_dir: Option<PathBuf>,
    /// Existing WebDriver endpoint. When unset a local chromedriver is spawned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webdriver_url: Option<String>,
    #[serde(default = "default_chromedriver_port")]
    pub chromedriver_port: u16,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_login_timeout")]
    pub login_timeout_seconds: u64,
    #[serde(default = "default_login_poll")]
    pub login_poll_seconds: u64,
    #[serde(default)]
    pub pacing: PacingProfile,
}

fn default_chromedriver_port() -> u16 {
    9515
}

fn default_base_url() -> String {
    "https://www.instagram.com".to_string()
}

fn default_login_timeout() -> u64 {
    600
}

fn default_login_poll() -> u64 {
    5
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            profile_dir: None,
            webdriver_url: None,
            chromedriver_port: default_chromedriver_port(),
            base_url: default_base_url(),
            login_timeout_seconds: default_login_timeout(),
            login_poll_seconds: default_login_poll(),
            pacing: PacingProfile::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// StorageConfig / ImportConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database")]
    pub database: PathBuf,
}

fn default_database() -> PathBuf {
    PathBuf::from(paths::DEFAULT_DATABASE)
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Where export archives are unpacked. A temp directory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            limits: LimitsConfig::default(),
            pacing: PacingConfig::default(),
            verification: VerificationConfig::default(),
            browser: BrowserConfig::default(),
            storage: StorageConfig::default(),
            import: ImportConfig::default(),
        }
    }
}

impl Config {
    pub fn load(home: &Path) -> Result<Self> {
        let path = paths::config_path(home);
        if !path.exists() {
            return Err(UnfollowError::NotInitialized(path));
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, home: &Path) -> Result<()> {
        let path = paths::config_path(home);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn database_path(&self, home: &Path) -> PathBuf {
        paths::resolve(home, &self.storage.database)
    }

    pub fn profile_dir(&self, home: &Path) -> PathBuf {
        match &self.browser.profile_dir {
            Some(dir) => paths::resolve(home, dir),
            None => paths::profile_dir(home),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.limits.window_seconds)
    }

    pub fn unfollow_delay(&self) -> Duration {
        Duration::from_secs(self.pacing.unfollow_delay_seconds)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.pacing.error_backoff_seconds)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.browser.login_timeout_seconds)
    }

    pub fn login_poll(&self) -> Duration {
        Duration::from_secs(self.browser.login_poll_seconds)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message })
        };

        if self.limits.window_seconds == 0 {
            push(
                WarnLevel::Error,
                "limits.window_seconds must be greater than zero".to_string(),
            );
        }

        if self.limits.hourly_quota == 0 {
            push(
                WarnLevel::Error,
                "limits.hourly_quota is 0: the run loop would never act".to_string(),
            );
        }

        if self.limits.safety_margin_seconds >= self.limits.window_seconds
            && self.limits.window_seconds > 0
        {
            push(
                WarnLevel::Warning,
                format!(
                    "limits.safety_margin_seconds ({}) is not smaller than the window ({}s)",
                    self.limits.safety_margin_seconds, self.limits.window_seconds
                ),
            );
        }

        if self.pacing.jitter_percent > 100 {
            push(
                WarnLevel::Error,
                format!(
                    "pacing.jitter_percent={} (must be between 0 and 100)",
                    self.pacing.jitter_percent
                ),
            );
        }

        if self.pacing.unfollow_delay_seconds < 10 {
            push(
                WarnLevel::Warning,
                format!(
                    "pacing.unfollow_delay_seconds={} is aggressive (<10s)",
                    self.pacing.unfollow_delay_seconds
                ),
            );
        }

        if self.pacing.long_break_every_min > self.pacing.long_break_every_max {
            push(
                WarnLevel::Error,
                format!(
                    "pacing.long_break_every_min ({}) exceeds long_break_every_max ({})",
                    self.pacing.long_break_every_min, self.pacing.long_break_every_max
                ),
            );
        }

        if self.pacing.long_break_min_seconds > self.pacing.long_break_max_seconds {
            push(
                WarnLevel::Error,
                format!(
                    "pacing.long_break_min_seconds ({}) exceeds long_break_max_seconds ({})",
                    self.pacing.long_break_min_seconds, self.pacing.long_break_max_seconds
                ),
            );
        }

        if self.browser.login_poll_seconds == 0 {
            push(
                WarnLevel::Error,
                "browser.login_poll_seconds must be greater than zero".to_string(),
            );
        } else if self.browser.login_poll_seconds >= self.browser.login_timeout_seconds {
            push(
                WarnLevel::Warning,
                "browser.login_poll_seconds is not smaller than login_timeout_seconds".to_string(),
            );
        }

        if self.version != default_version() {
            push(
                WarnLevel::Warning,
                format!("unknown config version {}", self.version),
            );
        }

        warnings
    }

    /// Fail on the first `Error`-level validation warning.
    pub fn ensure_valid(&self) -> Result<()> {
        match self
            .validate()
            .into_iter()
            .find(|w| w.level == WarnLevel::Error)
        {
            Some(w) => Err(UnfollowError::Config(w.message)),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
