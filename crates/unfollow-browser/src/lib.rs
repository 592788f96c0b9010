//! Remote browser collaborators for the unfollow engine.
//!
//! ```text
//! Browser ── ChromeDriver (spawned) ── WebDriverSession (W3C over HTTP)
//!                                           │ implements Driver
//!                                           ▼
//!                                  ScriptInspector ── implements PageInspector
//! ```

pub mod chromedriver;
pub mod driver;
pub mod error;
pub mod fidelity;
pub mod inspector;
pub mod launch;
pub mod login;
pub mod scripts;
pub mod webdriver;

pub use driver::{ControlLocator, Driver};
pub use error::{BrowserError, Result};
pub use fidelity::{LaunchProfile, SleepInhibitor};
pub use inspector::{Pacing, ScriptInspector};
pub use launch::Browser;
pub use login::{wait_for_manual_login, LoginWait};
pub use webdriver::WebDriverSession;
