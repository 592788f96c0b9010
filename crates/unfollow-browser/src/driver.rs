//! Minimal remote-browser vocabulary the page inspector is written against.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::Result;

/// A script fragment that evaluates to the element to click, or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlLocator {
    pub name: &'static str,
    pub find: &'static str,
}

pub trait Driver {
    fn navigate(&mut self, url: &str) -> Result<()>;

    /// Evaluate `script` (a function body ending in `return ...`) and decode
    /// its return value.
    fn run_inspection<T: DeserializeOwned>(&mut self, script: &str) -> Result<T>;

    /// Locate the element described by `locator` and click it the way a
    /// person would. `Ok(false)` when nothing matched.
    fn invoke_control(&mut self, locator: &ControlLocator) -> Result<bool>;

    fn wait(&mut self, duration: Duration);
}

impl<D: Driver + ?Sized> Driver for &mut D {
    fn navigate(&mut self, url: &str) -> Result<()> {
        (**self).navigate(url)
    }

    fn run_inspection<T: DeserializeOwned>(&mut self, script: &str) -> Result<T> {
        (**self).run_inspection(script)
    }

    fn invoke_control(&mut self, locator: &ControlLocator) -> Result<bool> {
        (**self).invoke_control(locator)
    }

    fn wait(&mut self, duration: Duration) {
        (**self).wait(duration)
    }
}

// ---------------------------------------------------------------------------
// FakeDriver: answers the known scripts from canned state
// ---------------------------------------------------------------------------
