//! [`PageInspector`] backed by page scripts on a [`Driver`].

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use unfollow_core::config::PacingProfile;
use unfollow_core::inspect::PageInspector;
use unfollow_core::types::{Availability, Control, RelationshipStatus};

use crate::driver::Driver;
use crate::scripts;

// ---------------------------------------------------------------------------
// Pacing
// ---------------------------------------------------------------------------

/// Uniform pause range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pause {
    pub min: Duration,
    pub max: Duration,
}

impl Pause {
    pub const NONE: Pause = Pause {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub const fn millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    pub fn pick(&self, rng: &mut impl Rng) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }
}

/// Pauses around each remote step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub before_navigate: Pause,
    pub page_load: Pause,
    pub after_scroll: Pause,
    pub before_menu: Pause,
    pub menu_open: Pause,
    pub before_confirm: Pause,
    pub after_confirm: Pause,
    /// Pixel range of the small scroll after a page loads. `None` skips it.
    pub scroll: Option<(u32, u32)>,
}

impl Pacing {
    pub fn human() -> Self {
        Self {
            before_navigate: Pause::millis(1_000, 3_000),
            page_load: Pause::millis(2_500, 5_000),
            after_scroll: Pause::millis(500, 1_500),
            before_menu: Pause::millis(800, 2_000),
            menu_open: Pause::millis(1_500, 3_500),
            before_confirm: Pause::millis(500, 1_200),
            after_confirm: Pause::millis(1_500, 3_000),
            scroll: Some((50, 200)),
        }
    }

    /// Only the waits the page needs to settle.
    pub fn fast() -> Self {
        Self {
            before_navigate: Pause::NONE,
            page_load: Pause::millis(2_000, 2_000),
            after_scroll: Pause::NONE,
            before_menu: Pause::NONE,
            menu_open: Pause::millis(1_000, 1_000),
            before_confirm: Pause::NONE,
            after_confirm: Pause::millis(1_000, 1_000),
            scroll: None,
        }
    }

    pub fn none() -> Self {
        Self {
            before_navigate: Pause::NONE,
            page_load: Pause::NONE,
            after_scroll: Pause::NONE,
            before_menu: Pause::NONE,
            menu_open: Pause::NONE,
            before_confirm: Pause::NONE,
            after_confirm: Pause::NONE,
            scroll: None,
        }
    }

    pub fn for_profile(profile: PacingProfile) -> Self {
        match profile {
            PacingProfile::Human => Self::human(),
            PacingProfile::Fast => Self::fast(),
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptInspector
// ---------------------------------------------------------------------------

pub struct ScriptInspector<D: Driver> {
    driver: D,
    pacing: Pacing,
    rng: StdRng,
}

impl<D: Driver> ScriptInspector<D> {
    pub fn new(driver: D, pacing: Pacing) -> Self {
        Self {
            driver,
            pacing,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    fn pause(&mut self, pause: Pause) {
        let d = pause.pick(&mut self.rng);
        if !d.is_zero() {
            self.driver.wait(d);
        }
    }
}

impl<D: Driver> PageInspector for ScriptInspector<D> {
    fn open_profile(&mut self, url: &str) -> unfollow_core::Result<()> {
        self.pause(self.pacing.before_navigate);
        self.driver.navigate(url)?;
        self.pause(self.pacing.page_load);
        if let Some((lo, hi)) = self.pacing.scroll {
            let px = self.rng.gen_range(lo..=hi.max(lo));
            let _: bool = self.driver.run_inspection(&scripts::scroll_by(px))?;
            self.pause(self.pacing.after_scroll);
        }
        Ok(())
    }

    fn availability(&mut self) -> unfollow_core::Result<Availability> {
        let gone: bool = self.driver.run_inspection(&scripts::profile_gone())?;
        Ok(if gone {
            Availability::Unavailable
        } else {
            Availability::Available
        })
    }

    fn relationship(&mut self) -> unfollow_core::Result<RelationshipStatus> {
        let token: String = self.driver.run_inspection(scripts::RELATIONSHIP)?;
        Ok(RelationshipStatus::from_token(&token))
    }

    fn activate(&mut self, control: Control) -> unfollow_core::Result<bool> {
        let (before, locator, after) = match control {
            Control::OpenMenu => (
                self.pacing.before_menu,
                scripts::FOLLOWING_BUTTON,
                self.pacing.menu_open,
            ),
            Control::Confirm => (
                self.pacing.before_confirm,
                scripts::UNFOLLOW_CONFIRM,
                self.pacing.after_confirm,
            ),
        };
        self.pause(before);
        let found = self.driver.invoke_control(&locator)?;
        if found {
            self.pause(after);
        }
        Ok(found)
    }
}
