//! Sliding-window admission control over the action log.
//!
//! Capacity is `quota − |entries in [now − window, now]|`, recomputed from the
//! persisted log on every call so a restarted process sees the same window.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::config::LimitsConfig;
use crate::error::Result;
use crate::store::Store;
use crate::types::{ActionEntry, ActionKind};

/// Read/append access to the action log.
pub trait ActionLog {
    fn append(&self, entry: &ActionEntry) -> Result<()>;

    /// Entries of `kind` at or after `since`, oldest first.
    fn entries_since(&self, kind: ActionKind, since: DateTime<Utc>) -> Result<Vec<ActionEntry>>;
}

impl ActionLog for Store {
    fn append(&self, entry: &ActionEntry) -> Result<()> {
        self.append_action(entry)
    }

    fn entries_since(&self, kind: ActionKind, since: DateTime<Utc>) -> Result<Vec<ActionEntry>> {
        self.actions_since(kind, since)
    }
}

// ---------------------------------------------------------------------------
// LimiterSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterSettings {
    pub window: Duration,
    pub quota: u32,
    pub safety_margin: Duration,
    /// Lower bound on any computed wait.
    pub min_wait: Duration,
    /// Wait used when the window is unexpectedly empty at zero capacity.
    pub fallback_wait: Duration,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self::from(&LimitsConfig::default())
    }
}

impl From<&LimitsConfig> for LimiterSettings {
    fn from(cfg: &LimitsConfig) -> Self {
        Self {
            window: Duration::from_secs(cfg.window_seconds),
            quota: cfg.hourly_quota,
            safety_margin: Duration::from_secs(cfg.safety_margin_seconds),
            min_wait: Duration::from_secs(cfg.min_wait_seconds),
            fallback_wait: Duration::from_secs(cfg.fallback_wait_seconds),
        }
    }
}

fn chrono_dur(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::weeks(52))
}

// ---------------------------------------------------------------------------
// RateLimiter
// ---------------------------------------------------------------------------

pub struct RateLimiter<'a, L: ActionLog, C: Clock> {
    log: &'a L,
    clock: &'a C,
    settings: LimiterSettings,
}

impl<'a, L: ActionLog, C: Clock> RateLimiter<'a, L, C> {
    pub fn new(log: &'a L, clock: &'a C, settings: LimiterSettings) -> Self {
        Self {
            log,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &LimiterSettings {
        &self.settings
    }

    fn window_entries(&self, kind: ActionKind) -> Result<Vec<ActionEntry>> {
        let since = self.clock.now() - chrono_dur(self.settings.window);
        self.log.entries_since(kind, since)
    }

    /// Number of entries of `kind` inside the current window.
    pub fn used(&self, kind: ActionKind) -> Result<u32> {
        Ok(self.window_entries(kind)?.len() as u32)
    }

    /// `quota − used`, clamped at zero.
    pub fn capacity_remaining(&self, kind: ActionKind) -> Result<u32> {
        Ok(self.settings.quota.saturating_sub(self.used(kind)?))
    }

    /// How long until at least one slot frees up.
    ///
    /// With spare capacity this is zero. Otherwise the oldest entry in the
    /// window leaves it at `entry + window + safety_margin`; the result is
    /// floored at `min_wait`.
    pub fn time_until_slot_free(&self, kind: ActionKind) -> Result<Duration> {
        let entries = self.window_entries(kind)?;
        if (entries.len() as u32) < self.settings.quota {
            return Ok(Duration::ZERO);
        }
        // Entries arrive in key order, but timestamps may have been written
        // out of order; take the true minimum.
        let Some(oldest) = entries.iter().map(|e| e.at).min() else {
            return Ok(self.settings.fallback_wait);
        };
        let free_at = oldest
            + chrono_dur(self.settings.window)
            + chrono_dur(self.settings.safety_margin);
        let wait = (free_at - self.clock.now()).to_std().unwrap_or(Duration::ZERO);
        Ok(wait.max(self.settings.min_wait))
    }

    /// Append one entry stamped with the current time.
    pub fn record(&self, kind: ActionKind, username: &str) -> Result<()> {
        self.log
            .append(&ActionEntry::new(kind, username, self.clock.now()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tempfile::TempDir;

    const KIND: ActionKind = ActionKind::Unfollow;

    fn open_tmp() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("limiter.redb")).unwrap();
        (dir, store)
    }

    fn settings(quota: u32) -> LimiterSettings {
        LimiterSettings {
            quota,
            ..LimiterSettings::default()
        }
    }

    #[test]
    fn defaults_match_config() {
        let s = LimiterSettings::default();
        assert_eq!(s.window, Duration::from_secs(3600));
        assert_eq!(s.quota, 50);
        assert_eq!(s.safety_margin, Duration::from_secs(60));
    }

    #[test]
    fn empty_log_has_full_capacity() {
        let (_dir, store) = open_tmp();
        let clock = ManualClock::new(Utc::now());
        let limiter = RateLimiter::new(&store, &clock, settings(5));
        assert_eq!(limiter.capacity_remaining(KIND).unwrap(), 5);
        assert_eq!(limiter.time_until_slot_free(KIND).unwrap(), Duration::ZERO);
    }

    #[test]
    fn capacity_exhausts_and_recovers_after_window() {
        let (_dir, store) = open_tmp();
        let clock = ManualClock::new(Utc::now());
        let limiter = RateLimiter::new(&store, &clock, settings(2));

        limiter.record(KIND, "a").unwrap();
        clock.advance(Duration::from_secs(1));
        limiter.record(KIND, "b").unwrap();
        assert_eq!(limiter.capacity_remaining(KIND).unwrap(), 0);

        clock.advance(Duration::from_secs(3600 + 60));
        assert_eq!(limiter.capacity_remaining(KIND).unwrap(), 2);
    }

    #[test]
    fn capacity_never_negative() {
        let (_dir, store) = open_tmp();
        let clock = ManualClock::new(Utc::now());
        let limiter = RateLimiter::new(&store, &clock, settings(1));
        for name in ["a", "b", "c"] {
            limiter.record(KIND, name).unwrap();
        }
        assert_eq!(limiter.capacity_remaining(KIND).unwrap(), 0);
    }

    #[test]
    fn slot_frees_after_oldest_entry_plus_margin() {
        let (_dir, store) = open_tmp();
        let now = Utc::now();
        let clock = ManualClock::new(now);
        store
            .append_action(&ActionEntry::new(KIND, "a", now - chrono::Duration::minutes(59)))
            .unwrap();
        let limiter = RateLimiter::new(&store, &clock, settings(1));

        let wait = limiter.time_until_slot_free(KIND).unwrap();
        // 60 min window + 60 s margin − 59 min elapsed = 120 s, floored at 60 s.
        assert!(wait >= Duration::from_secs(60));
        assert!(
            wait >= Duration::from_secs(118) && wait <= Duration::from_secs(122),
            "wait was {wait:?}"
        );
    }

    #[test]
    fn slot_wait_with_zero_margin_is_about_sixty_one_seconds() {
        let (_dir, store) = open_tmp();
        let now = Utc::now();
        let clock = ManualClock::new(now);
        store
            .append_action(&ActionEntry::new(
                KIND,
                "a",
                now - chrono::Duration::seconds(59 * 60 - 1),
            ))
            .unwrap();
        let limiter = RateLimiter::new(
            &store,
            &clock,
            LimiterSettings {
                safety_margin: Duration::ZERO,
                ..settings(1)
            },
        );
        let wait = limiter.time_until_slot_free(KIND).unwrap();
        assert!(
            wait >= Duration::from_secs(58) && wait <= Duration::from_secs(64),
            "wait was {wait:?}"
        );
    }

    #[test]
    fn slot_wait_never_below_floor() {
        let (_dir, store) = open_tmp();
        let now = Utc::now();
        let clock = ManualClock::new(now);
        // Without a margin the entry would leave the window in 5 seconds.
        store
            .append_action(&ActionEntry::new(
                KIND,
                "a",
                now - chrono::Duration::seconds(3600 - 5),
            ))
            .unwrap();
        let limiter = RateLimiter::new(
            &store,
            &clock,
            LimiterSettings {
                safety_margin: Duration::ZERO,
                ..settings(1)
            },
        );
        assert_eq!(
            limiter.time_until_slot_free(KIND).unwrap(),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn oldest_is_taken_by_timestamp_not_insertion() {
        let (_dir, store) = open_tmp();
        let now = Utc::now();
        let clock = ManualClock::new(now);
        store
            .append_action(&ActionEntry::new(KIND, "late", now - chrono::Duration::minutes(5)))
            .unwrap();
        store
            .append_action(&ActionEntry::new(KIND, "early", now - chrono::Duration::minutes(50)))
            .unwrap();
        let limiter = RateLimiter::new(&store, &clock, settings(2));
        let wait = limiter.time_until_slot_free(KIND).unwrap();
        // early + 61 min − now = 11 min
        assert!(
            wait >= Duration::from_secs(11 * 60 - 2) && wait <= Duration::from_secs(11 * 60 + 2),
            "wait was {wait:?}"
        );
    }

    struct EmptyLog;

    impl ActionLog for EmptyLog {
        fn append(&self, _entry: &ActionEntry) -> Result<()> {
            Ok(())
        }

        fn entries_since(&self, _kind: ActionKind, _since: DateTime<Utc>) -> Result<Vec<ActionEntry>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn zero_quota_with_empty_window_uses_fallback() {
        let clock = ManualClock::new(Utc::now());
        let limiter = RateLimiter::new(&EmptyLog, &clock, settings(0));
        assert_eq!(limiter.capacity_remaining(KIND).unwrap(), 0);
        assert_eq!(
            limiter.time_until_slot_free(KIND).unwrap(),
            Duration::from_secs(300)
        );
    }
}
