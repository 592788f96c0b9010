use crate::output::{human_duration, print_json, print_pairs};
use serde::Serialize;
use std::path::Path;
use unfollow_core::clock::SystemClock;
use unfollow_core::limiter::{LimiterSettings, RateLimiter};
use unfollow_core::store::StoreStats;
use unfollow_core::types::ActionKind;

#[derive(Serialize)]
struct Stats {
    #[serde(flatten)]
    store: StoreStats,
    candidates: usize,
    window_seconds: u64,
    quota: u32,
    used_in_window: u32,
    remaining: u32,
    next_slot_seconds: u64,
}

pub fn run(home: &Path, json: bool) -> anyhow::Result<()> {
    let (config, store) = super::open(home)?;
    let clock = SystemClock::default();
    let limiter = RateLimiter::new(&store, &clock, LimiterSettings::from(&config.limits));
    let kind = ActionKind::Unfollow;

    let stats = Stats {
        store: store.stats()?,
        candidates: store.candidates()?.len(),
        window_seconds: config.limits.window_seconds,
        quota: limiter.settings().quota,
        used_in_window: limiter.used(kind)?,
        remaining: limiter.capacity_remaining(kind)?,
        next_slot_seconds: limiter.time_until_slot_free(kind)?.as_secs(),
    };

    if json {
        return print_json(&stats);
    }
    print_pairs(&[
        ("Following", stats.store.following.to_string()),
        ("Followers", stats.store.followers.to_string()),
        ("Candidates", stats.candidates.to_string()),
        ("Unfollowed", stats.store.actioned.to_string()),
        ("Skipped", stats.store.excluded.to_string()),
        (
            "Window",
            format!(
                "{}/{} used in the last {}",
                stats.used_in_window,
                stats.quota,
                human_duration(config.window())
            ),
        ),
        (
            "Next slot",
            if stats.remaining > 0 {
                "now".to_string()
            } else {
                format!(
                    "in {}",
                    human_duration(std::time::Duration::from_secs(stats.next_slot_seconds))
                )
            },
        ),
    ]);
    Ok(())
}
