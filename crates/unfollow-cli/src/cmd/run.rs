use crate::output::{print_json, print_pairs};
use anyhow::Context;
use std::path::Path;
use unfollow_browser::{
    wait_for_manual_login, Browser, LaunchProfile, LoginWait, Pacing, ScriptInspector,
    SleepInhibitor,
};
use unfollow_core::clock::{CancelToken, SystemClock};
use unfollow_core::controller::{SessionController, SessionEnd, SessionReport, SessionSettings};
use unfollow_core::limiter::LimiterSettings;
use unfollow_core::machine::TargetMachine;

pub fn run(home: &Path, import: Option<&Path>, once: bool, json: bool) -> anyhow::Result<()> {
    let (config, store) = super::open(home)?;

    config.ensure_valid()?;

    if let Some(archive) = import {
        let summary = super::import::import_archive(home, &config, &store, archive)?;
        if !json {
            super::import::print_summary(&summary);
        }
    }

    let pending = store.candidates()?.len();
    if pending == 0 {
        tracing::info!("no unfollow candidates, nothing to do");
        return report(
            &SessionReport {
                batches: 0,
                cooldowns: 0,
                totals: Default::default(),
                end: SessionEnd::Done,
            },
            json,
        );
    }
    tracing::info!(candidates = pending, "starting unfollow session");

    let _inhibitor = SleepInhibitor::start();

    let profile = LaunchProfile::randomized(config.profile_dir(home), config.browser.headless);
    let mut browser =
        Browser::launch(&config.browser, &profile).context("failed to start browser session")?;
    let cancel = interrupt_token()?;
    let clock = SystemClock::new(cancel.clone());

    let login = wait_for_manual_login(
        browser.session(),
        &clock,
        &LoginWait::new(
            &config.browser.base_url,
            config.login_timeout(),
            config.login_poll(),
        ),
    );
    if cancel.is_cancelled() {
        anyhow::bail!("interrupted while waiting for login");
    }
    login?;

    let inspector = ScriptInspector::new(
        browser.session(),
        Pacing::for_profile(config.browser.pacing),
    );
    let machine = TargetMachine::new(
        inspector,
        config.browser.base_url.as_str(),
        config.verification.unknown_after_action,
    );
    let mut settings = SessionSettings::from_config(&config);
    if once {
        settings.max_batches = Some(1);
    }

    let summary = SessionController::new(
        &store,
        &clock,
        LimiterSettings::from(&config.limits),
        machine,
        settings,
    )
    .with_cancel(cancel)
    .run()
    .context("unfollow session aborted")?;

    report(&summary, json)
}

/// Cancel the session on Ctrl-C. The current candidate finishes and its
/// outcome is persisted before the loop stops.
fn interrupt_token() -> anyhow::Result<CancelToken> {
    let cancel = CancelToken::new();
    let handler = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("interrupt received, stopping after the current candidate");
        handler.cancel();
    })
    .context("failed to install Ctrl-C handler")?;
    Ok(cancel)
}

fn report(summary: &SessionReport, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(summary);
    }
    let end = match summary.end {
        SessionEnd::Done => "no candidates left",
        SessionEnd::BatchLimit => "batch limit reached",
        SessionEnd::Cancelled => "cancelled",
    };
    print_pairs(&[
        ("Unfollowed", summary.totals.unfollowed.to_string()),
        ("Not following", summary.totals.not_following.to_string()),
        ("Unavailable", summary.totals.unavailable.to_string()),
        ("Errors", summary.totals.errored.to_string()),
        ("Batches", summary.batches.to_string()),
        ("Finished", end.to_string()),
    ]);
    Ok(())
}
