//! Long-running unfollow session.
//!
//! ```text
//! LoadCandidates ──(none)──▶ Done
//!      │
//!      ▼
//! CheckQuota ──(0 left)──▶ Cooldown ──▶ CheckQuota
//!      │
//!      ▼
//! ProcessBatch ──▶ LoadCandidates
//! ```
//!
//! Outcomes are persisted one candidate at a time, so a restarted process
//! resumes where the previous one stopped.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::clock::{CancelToken, Clock};
use crate::config::Config;
use crate::error::Result;
use crate::inspect::PageInspector;
use crate::limiter::{LimiterSettings, RateLimiter};
use crate::machine::{Outcome, TargetMachine};
use crate::reconcile::Reconciler;
use crate::store::Store;
use crate::types::{ActionKind, Relationship};

// ---------------------------------------------------------------------------
// SessionSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongBreak {
    /// Successful actions between breaks, drawn uniformly from `[min, max]`.
    pub every: (u32, u32),
    /// Extra pause on top of the regular delay, drawn uniformly from `[min, max]`.
    pub extra: (Duration, Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub kind: ActionKind,
    /// Pause after each successful action, before the next attempt.
    pub delay: Duration,
    /// Uniform jitter applied to `delay` and `error_backoff`, in percent.
    pub jitter_percent: u8,
    /// Short pause after a failed attempt before the next candidate.
    pub error_backoff: Duration,
    /// Pause before re-reading candidates when a whole batch settled nothing.
    pub idle_backoff: Duration,
    pub long_break: Option<LongBreak>,
    /// Stop after this many batches. `None` runs until no candidates remain.
    pub max_batches: Option<u32>,
}

impl SessionSettings {
    pub fn from_config(cfg: &Config) -> Self {
        let pacing = &cfg.pacing;
        let long_break = (pacing.long_break_every_min > 0).then(|| LongBreak {
            every: (pacing.long_break_every_min, pacing.long_break_every_max),
            extra: (
                Duration::from_secs(pacing.long_break_min_seconds),
                Duration::from_secs(pacing.long_break_max_seconds),
            ),
        });
        Self {
            kind: ActionKind::Unfollow,
            delay: cfg.unfollow_delay(),
            jitter_percent: pacing.jitter_percent.min(100),
            error_backoff: cfg.error_backoff(),
            idle_backoff: Duration::from_secs(cfg.limits.fallback_wait_seconds),
            long_break,
            max_batches: None,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// `base` scaled by a uniform factor in `[1 − p, 1 + p]`.
pub fn jittered(base: Duration, percent: u8, rng: &mut impl Rng) -> Duration {
    if percent == 0 || base.is_zero() {
        return base;
    }
    let spread = base.as_secs_f64() * f64::from(percent.min(100)) / 100.0;
    let secs = base.as_secs_f64() - spread + rng.gen::<f64>() * 2.0 * spread;
    Duration::from_secs_f64(secs.max(0.0))
}

// ---------------------------------------------------------------------------
// Pacer
// ---------------------------------------------------------------------------

/// Picks the pause that follows each attempt.
pub struct Pacer {
    delay: Duration,
    jitter_percent: u8,
    error_backoff: Duration,
    long_break: Option<LongBreak>,
    until_break: u32,
    rng: StdRng,
}

impl Pacer {
    pub fn new(settings: &SessionSettings, rng: StdRng) -> Self {
        let mut pacer = Self {
            delay: settings.delay,
            jitter_percent: settings.jitter_percent,
            error_backoff: settings.error_backoff,
            long_break: settings.long_break,
            until_break: 0,
            rng,
        };
        pacer.until_break = pacer.draw_interval();
        pacer
    }

    fn draw_interval(&mut self) -> u32 {
        match self.long_break {
            Some(LongBreak { every: (lo, hi), .. }) => {
                let lo = lo.max(1);
                self.rng.gen_range(lo..=hi.max(lo))
            }
            None => 0,
        }
    }

    /// Regular jittered delay, plus the extra break once enough successes
    /// have accumulated since the last one.
    pub fn after_success(&mut self) -> Duration {
        let mut pause = jittered(self.delay, self.jitter_percent, &mut self.rng);
        let Some(LongBreak { extra: (lo, hi), .. }) = self.long_break else {
            return pause;
        };
        self.until_break = self.until_break.saturating_sub(1);
        if self.until_break == 0 {
            let extra = if hi > lo {
                self.rng.gen_range(lo..=hi)
            } else {
                lo
            };
            tracing::info!(extra_secs = extra.as_secs(), "taking a longer break");
            pause += extra;
            self.until_break = self.draw_interval();
        }
        pause
    }

    pub fn after_error(&mut self) -> Duration {
        jittered(self.error_backoff, self.jitter_percent, &mut self.rng)
    }
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub unfollowed: u32,
    pub not_following: u32,
    pub unavailable: u32,
    pub errored: u32,
}

impl BatchSummary {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Success => self.unfollowed += 1,
            Outcome::NotFollowing => self.not_following += 1,
            Outcome::ProfileUnavailable => self.unavailable += 1,
            Outcome::Error(_) => self.errored += 1,
        }
    }

    fn absorb(&mut self, other: &BatchSummary) {
        self.unfollowed += other.unfollowed;
        self.not_following += other.not_following;
        self.unavailable += other.unavailable;
        self.errored += other.errored;
    }

    /// Whether any candidate left the candidate set.
    pub fn settled_any(&self) -> bool {
        self.unfollowed + self.not_following + self.unavailable > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEnd {
    /// No candidates remain.
    Done,
    /// `max_batches` reached.
    BatchLimit,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub batches: u32,
    pub cooldowns: u32,
    pub totals: BatchSummary,
    pub end: SessionEnd,
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

enum State {
    LoadCandidates,
    CheckQuota(Vec<Relationship>),
    Cooldown(Vec<Relationship>, Duration),
    ProcessBatch(Vec<Relationship>, u32),
    Finished(SessionEnd),
}

pub struct SessionController<'a, P: PageInspector, C: Clock> {
    reconciler: Reconciler<'a, C>,
    limiter: RateLimiter<'a, Store, C>,
    machine: TargetMachine<P>,
    clock: &'a C,
    settings: SessionSettings,
    cancel: CancelToken,
    pacer: Pacer,
    /// Pause owed by the last attempt, taken before the next one even when
    /// that attempt falls in a later batch.
    pending_pause: Option<Duration>,
}

impl<'a, P: PageInspector, C: Clock> SessionController<'a, P, C> {
    pub fn new(
        store: &'a Store,
        clock: &'a C,
        limits: LimiterSettings,
        machine: TargetMachine<P>,
        settings: SessionSettings,
    ) -> Self {
        let pacer = Pacer::new(&settings, StdRng::from_entropy());
        Self {
            reconciler: Reconciler::new(store, clock),
            limiter: RateLimiter::new(store, clock, limits),
            machine,
            clock,
            settings,
            cancel: CancelToken::new(),
            pacer,
            pending_pause: None,
        }
    }

    /// Stop between candidates once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn machine(&self) -> &TargetMachine<P> {
        &self.machine
    }

    /// Run until no candidates remain, the batch limit is hit, or cancellation.
    ///
    /// Storage and limiter failures are fatal and returned as `Err`; failures
    /// inside one candidate's attempt are recorded and the batch continues.
    pub fn run(&mut self) -> Result<SessionReport> {
        let mut report = SessionReport {
            batches: 0,
            cooldowns: 0,
            totals: BatchSummary::default(),
            end: SessionEnd::Done,
        };
        let mut state = State::LoadCandidates;

        loop {
            if self.cancel.is_cancelled() {
                state = State::Finished(SessionEnd::Cancelled);
            }

            state = match state {
                State::LoadCandidates => {
                    let unfollowed = self.reconciler.unfollowed_count()?;
                    let candidates = self.reconciler.candidates()?;
                    tracing::info!(
                        candidates = candidates.len(),
                        previously_unfollowed = unfollowed,
                        "loaded unfollow candidates"
                    );
                    if candidates.is_empty() {
                        tracing::info!("no more unfollow candidates");
                        State::Finished(SessionEnd::Done)
                    } else {
                        State::CheckQuota(candidates)
                    }
                }

                State::CheckQuota(candidates) => {
                    let remaining = self.limiter.capacity_remaining(self.settings.kind)?;
                    tracing::info!(
                        remaining,
                        quota = self.limiter.settings().quota,
                        "rate limit status"
                    );
                    if remaining == 0 {
                        let wait = self.limiter.time_until_slot_free(self.settings.kind)?;
                        State::Cooldown(candidates, wait)
                    } else {
                        State::ProcessBatch(candidates, remaining)
                    }
                }

                State::Cooldown(candidates, wait) => {
                    tracing::info!(
                        wait_secs = wait.as_secs(),
                        "rate limit reached, waiting for a slot"
                    );
                    report.cooldowns += 1;
                    self.pending_pause = None;
                    self.clock.sleep(wait);
                    State::CheckQuota(candidates)
                }

                State::ProcessBatch(candidates, remaining) => {
                    let Some(summary) = self.process_batch(candidates, remaining)? else {
                        state = State::Finished(SessionEnd::Cancelled);
                        continue;
                    };
                    report.batches += 1;
                    report.totals.absorb(&summary);

                    if self
                        .settings
                        .max_batches
                        .is_some_and(|max| report.batches >= max)
                    {
                        State::Finished(SessionEnd::BatchLimit)
                    } else {
                        if !summary.settled_any() {
                            tracing::warn!(
                                wait_secs = self.settings.idle_backoff.as_secs(),
                                "batch settled no candidates, backing off"
                            );
                            self.pending_pause = None;
                            self.clock.sleep(self.settings.idle_backoff);
                        }
                        State::LoadCandidates
                    }
                }

                State::Finished(end) => {
                    report.end = end;
                    self.pending_pause = None;
                    tracing::info!(
                        batches = report.batches,
                        unfollowed = report.totals.unfollowed,
                        skipped_not_following = report.totals.not_following,
                        profiles_unavailable = report.totals.unavailable,
                        errored = report.totals.errored,
                        end = ?end,
                        "session finished"
                    );
                    return Ok(report);
                }
            };
        }
    }

    /// Process up to `remaining` candidates. `None` when cancelled mid-batch.
    fn process_batch(
        &mut self,
        candidates: Vec<Relationship>,
        remaining: u32,
    ) -> Result<Option<BatchSummary>> {
        let take = candidates.len().min(remaining as usize);
        let mut summary = BatchSummary::default();

        for candidate in candidates.iter().take(take) {
            if let Some(pause) = self.pending_pause.take() {
                tracing::info!(
                    delay_secs = pause.as_secs(),
                    "waiting before next unfollow"
                );
                self.clock.sleep(pause);
            }
            if self.cancel.is_cancelled() {
                return Ok(None);
            }
            let username = candidate.username.as_str();

            let outcome = self.machine.run(candidate);
            summary.record(&outcome);
            tracing::debug!(username, outcome = outcome.label(), "candidate resolved");

            match outcome {
                Outcome::Success => {
                    self.reconciler
                        .settle_actioned(username, self.settings.kind)?;
                    self.pending_pause = Some(self.pacer.after_success());
                }
                Outcome::NotFollowing | Outcome::ProfileUnavailable => {
                    self.reconciler.settle_excluded(username)?;
                }
                Outcome::Error(reason) => {
                    // The confirm click went through, so the remote side may
                    // have counted it even though nothing settled here.
                    if reason.after_action() {
                        self.limiter.record(self.settings.kind, username)?;
                    }
                    self.pending_pause = Some(self.pacer.after_error());
                }
            }
        }

        tracing::info!(
            unfollowed = summary.unfollowed,
            skipped_not_following = summary.not_following,
            profiles_unavailable = summary.unavailable,
            errored = summary.errored,
            "session batch complete"
        );
        Ok(Some(summary))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
