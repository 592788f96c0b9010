//! Per-target state machine.
//!
//! ```text
//! Navigate → ClassifyAvailability → ClassifyRelationship → Act → Verify
//!     │              │                      │               │       │
//!   Error    ProfileUnavailable   NotFollowing / Error    Error   Success / Error
//! ```
//!
//! Steps run strictly in order with no backtracking. The machine never writes
//! to the store; the caller applies the returned [`Outcome`].

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::config::UnknownAfterAction;
use crate::inspect::PageInspector;
use crate::types::{Availability, Control, Relationship, RelationshipStatus};

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Navigate,
    ClassifyAvailability,
    ClassifyRelationship,
    Act,
    Verify,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Navigate => "navigate",
            Step::ClassifyAvailability => "classify_availability",
            Step::ClassifyRelationship => "classify_relationship",
            Step::Act => "act",
            Step::Verify => "verify",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("{step} inspection failed: {message}")]
    Inspection { step: Step, message: String },

    #[error("relationship status is ambiguous before acting")]
    AmbiguousStatus,

    #[error("{0} not found")]
    ControlMissing(Control),

    #[error("still following after the unfollow was confirmed")]
    NotApplied,

    #[error("could not verify the unfollow took effect")]
    Unverified,
}

impl FailureReason {
    /// Whether the failure came after the confirm click.
    pub fn after_action(&self) -> bool {
        matches!(
            self,
            FailureReason::NotApplied
                | FailureReason::Unverified
                | FailureReason::Inspection {
                    step: Step::Verify,
                    ..
                }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    NotFollowing,
    ProfileUnavailable,
    Error(FailureReason),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::NotFollowing => "not_following",
            Outcome::ProfileUnavailable => "profile_unavailable",
            Outcome::Error(_) => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// TargetMachine
// ---------------------------------------------------------------------------

pub struct TargetMachine<P: PageInspector> {
    inspector: P,
    base_url: String,
    unknown_after_action: UnknownAfterAction,
}

impl<P: PageInspector> TargetMachine<P> {
    pub fn new(
        inspector: P,
        base_url: impl Into<String>,
        unknown_after_action: UnknownAfterAction,
    ) -> Self {
        Self {
            inspector,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            unknown_after_action,
        }
    }

    pub fn inspector(&self) -> &P {
        &self.inspector
    }

    /// Canonical profile URL. The export href is not used because it points at
    /// redirect stubs whose final page varies.
    pub fn profile_url(&self, username: &str) -> String {
        format!("{}/{}/", self.base_url, username)
    }

    /// Drive one attempt for `target` and report the outcome.
    pub fn run(&mut self, target: &Relationship) -> Outcome {
        let username = target.username.as_str();
        match self.attempt(username) {
            Ok(outcome) | Err(outcome) => {
                match &outcome {
                    Outcome::Success => tracing::info!(username, "unfollow verified"),
                    Outcome::NotFollowing => {
                        tracing::info!(username, "not following this account, skipping")
                    }
                    Outcome::ProfileUnavailable => {
                        tracing::info!(username, "profile unavailable, skipping")
                    }
                    Outcome::Error(reason) => {
                        tracing::warn!(username, reason = %reason, "unfollow attempt failed")
                    }
                }
                outcome
            }
        }
    }

    /// Terminal outcomes other than `Success` short-circuit through `Err`.
    fn attempt(&mut self, username: &str) -> Result<Outcome, Outcome> {
        let url = self.profile_url(username);

        tracing::debug!(username, step = %Step::Navigate, url = %url, "step");
        self.inspector
            .open_profile(&url)
            .map_err(|e| Outcome::Error(FailureReason::Navigation(e.to_string())))?;

        tracing::debug!(username, step = %Step::ClassifyAvailability, "step");
        let availability = self
            .inspector
            .availability()
            .map_err(|e| inspection(Step::ClassifyAvailability, e))?;
        if availability == Availability::Unavailable {
            return Err(Outcome::ProfileUnavailable);
        }

        tracing::debug!(username, step = %Step::ClassifyRelationship, "step");
        match self
            .inspector
            .relationship()
            .map_err(|e| inspection(Step::ClassifyRelationship, e))?
        {
            RelationshipStatus::Following => {}
            RelationshipStatus::NotFollowing => return Err(Outcome::NotFollowing),
            RelationshipStatus::Unknown => {
                return Err(Outcome::Error(FailureReason::AmbiguousStatus))
            }
        }

        tracing::info!(username, "unfollowing");
        for control in [Control::OpenMenu, Control::Confirm] {
            tracing::debug!(username, step = %Step::Act, control = %control, "step");
            let found = self
                .inspector
                .activate(control)
                .map_err(|e| inspection(Step::Act, e))?;
            if !found {
                return Err(Outcome::Error(FailureReason::ControlMissing(control)));
            }
        }

        tracing::debug!(username, step = %Step::Verify, "step");
        match self
            .inspector
            .relationship()
            .map_err(|e| inspection(Step::Verify, e))?
        {
            RelationshipStatus::NotFollowing => Ok(Outcome::Success),
            RelationshipStatus::Following => Err(Outcome::Error(FailureReason::NotApplied)),
            RelationshipStatus::Unknown => match self.unknown_after_action {
                UnknownAfterAction::AssumeSuccess => {
                    tracing::warn!(username, "could not verify unfollow, assuming success");
                    Ok(Outcome::Success)
                }
                UnknownAfterAction::Error => Err(Outcome::Error(FailureReason::Unverified)),
            },
        }
    }
}

fn inspection(step: Step, e: crate::error::UnfollowError) -> Outcome {
    Outcome::Error(FailureReason::Inspection {
        step,
        message: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
