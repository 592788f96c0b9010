use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Relationship
// ---------------------------------------------------------------------------

/// One edge of the social graph as seen in a data export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub username: String,
    /// Profile locator taken verbatim from the export. May be empty.
    #[serde(default)]
    pub href: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub observed_at: DateTime<Utc>,
}

impl Relationship {
    pub fn new(
        username: impl Into<String>,
        href: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            username: username.into(),
            href: href.into(),
            observed_at,
        }
    }
}

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Unfollow,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Unfollow => "unfollow",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ActionEntry
// ---------------------------------------------------------------------------

/// A single row of the append-only action log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEntry {
    pub id: Uuid,
    pub kind: ActionKind,
    pub username: String,
    pub at: DateTime<Utc>,
}

impl ActionEntry {
    pub fn new(kind: ActionKind, username: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            username: username.into(),
            at,
        }
    }
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

/// How a candidate leaves the candidate set. Applied atomically by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The action was applied and verified; it also consumes rate-limit quota.
    Actioned { kind: ActionKind },
    /// The remote side disagreed with the export (not following, or gone).
    Excluded,
}

// ---------------------------------------------------------------------------
// Remote observations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Unavailable,
}

/// Tri-state relationship signal read off the profile page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipStatus {
    Following,
    NotFollowing,
    Unknown,
}

impl RelationshipStatus {
    /// Parse the token emitted by the inspection script. Anything
    /// unrecognised is `Unknown`.
    pub fn from_token(token: &str) -> Self {
        match token.trim() {
            "following" => RelationshipStatus::Following,
            "not_following" => RelationshipStatus::NotFollowing,
            _ => RelationshipStatus::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipStatus::Following => "following",
            RelationshipStatus::NotFollowing => "not_following",
            RelationshipStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RelationshipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Controls of the two-step unfollow commit UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    /// The "Following" button that opens the menu.
    OpenMenu,
    /// The "Unfollow" entry inside the menu.
    Confirm,
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Control::OpenMenu => f.write_str("following button"),
            Control::Confirm => f.write_str("unfollow confirmation"),
        }
    }
}
