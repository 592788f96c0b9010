//! Typed view of a remote profile page.
//!
//! The remote UI offers no structured feedback, only text and DOM heuristics.
//! `PageInspector` narrows that down to a fixed vocabulary of queries so the
//! target state machine never sees a selector or a script.

use crate::error::Result;
use crate::types::{Availability, Control, RelationshipStatus};

pub trait PageInspector {
    /// Load the profile view at `url`.
    fn open_profile(&mut self, url: &str) -> Result<()>;

    /// Whether the loaded view shows a "profile gone" signal.
    fn availability(&mut self) -> Result<Availability>;

    /// Tri-state relationship signal for the loaded view.
    fn relationship(&mut self) -> Result<RelationshipStatus>;

    /// Locate and activate `control`. `Ok(false)` means it was not found.
    fn activate(&mut self, control: Control) -> Result<bool>;
}

impl<P: PageInspector + ?Sized> PageInspector for &mut P {
    fn open_profile(&mut self, url: &str) -> Result<()> {
        (**self).open_profile(url)
    }

    fn availability(&mut self) -> Result<Availability> {
        (**self).availability()
    }

    fn relationship(&mut self) -> Result<RelationshipStatus> {
        (**self).relationship()
    }

    fn activate(&mut self, control: Control) -> Result<bool> {
        (**self).activate(control)
    }
}

// ---------------------------------------------------------------------------
// ScriptedPage: canned responses for tests
// ---------------------------------------------------------------------------
