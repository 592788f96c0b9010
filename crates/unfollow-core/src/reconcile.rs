//! Candidate reconciliation over the relationship store.

use crate::clock::Clock;
use crate::error::Result;
use crate::store::Store;
use crate::types::{ActionKind, Relationship, Settlement};

pub struct Reconciler<'a, C: Clock> {
    store: &'a Store,
    clock: &'a C,
}

impl<'a, C: Clock> Reconciler<'a, C> {
    pub fn new(store: &'a Store, clock: &'a C) -> Self {
        Self { store, clock }
    }

    /// Following − followers − actioned − excluded, newest observation first.
    pub fn candidates(&self) -> Result<Vec<Relationship>> {
        self.store.candidates()
    }

    pub fn unfollowed_count(&self) -> Result<u64> {
        self.store.actioned_count()
    }

    pub fn excluded_count(&self) -> Result<u64> {
        self.store.excluded_count()
    }

    pub fn mark_actioned(&self, username: &str) -> Result<()> {
        self.store.mark_actioned(username, self.clock.now())
    }

    pub fn mark_excluded(&self, username: &str) -> Result<()> {
        self.store.mark_excluded(username, self.clock.now())
    }

    pub fn remove_from_following(&self, username: &str) -> Result<()> {
        self.store.remove_from_following(username)
    }

    /// Mark actioned, drop from following and log the action, atomically.
    pub fn settle_actioned(&self, username: &str, kind: ActionKind) -> Result<()> {
        self.store
            .settle(username, Settlement::Actioned { kind }, self.clock.now())
    }

    /// Mark excluded and drop from following, atomically.
    pub fn settle_excluded(&self, username: &str) -> Result<()> {
        self.store
            .settle(username, Settlement::Excluded, self.clock.now())
    }
}
