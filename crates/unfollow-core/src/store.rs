//! Persistent relationship state using redb.
//!
//! # Table design
//!
//! | table | key | value |
//! |---|---|---|
//! | `following` | username | JSON `Relationship` |
//! | `followers` | username | JSON `Relationship` |
//! | `actioned` | username | epoch millis |
//! | `excluded` | username | epoch millis |
//! | `action_log` | `[timestamp_ms BE | uuid]` | JSON `ActionEntry` |
//!
//! The action log key puts the timestamp in the high bytes, so byte order
//! equals timestamp order and a window query is one range scan starting at
//! `window_lower_bound(since)`.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition, WriteTransaction};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{storage, Result};
use crate::types::{ActionEntry, ActionKind, Relationship, Settlement};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

type RelationshipTable = TableDefinition<'static, &'static str, &'static [u8]>;
type MarkTable = TableDefinition<'static, &'static str, i64>;

const FOLLOWING: RelationshipTable = TableDefinition::new("following");
const FOLLOWERS: RelationshipTable = TableDefinition::new("followers");
const ACTIONED: MarkTable = TableDefinition::new("actioned");
const EXCLUDED: MarkTable = TableDefinition::new("excluded");
/// Key: 24-byte composite (timestamp_ms big-endian ++ uuid bytes)
const ACTION_LOG: TableDefinition<&[u8], &[u8]> = TableDefinition::new("action_log");

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

fn action_key(ts: DateTime<Utc>, id: Uuid) -> [u8; 24] {
    let mut key = [0u8; 24];
    let ms = ts.timestamp_millis().max(0) as u64;
    key[..8].copy_from_slice(&ms.to_be_bytes());
    key[8..].copy_from_slice(id.as_bytes());
    key
}

/// Lower bound for a range scan returning every entry at or after `since`.
fn window_lower_bound(since: DateTime<Utc>) -> [u8; 24] {
    let mut key = [0u8; 24];
    let ms = since.timestamp_millis().max(0) as u64;
    key[..8].copy_from_slice(&ms.to_be_bytes());
    key
}

fn upsert_rows(wt: &WriteTransaction, def: RelationshipTable, rows: &[Relationship]) -> Result<()> {
    let mut table = wt.open_table(def).map_err(storage)?;
    for row in rows {
        let value = serde_json::to_vec(row)?;
        table
            .insert(row.username.as_str(), value.as_slice())
            .map_err(storage)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Candidate computation
// ---------------------------------------------------------------------------

/// `following − followers − actioned − excluded`, most recently observed
/// first, ties broken by username.
pub fn compute_candidates(
    following: Vec<Relationship>,
    followers: &HashSet<String>,
    actioned: &HashSet<String>,
    excluded: &HashSet<String>,
) -> Vec<Relationship> {
    let mut out: Vec<Relationship> = following
        .into_iter()
        .filter(|r| {
            !followers.contains(&r.username)
                && !actioned.contains(&r.username)
                && !excluded.contains(&r.username)
        })
        .collect();
    out.sort_by(|a, b| {
        b.observed_at
            .cmp(&a.observed_at)
            .then_with(|| a.username.cmp(&b.username))
    });
    out
}

// ---------------------------------------------------------------------------
// StoreStats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub following: u64,
    pub followers: u64,
    pub actioned: u64,
    pub excluded: u64,
    pub logged_actions: u64,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Single-writer persistent store for relationship sets and the action log.
pub struct Store {
    db: Database,
}

impl Store {
    /// Open or create the redb database at `path`, creating every table.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(storage)?;
        let wt = db.begin_write().map_err(storage)?;
        wt.open_table(FOLLOWING).map_err(storage)?;
        wt.open_table(FOLLOWERS).map_err(storage)?;
        wt.open_table(ACTIONED).map_err(storage)?;
        wt.open_table(EXCLUDED).map_err(storage)?;
        wt.open_table(ACTION_LOG).map_err(storage)?;
        wt.commit().map_err(storage)?;
        Ok(Self { db })
    }

    // -- Import ---------------------------------------------------------------

    /// Insert or replace following entries keyed by username.
    pub fn upsert_following(&self, rows: &[Relationship]) -> Result<()> {
        self.upsert(FOLLOWING, rows)
    }

    /// Insert or replace follower entries keyed by username.
    pub fn upsert_followers(&self, rows: &[Relationship]) -> Result<()> {
        self.upsert(FOLLOWERS, rows)
    }

    /// Upsert both relationship sets in one write transaction, so a reader
    /// never sees the new following set against stale followers.
    pub fn import(&self, following: &[Relationship], followers: &[Relationship]) -> Result<()> {
        let wt = self.db.begin_write().map_err(storage)?;
        upsert_rows(&wt, FOLLOWING, following)?;
        upsert_rows(&wt, FOLLOWERS, followers)?;
        wt.commit().map_err(storage)?;
        Ok(())
    }

    fn upsert(&self, def: RelationshipTable, rows: &[Relationship]) -> Result<()> {
        let wt = self.db.begin_write().map_err(storage)?;
        upsert_rows(&wt, def, rows)?;
        wt.commit().map_err(storage)?;
        Ok(())
    }

    /// All following entries in username order.
    pub fn following(&self) -> Result<Vec<Relationship>> {
        self.relationships(FOLLOWING)
    }

    /// All follower entries in username order.
    pub fn followers(&self) -> Result<Vec<Relationship>> {
        self.relationships(FOLLOWERS)
    }

    fn relationships(&self, def: RelationshipTable) -> Result<Vec<Relationship>> {
        let rt = self.db.begin_read().map_err(storage)?;
        let table = rt.open_table(def).map_err(storage)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(storage)? {
            let (_, v) = entry.map_err(storage)?;
            out.push(serde_json::from_slice(v.value())?);
        }
        Ok(out)
    }

    // -- Candidates -----------------------------------------------------------

    /// Current candidate set, read from a single snapshot.
    pub fn candidates(&self) -> Result<Vec<Relationship>> {
        let rt = self.db.begin_read().map_err(storage)?;

        let following_table = rt.open_table(FOLLOWING).map_err(storage)?;
        let mut following = Vec::new();
        for entry in following_table.iter().map_err(storage)? {
            let (_, v) = entry.map_err(storage)?;
            following.push(serde_json::from_slice::<Relationship>(v.value())?);
        }

        let followers_table = rt.open_table(FOLLOWERS).map_err(storage)?;
        let mut followers = HashSet::new();
        for entry in followers_table.iter().map_err(storage)? {
            let (k, _) = entry.map_err(storage)?;
            followers.insert(k.value().to_string());
        }

        let actioned = Self::keys(&rt.open_table(ACTIONED).map_err(storage)?)?;
        let excluded = Self::keys(&rt.open_table(EXCLUDED).map_err(storage)?)?;

        Ok(compute_candidates(following, &followers, &actioned, &excluded))
    }

    fn keys(table: &impl ReadableTable<&'static str, i64>) -> Result<HashSet<String>> {
        let mut out = HashSet::new();
        for entry in table.iter().map_err(storage)? {
            let (k, _) = entry.map_err(storage)?;
            out.insert(k.value().to_string());
        }
        Ok(out)
    }

    // -- Outcome mutators -----------------------------------------------------

    /// Record `username` as actioned. Re-marking overwrites the timestamp.
    pub fn mark_actioned(&self, username: &str, at: DateTime<Utc>) -> Result<()> {
        self.mark(ACTIONED, username, at)
    }

    /// Record `username` as confirmed-not-a-target.
    pub fn mark_excluded(&self, username: &str, at: DateTime<Utc>) -> Result<()> {
        self.mark(EXCLUDED, username, at)
    }

    fn mark(&self, def: MarkTable, username: &str, at: DateTime<Utc>) -> Result<()> {
        let wt = self.db.begin_write().map_err(storage)?;
        {
            let mut table = wt.open_table(def).map_err(storage)?;
            table
                .insert(username, at.timestamp_millis())
                .map_err(storage)?;
        }
        wt.commit().map_err(storage)?;
        Ok(())
    }

    /// Delete `username` from the following set. Missing entries are fine.
    pub fn remove_from_following(&self, username: &str) -> Result<()> {
        let wt = self.db.begin_write().map_err(storage)?;
        {
            let mut table = wt.open_table(FOLLOWING).map_err(storage)?;
            table.remove(username).map_err(storage)?;
        }
        wt.commit().map_err(storage)?;
        Ok(())
    }

    /// Apply one candidate's resolution in a single write transaction.
    ///
    /// `Actioned` also appends the action-log entry, so quota accounting and
    /// the candidate sets always move together.
    pub fn settle(&self, username: &str, settlement: Settlement, at: DateTime<Utc>) -> Result<()> {
        let wt = self.db.begin_write().map_err(storage)?;
        {
            match settlement {
                Settlement::Actioned { kind } => {
                    let mut actioned = wt.open_table(ACTIONED).map_err(storage)?;
                    actioned
                        .insert(username, at.timestamp_millis())
                        .map_err(storage)?;

                    let entry = ActionEntry::new(kind, username, at);
                    let key = action_key(entry.at, entry.id);
                    let value = serde_json::to_vec(&entry)?;
                    let mut log = wt.open_table(ACTION_LOG).map_err(storage)?;
                    log.insert(key.as_slice(), value.as_slice())
                        .map_err(storage)?;
                }
                Settlement::Excluded => {
                    let mut excluded = wt.open_table(EXCLUDED).map_err(storage)?;
                    excluded
                        .insert(username, at.timestamp_millis())
                        .map_err(storage)?;
                }
            }
            let mut following = wt.open_table(FOLLOWING).map_err(storage)?;
            following.remove(username).map_err(storage)?;
        }
        wt.commit().map_err(storage)?;
        Ok(())
    }

    // -- Aggregates -----------------------------------------------------------

    pub fn actioned_count(&self) -> Result<u64> {
        let rt = self.db.begin_read().map_err(storage)?;
        let table = rt.open_table(ACTIONED).map_err(storage)?;
        table.len().map_err(storage)
    }

    pub fn excluded_count(&self) -> Result<u64> {
        let rt = self.db.begin_read().map_err(storage)?;
        let table = rt.open_table(EXCLUDED).map_err(storage)?;
        table.len().map_err(storage)
    }

    pub fn is_actioned(&self, username: &str) -> Result<bool> {
        let rt = self.db.begin_read().map_err(storage)?;
        let table = rt.open_table(ACTIONED).map_err(storage)?;
        Ok(table.get(username).map_err(storage)?.is_some())
    }

    pub fn is_excluded(&self, username: &str) -> Result<bool> {
        let rt = self.db.begin_read().map_err(storage)?;
        let table = rt.open_table(EXCLUDED).map_err(storage)?;
        Ok(table.get(username).map_err(storage)?.is_some())
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let rt = self.db.begin_read().map_err(storage)?;
        Ok(StoreStats {
            following: rt.open_table(FOLLOWING).map_err(storage)?.len().map_err(storage)?,
            followers: rt.open_table(FOLLOWERS).map_err(storage)?.len().map_err(storage)?,
            actioned: rt.open_table(ACTIONED).map_err(storage)?.len().map_err(storage)?,
            excluded: rt.open_table(EXCLUDED).map_err(storage)?.len().map_err(storage)?,
            logged_actions: rt.open_table(ACTION_LOG).map_err(storage)?.len().map_err(storage)?,
        })
    }

    // -- Action log -----------------------------------------------------------

    /// Append one entry. Existing entries are never rewritten.
    pub fn append_action(&self, entry: &ActionEntry) -> Result<()> {
        let key = action_key(entry.at, entry.id);
        let value = serde_json::to_vec(entry)?;
        let wt = self.db.begin_write().map_err(storage)?;
        {
            let mut table = wt.open_table(ACTION_LOG).map_err(storage)?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(storage)?;
        }
        wt.commit().map_err(storage)?;
        Ok(())
    }

    /// Entries of `kind` stamped at or after `since`, oldest first.
    ///
    /// Entries dated in the future (clock skew) are included.
    pub fn actions_since(&self, kind: ActionKind, since: DateTime<Utc>) -> Result<Vec<ActionEntry>> {
        let lower = window_lower_bound(since);
        let rt = self.db.begin_read().map_err(storage)?;
        let table = rt.open_table(ACTION_LOG).map_err(storage)?;

        let mut out = Vec::new();
        for entry in table.range(lower.as_slice()..).map_err(storage)? {
            let (_, v) = entry.map_err(storage)?;
            let action: ActionEntry = serde_json::from_slice(v.value())?;
            if action.kind == kind {
                out.push(action);
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as CDur;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("test.redb")).unwrap();
        (dir, store)
    }

    fn rel(name: &str, ts: i64) -> Relationship {
        Relationship::new(
            name,
            format!("https://www.instagram.com/{name}"),
            DateTime::from_timestamp(ts, 0).unwrap(),
        )
    }

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn compute_candidates_is_the_set_difference() {
        let following = vec![rel("a", 1), rel("b", 2), rel("c", 3), rel("d", 4), rel("e", 5)];
        let out = compute_candidates(following, &set(&["b"]), &set(&["c"]), &set(&["d"]));
        let names: Vec<_> = out.iter().map(|r| r.username.as_str()).collect();
        assert_eq!(names, vec!["e", "a"]);
    }

    #[test]
    fn compute_candidates_ignores_marks_without_following() {
        let following = vec![rel("a", 1)];
        let out = compute_candidates(following, &set(&["zz"]), &set(&["yy"]), &set(&["xx"]));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn compute_candidates_breaks_ties_by_username() {
        let following = vec![rel("zed", 10), rel("amy", 10), rel("old", 1)];
        let out = compute_candidates(following, &set(&[]), &set(&[]), &set(&[]));
        let names: Vec<_> = out.iter().map(|r| r.username.as_str()).collect();
        assert_eq!(names, vec!["amy", "zed", "old"]);
    }

    #[test]
    fn compute_candidates_every_mark_combination() {
        // Each of the 16 membership combinations over (followers, actioned,
        // excluded, following) for a single name.
        for mask in 0u8..16 {
            let in_following = mask & 1 != 0;
            let in_followers = mask & 2 != 0;
            let in_actioned = mask & 4 != 0;
            let in_excluded = mask & 8 != 0;
            let pick = |on: bool| if on { set(&["x"]) } else { set(&[]) };
            let following = if in_following { vec![rel("x", 1)] } else { vec![] };
            let out = compute_candidates(
                following,
                &pick(in_followers),
                &pick(in_actioned),
                &pick(in_excluded),
            );
            let expected = in_following && !in_followers && !in_actioned && !in_excluded;
            assert_eq!(!out.is_empty(), expected, "mask {mask:04b}");
        }
    }

    #[test]
    fn candidates_reads_all_tables() {
        let (_dir, store) = open_tmp();
        store
            .upsert_following(&[rel("a", 30), rel("b", 20), rel("c", 10), rel("d", 40)])
            .unwrap();
        store.upsert_followers(&[rel("b", 5)]).unwrap();
        store.mark_excluded("d", Utc::now()).unwrap();

        let names: Vec<_> = store
            .candidates()
            .unwrap()
            .into_iter()
            .map(|r| r.username)
            .collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn actioned_names_stay_out_even_when_reimported() {
        let (_dir, store) = open_tmp();
        store.upsert_following(&[rel("a", 1)]).unwrap();
        store
            .settle("a", Settlement::Actioned { kind: ActionKind::Unfollow }, Utc::now())
            .unwrap();
        store.upsert_following(&[rel("a", 1)]).unwrap();
        assert!(store.candidates().unwrap().is_empty());
    }

    #[test]
    fn import_writes_both_sets_together() {
        let (_dir, store) = open_tmp();
        store
            .import(&[rel("a", 1), rel("b", 2), rel("c", 3)], &[rel("b", 2)])
            .unwrap();

        assert_eq!(store.following().unwrap().len(), 3);
        assert_eq!(store.followers().unwrap().len(), 1);
        let names: Vec<_> = store
            .candidates()
            .unwrap()
            .into_iter()
            .map(|r| r.username)
            .collect();
        assert_eq!(names, vec!["c", "a"]);

        // A later import only adds; earlier rows stay.
        store.import(&[rel("d", 4)], &[rel("a", 1)]).unwrap();
        let names: Vec<_> = store
            .candidates()
            .unwrap()
            .into_iter()
            .map(|r| r.username)
            .collect();
        assert_eq!(names, vec!["d", "c"]);
    }

    #[test]
    fn upsert_is_idempotent() {
        let (_dir, store) = open_tmp();
        let following = vec![rel("a", 1), rel("b", 2)];
        let followers = vec![rel("b", 2), rel("c", 3)];
        store.upsert_following(&following).unwrap();
        store.upsert_followers(&followers).unwrap();
        let before = (store.following().unwrap(), store.followers().unwrap());

        store.upsert_following(&following).unwrap();
        store.upsert_followers(&followers).unwrap();
        let after = (store.following().unwrap(), store.followers().unwrap());

        assert_eq!(
            serde_json::to_vec(&before.0).unwrap(),
            serde_json::to_vec(&after.0).unwrap()
        );
        assert_eq!(
            serde_json::to_vec(&before.1).unwrap(),
            serde_json::to_vec(&after.1).unwrap()
        );
    }

    #[test]
    fn upsert_replaces_by_username() {
        let (_dir, store) = open_tmp();
        store.upsert_following(&[rel("a", 1)]).unwrap();
        store.upsert_following(&[rel("a", 99)]).unwrap();
        let following = store.following().unwrap();
        assert_eq!(following.len(), 1);
        assert_eq!(following[0].observed_at.timestamp(), 99);
    }

    #[test]
    fn settle_actioned_is_atomic_and_logs() {
        let (_dir, store) = open_tmp();
        store.upsert_following(&[rel("a", 1)]).unwrap();
        let now = Utc::now();
        store
            .settle("a", Settlement::Actioned { kind: ActionKind::Unfollow }, now)
            .unwrap();

        assert!(store.is_actioned("a").unwrap());
        assert!(store.following().unwrap().is_empty());
        let log = store
            .actions_since(ActionKind::Unfollow, now - CDur::seconds(1))
            .unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].username, "a");
    }

    #[test]
    fn settle_excluded_does_not_log() {
        let (_dir, store) = open_tmp();
        store.upsert_following(&[rel("a", 1)]).unwrap();
        let now = Utc::now();
        store.settle("a", Settlement::Excluded, now).unwrap();
        assert!(store.is_excluded("a").unwrap());
        assert!(!store.is_actioned("a").unwrap());
        assert_eq!(store.excluded_count().unwrap(), 1);
        assert!(store
            .actions_since(ActionKind::Unfollow, now - CDur::hours(1))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn mutators_are_idempotent() {
        let (_dir, store) = open_tmp();
        store.upsert_following(&[rel("a", 1)]).unwrap();
        let now = Utc::now();
        store.mark_actioned("a", now).unwrap();
        store.mark_actioned("a", now).unwrap();
        store.mark_excluded("a", now).unwrap();
        store.mark_excluded("a", now).unwrap();
        store.remove_from_following("a").unwrap();
        store.remove_from_following("a").unwrap();
        assert_eq!(store.actioned_count().unwrap(), 1);
        assert_eq!(store.excluded_count().unwrap(), 1);
        assert!(store.following().unwrap().is_empty());
    }

    #[test]
    fn actions_since_is_timestamp_ordered_and_windowed() {
        let (_dir, store) = open_tmp();
        let now = Utc::now();
        // Inserted out of order on purpose.
        let second = ActionEntry::new(ActionKind::Unfollow, "second", now - CDur::minutes(10));
        let first = ActionEntry::new(ActionKind::Unfollow, "first", now - CDur::minutes(30));
        let stale = ActionEntry::new(ActionKind::Unfollow, "stale", now - CDur::minutes(90));
        store.append_action(&second).unwrap();
        store.append_action(&first).unwrap();
        store.append_action(&stale).unwrap();

        let window = store
            .actions_since(ActionKind::Unfollow, now - CDur::hours(1))
            .unwrap();
        let names: Vec<_> = window.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn future_dated_entries_count_inside_the_window() {
        let (_dir, store) = open_tmp();
        let now = Utc::now();
        let skewed = ActionEntry::new(ActionKind::Unfollow, "skewed", now + CDur::minutes(5));
        store.append_action(&skewed).unwrap();
        let window = store
            .actions_since(ActionKind::Unfollow, now - CDur::hours(1))
            .unwrap();
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn reopen_preserves_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.redb");
        {
            let store = Store::open(&path).unwrap();
            store.upsert_following(&[rel("a", 1), rel("b", 2)]).unwrap();
            store.settle("b", Settlement::Excluded, Utc::now()).unwrap();
        }
        let store = Store::open(&path).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.following, 1);
        assert_eq!(stats.excluded, 1);
        assert_eq!(store.candidates().unwrap()[0].username, "a");
    }
}
