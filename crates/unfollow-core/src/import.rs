//! Data-export import.
//!
//! The remote service hands out a zip archive. Inside it,
//! `connections/followers_and_following/` holds one `following.json` and one or
//! more `followers*.json` fragments.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, UnfollowError};
use crate::store::Store;
use crate::types::Relationship;

const RELATIONSHIPS_DIR: [&str; 2] = ["connections", "followers_and_following"];
const FOLLOWING_FILE: &str = "following.json";
const FOLLOWERS_PREFIX: &str = "followers";

// ---------------------------------------------------------------------------
// Archive extraction
// ---------------------------------------------------------------------------

/// Unpack `archive` into `dest`, returning the number of files written.
///
/// Entries whose path would land outside `dest` are rejected.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<usize> {
    let file = fs::File::open(archive).map_err(|e| {
        UnfollowError::Import(format!("cannot open archive {}: {e}", archive.display()))
    })?;
    let mut zip = zip::ZipArchive::new(file)?;
    fs::create_dir_all(dest)?;

    let mut written = 0;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(UnfollowError::Import(format!(
                "illegal file path in archive: {}",
                entry.name()
            )));
        };
        let out = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut target = fs::File::create(&out)?;
        io::copy(&mut entry, &mut target)?;
        written += 1;
    }

    tracing::debug!(files = written, dest = %dest.display(), "archive extracted");
    Ok(written)
}

// ---------------------------------------------------------------------------
// Export file formats
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct StringListEntry {
    #[serde(default)]
    href: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct ExportRecord {
    #[serde(default)]
    title: String,
    #[serde(default)]
    string_list_data: Vec<StringListEntry>,
}

#[derive(Debug, Deserialize)]
struct FollowingExport {
    #[serde(default)]
    relationships_following: Vec<ExportRecord>,
}

fn observed_at(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

/// Build a relationship from one record, or `None` when no username exists.
fn to_relationship(record: ExportRecord, prefer_title: bool) -> Option<Relationship> {
    let first = record.string_list_data.into_iter().next();
    let (href, value, ts) = match first {
        Some(e) => (e.href, e.value, e.timestamp),
        None => (String::new(), String::new(), 0),
    };
    let username = if prefer_title && !record.title.is_empty() {
        record.title
    } else if !value.is_empty() {
        value
    } else {
        record.title
    };
    if username.is_empty() {
        return None;
    }
    Some(Relationship::new(username, href, observed_at(ts)))
}

/// Parse a `following.json` body. Usernames come from `title`.
pub fn parse_following(data: &[u8]) -> Result<Vec<Relationship>> {
    let export: FollowingExport = serde_json::from_slice(data)?;
    Ok(export
        .relationships_following
        .into_iter()
        .filter_map(|r| to_relationship(r, true))
        .collect())
}

/// Parse a `followers*.json` body. Usernames come from `value`.
pub fn parse_followers(data: &[u8]) -> Result<Vec<Relationship>> {
    let records: Vec<ExportRecord> = serde_json::from_slice(data)?;
    Ok(records
        .into_iter()
        .filter_map(|r| to_relationship(r, false))
        .collect())
}

/// All `followers*.json` files under `dir`, sorted by path.
pub fn find_follower_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    collect_follower_files(dir, &mut found)?;
    found.sort();
    Ok(found)
}

fn collect_follower_files(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_follower_files(&path, found)?;
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(FOLLOWERS_PREFIX) && name.ends_with(".json") {
            found.push(path);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Importer
// ---------------------------------------------------------------------------

/// Source of relationship sets.
pub trait Importer {
    fn import_following(&self) -> Result<Vec<Relationship>>;

    /// All follower fragments merged into one list.
    fn import_followers(&self) -> Result<Vec<Relationship>>;

    /// Number of fragments the followers came from.
    fn follower_fragments(&self) -> Result<usize> {
        Ok(1)
    }
}

/// An extracted export on disk.
#[derive(Debug, Clone)]
pub struct ExportDir {
    relationships: PathBuf,
}

impl ExportDir {
    /// Locate the relationships directory under `root`. A single wrapping
    /// top-level directory is tolerated.
    pub fn open(root: &Path) -> Result<Self> {
        let direct = relationships_dir(root);
        if direct.is_dir() {
            return Ok(Self {
                relationships: direct,
            });
        }
        for entry in fs::read_dir(root)? {
            let nested = relationships_dir(&entry?.path());
            if nested.is_dir() {
                return Ok(Self {
                    relationships: nested,
                });
            }
        }
        Err(UnfollowError::Import(format!(
            "no {} directory in {}",
            RELATIONSHIPS_DIR.join("/"),
            root.display()
        )))
    }

    pub fn relationships_dir(&self) -> &Path {
        &self.relationships
    }
}

fn relationships_dir(root: &Path) -> PathBuf {
    RELATIONSHIPS_DIR.iter().fold(root.to_path_buf(), |p, c| p.join(c))
}

impl Importer for ExportDir {
    fn import_following(&self) -> Result<Vec<Relationship>> {
        let path = self.relationships.join(FOLLOWING_FILE);
        let data = fs::read(&path).map_err(|e| {
            UnfollowError::Import(format!("cannot read {}: {e}", path.display()))
        })?;
        parse_following(&data)
    }

    fn import_followers(&self) -> Result<Vec<Relationship>> {
        let mut all = Vec::new();
        for path in find_follower_files(&self.relationships)? {
            let data = fs::read(&path)?;
            let mut rows = parse_followers(&data).map_err(|e| {
                UnfollowError::Import(format!("cannot parse {}: {e}", path.display()))
            })?;
            tracing::debug!(file = %path.display(), count = rows.len(), "parsed followers file");
            all.append(&mut rows);
        }
        Ok(all)
    }

    fn follower_fragments(&self) -> Result<usize> {
        Ok(find_follower_files(&self.relationships)?.len())
    }
}

// ---------------------------------------------------------------------------
// import_into
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub following: usize,
    pub followers: usize,
    pub follower_files: usize,
    /// Candidates after the upsert.
    pub candidates: usize,
}

/// Upsert both sets from `importer` into `store`.
///
/// Actioned and excluded sets are untouched, so re-importing an older export
/// never resurrects a settled candidate.
pub fn import_into(store: &Store, importer: &impl Importer) -> Result<ImportSummary> {
    let following = importer.import_following()?;
    let followers = importer.import_followers()?;
    let follower_files = importer.follower_fragments()?;

    store.import(&following, &followers)?;
    let candidates = store.candidates()?.len();

    tracing::info!(
        following = following.len(),
        followers = followers.len(),
        follower_files,
        candidates,
        "imported relationships"
    );
    Ok(ImportSummary {
        following: following.len(),
        followers: followers.len(),
        follower_files,
        candidates,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const FOLLOWING: &str = r#"{
      "relationships_following": [
        {"title": "alice", "string_list_data": [{"href": "https://social.test/_u/alice", "timestamp": 1700000300}]},
        {"title": "", "string_list_data": [{"href": "https://social.test/bob", "value": "bob", "timestamp": 1700000200}]},
        {"title": "carol", "string_list_data": [{"timestamp": 1700000100}]},
        {"title": "", "string_list_data": []}
      ]
    }"#;

    const FOLLOWERS_1: &str = r#"[
      {"title": "", "string_list_data": [{"href": "https://social.test/bob", "value": "bob", "timestamp": 1700000000}]}
    ]"#;

    const FOLLOWERS_2: &str = r#"[
      {"string_list_data": [{"value": "dave", "timestamp": 1700000000}]},
      {"string_list_data": []}
    ]"#;

    fn write(path: &Path, body: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn export_tree(root: &Path) -> PathBuf {
        let rel = relationships_dir(root);
        write(&rel.join("following.json"), FOLLOWING);
        write(&rel.join("followers_1.json"), FOLLOWERS_1);
        write(&rel.join("followers_2.json"), FOLLOWERS_2);
        write(&rel.join("pending_follow_requests.json"), "[]");
        rel
    }

    #[test]
    fn following_prefers_title_and_skips_nameless() {
        let rows = parse_following(FOLLOWING.as_bytes()).unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
        assert_eq!(rows[0].href, "https://social.test/_u/alice");
        assert_eq!(rows[0].observed_at.timestamp(), 1_700_000_300);
        assert_eq!(rows[2].href, "");
    }

    #[test]
    fn followers_use_value() {
        let rows = parse_followers(FOLLOWERS_2.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].username, "dave");
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_following(b"{not json").is_err());
        assert!(parse_followers(b"{\"a\": 1}").is_err());
    }

    #[test]
    fn finds_only_follower_fragments() {
        let dir = TempDir::new().unwrap();
        let rel = export_tree(dir.path());
        let files = find_follower_files(&rel).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["followers_1.json", "followers_2.json"]);
    }

    #[test]
    fn export_dir_tolerates_wrapping_directory() {
        let dir = TempDir::new().unwrap();
        export_tree(&dir.path().join("export-2025"));
        let export = ExportDir::open(dir.path()).unwrap();
        assert!(export.relationships_dir().ends_with("followers_and_following"));
    }

    #[test]
    fn export_dir_missing_layout_is_import_error() {
        let dir = TempDir::new().unwrap();
        let err = ExportDir::open(dir.path()).unwrap_err();
        assert!(matches!(err, UnfollowError::Import(_)));
    }

    #[test]
    fn import_into_store_computes_candidates() {
        let dir = TempDir::new().unwrap();
        export_tree(&dir.path().join("export"));
        let store = Store::open(&dir.path().join("import.redb")).unwrap();
        let export = ExportDir::open(&dir.path().join("export")).unwrap();

        let summary = import_into(&store, &export).unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                following: 3,
                followers: 2,
                follower_files: 2,
                candidates: 2,
            }
        );
        let names: Vec<_> = store
            .candidates()
            .unwrap()
            .into_iter()
            .map(|r| r.username)
            .collect();
        assert_eq!(names, vec!["alice", "carol"]);
    }

    #[test]
    fn reimport_keeps_settled_candidates_out() {
        let dir = TempDir::new().unwrap();
        export_tree(&dir.path().join("export"));
        let store = Store::open(&dir.path().join("import.redb")).unwrap();
        let export = ExportDir::open(&dir.path().join("export")).unwrap();

        import_into(&store, &export).unwrap();
        store.mark_actioned("alice", Utc::now()).unwrap();
        store.remove_from_following("alice").unwrap();

        let summary = import_into(&store, &export).unwrap();
        assert_eq!(summary.candidates, 1);
    }

    fn build_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default();
        for (name, body) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn extracts_archive_and_imports() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("export.zip");
        build_zip(
            &archive,
            &[
                ("connections/followers_and_following/following.json", FOLLOWING),
                ("connections/followers_and_following/followers_1.json", FOLLOWERS_1),
            ],
        );
        let dest = dir.path().join("out");
        assert_eq!(extract_archive(&archive, &dest).unwrap(), 2);

        let export = ExportDir::open(&dest).unwrap();
        assert_eq!(export.import_following().unwrap().len(), 3);
        assert_eq!(export.import_followers().unwrap().len(), 1);
    }

    #[test]
    fn rejects_path_traversal() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("evil.zip");
        build_zip(&archive, &[("../escape.txt", "x")]);
        let dest = dir.path().join("out");

        let err = extract_archive(&archive, &dest).unwrap_err();
        assert!(matches!(err, UnfollowError::Import(_)));
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn missing_archive_is_import_error() {
        let dir = TempDir::new().unwrap();
        let err = extract_archive(&dir.path().join("nope.zip"), dir.path()).unwrap_err();
        assert!(matches!(err, UnfollowError::Import(_)));
    }
}
