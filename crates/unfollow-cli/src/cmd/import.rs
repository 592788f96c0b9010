use crate::output::{print_json, print_pairs};
use anyhow::Context;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use unfollow_core::config::Config;
use unfollow_core::import::{extract_archive, import_into, ExportDir, ImportSummary};
use unfollow_core::paths;
use unfollow_core::store::Store;

pub fn run(home: &Path, archive: &Path, json: bool) -> anyhow::Result<()> {
    let (config, store) = super::open(home)?;
    let summary = import_archive(home, &config, &store, archive)?;

    if json {
        print_json(&summary)?;
    } else {
        print_summary(&summary);
    }
    Ok(())
}

/// Extract `archive` and upsert both relationship sets into `store`.
pub fn import_archive(
    home: &Path,
    config: &Config,
    store: &Store,
    archive: &Path,
) -> anyhow::Result<ImportSummary> {
    // Held until parsing is done; removed on drop when no path is configured.
    let mut scratch: Option<TempDir> = None;
    let dest: PathBuf = match &config.import.extracted_path {
        Some(p) => paths::resolve(home, p),
        None => scratch
            .insert(TempDir::new().context("failed to create extraction directory")?)
            .path()
            .to_path_buf(),
    };

    tracing::info!(archive = %archive.display(), dest = %dest.display(), "extracting export");
    extract_archive(archive, &dest)
        .with_context(|| format!("failed to extract {}", archive.display()))?;

    let export = ExportDir::open(&dest)?;
    let summary = import_into(store, &export)?;
    drop(scratch);
    Ok(summary)
}

pub fn print_summary(summary: &ImportSummary) {
    print_pairs(&[
        ("Following", summary.following.to_string()),
        (
            "Followers",
            format!("{} ({} files)", summary.followers, summary.follower_files),
        ),
        ("Candidates", summary.candidates.to_string()),
    ]);
}
