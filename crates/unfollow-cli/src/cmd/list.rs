use crate::output::{print_json, print_table};
use std::path::Path;

pub fn run(home: &Path, json: bool) -> anyhow::Result<()> {
    let (_config, store) = super::open(home)?;
    let candidates = store.candidates()?;
    let unfollowed = store.actioned_count()?;

    if json {
        print_json(&serde_json::json!({
            "candidates": candidates,
            "unfollowed": unfollowed,
        }))?;
        return Ok(());
    }

    if candidates.is_empty() {
        println!("No unfollow candidates.");
    } else {
        let rows = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| {
                vec![
                    (i + 1).to_string(),
                    c.username.clone(),
                    c.observed_at.format("%Y-%m-%d").to_string(),
                ]
            })
            .collect();
        print_table(&["#", "USERNAME", "FOLLOWED"], rows);
    }
    println!("Already unfollowed: {unfollowed}");
    Ok(())
}
