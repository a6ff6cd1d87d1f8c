use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::db::Database;
use crate::models::Snapshot;

/// Load a JSON dump of profiles and tickets from the managed backend.
pub fn run(db: &Database, path: &Path) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let snapshot: Snapshot =
        serde_json::from_str(&content).context("Failed to parse snapshot JSON")?;

    let (profiles, tickets) = db.import_snapshot(&snapshot)?;
    println!("Imported {} profiles and {} tickets", profiles, tickets);
    Ok(())
}
