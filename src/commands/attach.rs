use anyhow::{bail, Result};
use std::path::Path;

use crate::db::Database;
use crate::models::SiteFile;

/// Record a labelled site file reference. The file itself is not copied.
pub fn run(db: &Database, number: i64, path: &str, label: &str) -> Result<()> {
    let label = label.trim();
    if label.is_empty() {
        bail!("Every site file needs a label (use --label)");
    }
    let name = match Path::new(path).file_name().and_then(|n| n.to_str()) {
        Some(n) => n.to_string(),
        None => bail!("'{}' does not name a file", path),
    };

    let id = db.ticket_id(number)?;
    db.attach_site_file(
        id,
        SiteFile {
            name: name.clone(),
            location: path.to_string(),
            label: label.to_string(),
        },
    )?;
    println!("Attached {} to ticket #{} as '{}'", name, number, label);
    Ok(())
}
