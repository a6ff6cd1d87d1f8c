use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

use crate::db::Database;

pub fn run(
    db: &Database,
    number: i64,
    text: &str,
    logged_by: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let text = text.trim();
    if text.is_empty() {
        bail!("Update text must not be empty");
    }

    let id = db.ticket_id(number)?;
    let entry = db.add_update(id, text, logged_by, now)?;
    println!("Posted update to ticket #{} (+{} min logged)", number, entry.minutes);
    Ok(())
}
