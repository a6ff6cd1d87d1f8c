use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

use crate::db::Database;
use crate::ledger;

pub fn close(
    db: &Database,
    number: i64,
    resolution: &str,
    response_time_minutes: Option<i64>,
    logged_by: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let resolution = resolution.trim();
    if resolution.is_empty() {
        bail!("A resolution is required to close a ticket");
    }

    let id = db.ticket_id(number)?;
    let ticket = db.close_ticket(id, resolution, response_time_minutes, logged_by, now)?;
    let elapsed = ledger::compute_elapsed(&ticket, now);
    println!("Closed ticket #{}", number);
    println!("Total time on this ticket: {}", elapsed.display);
    Ok(())
}
