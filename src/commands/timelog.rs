use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

use crate::db::Database;
use crate::ledger;

pub fn run(
    db: &Database,
    number: i64,
    minutes: i64,
    description: &str,
    logged_by: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let description = description.trim();
    if description.is_empty() {
        bail!("A description is required when logging time");
    }

    let id = db.ticket_id(number)?;
    db.log_time(id, minutes, description, logged_by, now)?;

    let total = match db.get_ticket(id)? {
        Some(t) => ledger::compute_elapsed(&t, now),
        None => bail!("Ticket #{} not found", number),
    };
    println!("Logged {} min on ticket #{}", minutes, number);
    println!("Total time on this ticket: {}", total.display);
    Ok(())
}
