use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::db::Database;
use crate::ledger;
use crate::models::TicketStatus;
use crate::report::{self, AssigneeFilter};

pub fn run(
    db: &Database,
    assignee: &AssigneeFilter,
    status: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let status = match status {
        None | Some("all") => None,
        Some(s) => Some(TicketStatus::parse(s)?),
    };

    let snapshot = db.snapshot()?;
    let tickets = report::list_filter(&snapshot.tickets, assignee, status);

    if tickets.is_empty() {
        println!("No tickets found.");
        return Ok(());
    }

    let names: HashMap<&str, &str> = snapshot
        .profiles
        .iter()
        .map(|p| (p.id.as_str(), p.full_name.as_str()))
        .collect();

    for ticket in tickets {
        let status_display = format!("[{}]", ticket.status.as_str());
        let member = names
            .get(ticket.user_id.as_str())
            .copied()
            .unwrap_or(report::UNKNOWN_MEMBER);
        let elapsed = ledger::compute_elapsed(ticket, now);
        println!(
            "#{:<4} {:8} {:<9} {:<24} {:<18} {:>9} {}",
            ticket.ticket_number,
            status_display,
            ticket.ticket_type.as_str(),
            truncate(&ticket.client, 24),
            truncate(member, 18),
            elapsed.display,
            ticket.created_at.format("%Y-%m-%d")
        );
    }

    Ok(())
}

fn truncate(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars - 3).collect();
        format!("{}...", truncated)
    }
}
