use anyhow::{bail, Result};
use chrono::{DateTime, FixedOffset, Utc};

use crate::db::Database;
use crate::ledger;
use crate::models::Ticket;
use crate::report::{local_timestamp, UNKNOWN_MEMBER};

pub fn run(db: &Database, number: i64, now: DateTime<Utc>, offset: FixedOffset) -> Result<()> {
    let ticket = match db.get_ticket(db.ticket_id(number)?)? {
        Some(t) => t,
        None => bail!("Ticket #{} not found", number),
    };
    let member = db
        .get_profile(&ticket.user_id)?
        .map(|p| p.full_name)
        .unwrap_or_else(|| UNKNOWN_MEMBER.to_string());

    print!("{}", render(&ticket, &member, now, offset));
    Ok(())
}

/// Detail view of one ticket as of `now`.
pub fn render(ticket: &Ticket, member: &str, now: DateTime<Utc>, offset: FixedOffset) -> String {
    let ts = |t: DateTime<Utc>| local_timestamp(t, offset);
    let mut out = String::new();

    out.push_str(&format!(
        "Ticket #{}: {} ({})\n",
        ticket.ticket_number,
        ticket.client,
        ticket.ticket_type.as_str()
    ));
    out.push_str(&format!("Status: {}\n", ticket.status.label()));
    out.push_str(&format!("Assignee: {} ({})\n", member, ticket.user_id));
    out.push_str(&format!("Work type: {}\n", ticket.location.label()));
    if let Some(ref estate) = ticket.estate_or_building {
        out.push_str(&format!("Estate/Building: {}\n", estate));
    }
    if let Some(ref cml) = ticket.cml_location {
        out.push_str(&format!("CML location: {}\n", cml));
    }
    if let Some(ref site) = ticket.site_name {
        out.push_str(&format!("Site: {}\n", site));
    }
    if !ticket.installers.is_empty() {
        out.push_str(&format!("Installers: {}\n", ticket.installers.join(", ")));
    }
    if let Some(target) = ticket.target_date {
        out.push_str(&format!("Target date: {}\n", target.format("%Y-%m-%d")));
    }
    if let Some(ref reference) = ticket.clickup_ticket {
        out.push_str(&format!("ClickUp: {}\n", reference));
    }
    if ticket.has_dependencies {
        out.push_str(&format!(
            "Depends on: {}\n",
            ticket.dependency_name.as_deref().unwrap_or("(unspecified)")
        ));
    }
    out.push_str(&format!("Created: {}\n", ts(ticket.created_at)));
    if let Some(closed) = ticket.closed_at {
        out.push_str(&format!("Closed: {}\n", ts(closed)));
    }
    if let Some(m) = ticket.response_time_minutes.filter(|m| *m > 0) {
        out.push_str(&format!("Response: {} min\n", m));
    }

    out.push_str("\nIssue:\n");
    for line in ticket.issue.lines() {
        out.push_str(&format!("  {}\n", line));
    }

    if !ticket.updates.is_empty() {
        out.push_str("\nUpdates:\n");
        for update in &ticket.updates {
            out.push_str(&format!("  [{}] {}\n", ts(update.timestamp), update.text));
        }
    }

    let elapsed = ledger::compute_elapsed(ticket, now);
    out.push_str(&format!("\nTime tracked: {}", elapsed.display));
    if elapsed.live_minutes > 0 {
        out.push_str(&format!(
            " (logged {} + live {})",
            ledger::format_duration(elapsed.logged_minutes),
            ledger::format_duration(elapsed.live_minutes)
        ));
    }
    out.push('\n');

    let lines = ledger::annotate_time_logs(ticket, now);
    if !lines.is_empty() {
        out.push_str("Time log:\n");
        for line in lines {
            let by = line
                .logged_by
                .as_deref()
                .map(|b| format!(" ({})", b))
                .unwrap_or_default();
            let live = if line.live { " [live]" } else { "" };
            out.push_str(&format!(
                "  [{}] {}min{} - {}{}\n",
                ts(line.timestamp),
                line.minutes,
                live,
                line.description,
                by
            ));
        }
    }
    if let Some(tail) = ledger::tracking_tail(ticket, now) {
        out.push_str(&format!("  Currently tracking: {}min since last update\n", tail));
    }

    if let Some(ref resolution) = ticket.resolution {
        if !resolution.is_empty() {
            out.push_str("\nResolution:\n");
            for line in resolution.lines() {
                out.push_str(&format!("  {}\n", line));
            }
        }
    }

    if !ticket.site_files.is_empty() {
        out.push_str("\nSite files:\n");
        for file in &ticket.site_files {
            out.push_str(&format!("  {}: {} ({})\n", file.label, file.name, file.location));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::opening_entry;
    use crate::models::{Snapshot, TicketStatus, TicketUpdate};
    use crate::test_support::{at, new_ticket, sample_ticket};
    use chrono::Duration;
    use tempfile::tempdir;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_render_open_ticket_with_live_time() {
        let t0 = at("2024-05-01T08:00:00Z");
        let mut ticket = sample_ticket(3, t0);
        ticket.time_logs = vec![opening_entry(t0, None)];
        ticket.updates = vec![TicketUpdate {
            text: "Remoted in".to_string(),
            timestamp: t0 + Duration::minutes(10),
        }];
        ticket.total_time_minutes = Some(10);

        let out = render(&ticket, "Thandi", t0 + Duration::minutes(40), utc());
        assert!(out.contains("Ticket #3: Acme (Hardware)"));
        assert!(out.contains("Time tracked: 0h 40m (logged 0h 10m + live 0h 30m)"));
        assert!(out.contains("40min [live] - Ticket opened"));
        assert!(out.contains("Currently tracking: 30min since last update"));
    }

    #[test]
    fn test_render_closed_ticket_is_static() {
        let t0 = at("2024-05-01T08:00:00Z");
        let mut ticket = sample_ticket(3, t0);
        ticket.status = TicketStatus::Closed;
        ticket.closed_at = Some(t0 + Duration::hours(2));
        ticket.total_time_minutes = Some(120);
        ticket.resolution = Some("Swapped toner".to_string());
        ticket.time_logs = vec![opening_entry(t0, None)];

        let out = render(&ticket, "Thandi", t0 + Duration::days(5), utc());
        assert!(out.contains("Time tracked: 2h 0m\n"));
        assert!(!out.contains("[live]"));
        assert!(!out.contains("Currently tracking"));
        assert!(out.contains("Closed: 2024/05/01, 10:00:00"));
        assert!(out.contains("Swapped toner"));
    }

    #[test]
    fn test_show_missing_ticket() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        let now = at("2024-05-01T08:00:00Z");
        let err = run(&db, 5, now, utc()).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_show_resolves_imported_ticket_number() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        let now = at("2024-05-01T08:00:00Z");
        let mut imported = sample_ticket(1, now);
        imported.id = 50;
        db.import_snapshot(&Snapshot {
            profiles: Vec::new(),
            tickets: vec![imported],
        })
        .unwrap();

        assert!(run(&db, 1, now, utc()).is_ok());
        assert!(run(&db, 50, now, utc()).is_err());
    }

    #[test]
    fn test_show_unknown_assignee() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        let now = at("2024-05-01T08:00:00Z");
        let id = db.create_ticket(&new_ticket("gone"), now).unwrap();
        assert!(run(&db, id, now, utc()).is_ok());
    }
}
