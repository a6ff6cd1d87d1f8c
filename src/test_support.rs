//! Fixtures shared by the unit tests.

use chrono::{DateTime, Utc};

use crate::db::NewTicket;
use crate::models::{Profile, Ticket, TicketStatus, TicketType, WorkLocation};

pub fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

/// An open remote Hardware ticket with nothing logged.
pub fn sample_ticket(number: i64, created_at: DateTime<Utc>) -> Ticket {
    Ticket {
        id: number,
        ticket_number: number,
        user_id: "tech-1".to_string(),
        ticket_type: TicketType::Hardware,
        status: TicketStatus::Open,
        location: WorkLocation::Remote,
        client: "Acme".to_string(),
        issue: "Printer offline".to_string(),
        resolution: None,
        clickup_ticket: None,
        estate_or_building: Some("Block A".to_string()),
        cml_location: Some("Floor 2".to_string()),
        site_name: None,
        installers: Vec::new(),
        target_date: None,
        has_dependencies: false,
        dependency_name: None,
        site_files: Vec::new(),
        created_at,
        closed_at: None,
        response_time_minutes: None,
        total_time_minutes: Some(0),
        updates: Vec::new(),
        time_logs: Vec::new(),
    }
}

pub fn sample_profile(id: &str, name: &str) -> Profile {
    Profile {
        id: id.to_string(),
        full_name: name.to_string(),
        role: "technician".to_string(),
        is_admin: false,
        avatar_url: None,
    }
}

/// A valid remote Software ticket ready for [`crate::db::Database::create_ticket`].
pub fn new_ticket(user_id: &str) -> NewTicket {
    NewTicket {
        user_id: user_id.to_string(),
        ticket_type: TicketType::Software,
        location: WorkLocation::Remote,
        client: "Acme".to_string(),
        issue: "Outlook keeps crashing".to_string(),
        clickup_ticket: None,
        estate_or_building: Some("HQ".to_string()),
        cml_location: Some("Reception".to_string()),
        site_name: None,
        installers: Vec::new(),
        target_date: None,
        has_dependencies: false,
        dependency_name: None,
        created_by: Some("admin".to_string()),
    }
}

/// Read CSV text back with the `csv` crate, no header handling.
pub fn read_csv(text: &str) -> Vec<Vec<String>> {
    ::csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(text.as_bytes())
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}
