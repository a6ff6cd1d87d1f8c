#![no_main]

//! Fuzz target for the KPI export.
//!
//! Free-text ticket fields are fed through the report renderer and the CSV
//! writer. Every record must read back as exactly the fields that went in,
//! whatever quotes, commas or line breaks the text contains.

use arbitrary::Arbitrary;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use libfuzzer_sys::fuzz_target;

use deskledger::csv as csv_out;
use deskledger::models::{Ticket, TicketStatus, TicketType, TicketUpdate, TimeLog, WorkLocation};
use deskledger::report::{self, EXPORT_HEADERS};

#[derive(Arbitrary, Debug)]
struct ExportInput {
    client: String,
    issue: String,
    resolution: Option<String>,
    dependency_name: Option<String>,
    updates: Vec<(String, u16)>,
    log_minutes: Vec<u16>,
    offset_minutes: i16,
}

/// Read the export back with the `csv` crate.
fn read_records(input: &str) -> Vec<Vec<String>> {
    ::csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(input.as_bytes())
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

fuzz_target!(|input: ExportInput| {
    let created: DateTime<Utc> = DateTime::from_timestamp(1_714_550_400, 0).unwrap();
    let offset = FixedOffset::east_opt(i32::from(input.offset_minutes % 840) * 60).unwrap();

    let mut at = created;
    let updates: Vec<TicketUpdate> = input
        .updates
        .iter()
        .take(16)
        .map(|(text, gap)| {
            at += Duration::minutes(i64::from(*gap));
            TicketUpdate {
                text: text.clone(),
                timestamp: at,
            }
        })
        .collect();
    let time_logs: Vec<TimeLog> = input
        .log_minutes
        .iter()
        .take(16)
        .map(|m| TimeLog {
            minutes: i64::from(*m),
            description: input.issue.clone(),
            timestamp: created,
            logged_by: None,
            opening: false,
        })
        .collect();

    let ticket = Ticket {
        id: 1,
        ticket_number: 1,
        user_id: "tech-1".to_string(),
        ticket_type: TicketType::Software,
        status: TicketStatus::Open,
        location: WorkLocation::Remote,
        client: input.client.clone(),
        issue: input.issue.clone(),
        resolution: input.resolution.clone(),
        clickup_ticket: None,
        estate_or_building: None,
        cml_location: None,
        site_name: None,
        installers: Vec::new(),
        target_date: None,
        has_dependencies: input.dependency_name.is_some(),
        dependency_name: input.dependency_name.clone(),
        site_files: Vec::new(),
        created_at: created,
        closed_at: None,
        response_time_minutes: None,
        total_time_minutes: Some(time_logs.iter().map(|l| l.minutes).sum()),
        updates,
        time_logs,
    };

    let now = at + Duration::minutes(90);
    let rows = report::render_report(&[&ticket], &[], now, offset);
    let text = csv_out::to_csv(&EXPORT_HEADERS, &rows);

    let records = read_records(&text);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].len(), EXPORT_HEADERS.len());
    assert_eq!(records[1], rows[0]);
    assert_eq!(records[1][2], input.client);
    assert_eq!(records[1][9], input.issue);
});
