//! KPI report aggregation: filtering, summary statistics and the CSV export.
//!
//! Every function here takes the `now` of the pass it belongs to, so one
//! report never mixes clock readings.

use std::collections::HashMap;

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use serde::Serialize;

use crate::csv;
use crate::ledger;
use crate::models::{Profile, Ticket, TicketStatus, WorkLocation};

/// Column labels of the export. Downstream spreadsheets key on these, so
/// order and spelling are fixed.
pub const EXPORT_HEADERS: [&str; 19] = [
    "Ticket Number",
    "Team Member",
    "Client Name",
    "Type (Hardware/Software)",
    "Estate or Building",
    "Location (as per CML)",
    "Work Type (On-Site/Remote)",
    "ClickUp Ticket Reference",
    "Ticket Status",
    "Issue Description",
    "Resolution Description",
    "Has Dependencies (Yes/No)",
    "Dependency Company/Department",
    "Ticket Updates",
    "Total Time Tracked (Minutes)",
    "Time Log Details",
    "Response Time (Minutes)",
    "Date Created",
    "Date Closed",
];

/// en-ZA style local timestamp, e.g. `2024/05/01, 14:30:00`.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d, %H:%M:%S";

pub const UNKNOWN_MEMBER: &str = "Unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AssigneeFilter {
    #[default]
    All,
    Profile(String),
}

impl AssigneeFilter {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s == "all" {
            AssigneeFilter::All
        } else {
            AssigneeFilter::Profile(s.to_string())
        }
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        match self {
            AssigneeFilter::All => true,
            AssigneeFilter::Profile(id) => ticket.user_id == *id,
        }
    }
}

/// Which tickets a report covers. Day bounds are calendar days in `offset`,
/// the same offset the report renders its timestamps in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub assignee: AssigneeFilter,
    pub offset: FixedOffset,
}

impl Default for ExportFilter {
    fn default() -> Self {
        ExportFilter {
            date_from: None,
            date_to: None,
            assignee: AssigneeFilter::All,
            offset: Utc.fix(),
        }
    }
}

impl ExportFilter {
    /// The range the admin page opens with: the last `days` days up to today.
    pub fn last_days(today: NaiveDate, days: i64, assignee: AssigneeFilter) -> Self {
        ExportFilter {
            date_from: Some(today - Duration::days(days)),
            date_to: Some(today),
            assignee,
            ..Default::default()
        }
    }

    pub fn in_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn stages(&self) -> [FilterStage; 3] {
        [
            FilterStage::Assignee(self.assignee.clone()),
            FilterStage::From(self.date_from.and_then(|d| start_of_day(d, self.offset))),
            FilterStage::To(self.date_to.and_then(|d| end_of_day(d, self.offset))),
        ]
    }
}

/// One independent narrowing predicate of an [`ExportFilter`]. Date stages
/// carry their inclusive bound already resolved to an instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterStage {
    Assignee(AssigneeFilter),
    From(Option<DateTime<Utc>>),
    To(Option<DateTime<Utc>>),
}

impl FilterStage {
    pub fn keeps(&self, ticket: &Ticket) -> bool {
        match self {
            FilterStage::Assignee(assignee) => assignee.matches(ticket),
            FilterStage::From(None) | FilterStage::To(None) => true,
            FilterStage::From(Some(start)) => ticket.created_at >= *start,
            FilterStage::To(Some(end)) => ticket.created_at <= *end,
        }
    }
}

fn local_instant(local: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn start_of_day(date: NaiveDate, offset: FixedOffset) -> Option<DateTime<Utc>> {
    local_instant(date.and_time(NaiveTime::MIN), offset)
}

fn end_of_day(date: NaiveDate, offset: FixedOffset) -> Option<DateTime<Utc>> {
    date.and_hms_milli_opt(23, 59, 59, 999)
        .and_then(|dt| local_instant(dt, offset))
}

pub fn apply_stages<'a>(tickets: &[&'a Ticket], stages: &[FilterStage]) -> Vec<&'a Ticket> {
    tickets
        .iter()
        .copied()
        .filter(|t| stages.iter().all(|stage| stage.keeps(t)))
        .collect()
}

pub fn filter_tickets<'a>(tickets: &'a [Ticket], filter: &ExportFilter) -> Vec<&'a Ticket> {
    let all: Vec<&Ticket> = tickets.iter().collect();
    apply_stages(&all, &filter.stages())
}

/// The admin ticket list: assignee and status, `None` meaning any status.
pub fn list_filter<'a>(
    tickets: &'a [Ticket],
    assignee: &AssigneeFilter,
    status: Option<TicketStatus>,
) -> Vec<&'a Ticket> {
    tickets
        .iter()
        .filter(|t| assignee.matches(t))
        .filter(|t| status.map_or(true, |s| t.status == s))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub closed: usize,
    pub open: usize,
    /// Percentage with one decimal, or `"0"` for an empty set.
    pub closed_rate: String,
    /// Mean response time of closed tickets in whole minutes.
    pub avg_response_time: i64,
}

pub fn summarize(tickets: &[&Ticket]) -> Stats {
    let total = tickets.len();
    let closed: Vec<&&Ticket> = tickets
        .iter()
        .filter(|t| t.status == TicketStatus::Closed)
        .collect();
    let open = tickets
        .iter()
        .filter(|t| t.status == TicketStatus::Open)
        .count();

    let response_times: Vec<i64> = closed
        .iter()
        .filter_map(|t| t.response_time_minutes)
        .filter(|m| *m > 0)
        .collect();

    Stats {
        total,
        closed: closed.len(),
        open,
        closed_rate: closed_rate(closed.len(), total),
        avg_response_time: mean_half_even(&response_times),
    }
}

fn closed_rate(closed: usize, total: usize) -> String {
    if total == 0 {
        return "0".to_string();
    }
    // Tenths of a percent, rounded half-up in integer arithmetic.
    let (closed, total) = (closed as u64, total as u64);
    let tenths = (closed * 2000 + total) / (2 * total);
    format!("{}.{}", tenths / 10, tenths % 10)
}

/// Integer mean rounded half to even; 0 for no values.
fn mean_half_even(values: &[i64]) -> i64 {
    if values.is_empty() {
        return 0;
    }
    let n = values.len() as i64;
    let sum: i64 = values.iter().sum();
    let (q, r) = (sum / n, sum % n);
    match (2 * r).cmp(&n) {
        std::cmp::Ordering::Greater => q + 1,
        std::cmp::Ordering::Equal if q % 2 != 0 => q + 1,
        _ => q,
    }
}

pub fn total_time_tracked(tickets: &[&Ticket], now: DateTime<Utc>) -> i64 {
    tickets
        .iter()
        .map(|t| ledger::compute_elapsed(t, now).total_minutes)
        .sum()
}

pub fn local_timestamp(ts: DateTime<Utc>, offset: FixedOffset) -> String {
    ts.with_timezone(&offset).format(TIMESTAMP_FORMAT).to_string()
}

fn format_updates(ticket: &Ticket, offset: FixedOffset) -> String {
    ticket
        .updates
        .iter()
        .map(|u| format!("[{}] {}", local_timestamp(u.timestamp, offset), u.text))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn format_time_logs(ticket: &Ticket, offset: FixedOffset) -> String {
    ticket
        .time_logs
        .iter()
        .map(|log| {
            let by = log
                .logged_by
                .as_deref()
                .map(|b| format!(" ({})", b))
                .unwrap_or_default();
            format!(
                "[{}] {}min - {}{}",
                local_timestamp(log.timestamp, offset),
                log.minutes,
                log.description,
                by
            )
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// One unescaped row per ticket, in [`EXPORT_HEADERS`] order.
pub fn render_report(
    tickets: &[&Ticket],
    profiles: &[Profile],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Vec<Vec<String>> {
    let names: HashMap<&str, &str> = profiles
        .iter()
        .map(|p| (p.id.as_str(), p.full_name.as_str()))
        .collect();

    tickets
        .iter()
        .map(|t| {
            let member = names.get(t.user_id.as_str()).copied().unwrap_or(UNKNOWN_MEMBER);
            let response = match t.response_time_minutes {
                Some(m) if m > 0 => m.to_string(),
                _ => String::new(),
            };
            vec![
                t.ticket_number.to_string(),
                member.to_string(),
                t.client.clone(),
                t.ticket_type.as_str().to_string(),
                t.estate_or_building.clone().unwrap_or_default(),
                t.cml_location.clone().unwrap_or_default(),
                t.location.label().to_string(),
                t.clickup_ticket.clone().unwrap_or_default(),
                t.status.label().to_string(),
                t.issue.clone(),
                t.resolution.clone().unwrap_or_default(),
                if t.has_dependencies { "Yes" } else { "No" }.to_string(),
                t.dependency_name.clone().unwrap_or_default(),
                format_updates(t, offset),
                ledger::compute_elapsed(t, now).total_minutes.to_string(),
                format_time_logs(t, offset),
                response,
                local_timestamp(t.created_at, offset),
                t.closed_at
                    .map(|c| local_timestamp(c, offset))
                    .unwrap_or_default(),
            ]
        })
        .collect()
}

pub fn export_file_name(filter: &ExportFilter) -> String {
    let bound = |d: Option<NaiveDate>| {
        d.map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "all".to_string())
    };
    format!(
        "kpi-report-{}-to-{}.csv",
        bound(filter.date_from),
        bound(filter.date_to)
    )
}

/// Everything one export pass produces.
#[derive(Debug, Clone)]
pub struct Export {
    pub file_name: String,
    pub stats: Stats,
    pub total_time_minutes: i64,
    pub rows: Vec<Vec<String>>,
}

impl Export {
    pub fn to_csv(&self) -> String {
        csv::to_csv(&EXPORT_HEADERS, &self.rows)
    }
}

pub fn build_export(
    tickets: &[Ticket],
    profiles: &[Profile],
    filter: &ExportFilter,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Export {
    let selected = filter_tickets(tickets, filter);
    Export {
        file_name: export_file_name(filter),
        stats: summarize(&selected),
        total_time_minutes: total_time_tracked(&selected, now),
        rows: render_report(&selected, profiles, now, offset),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberCounts {
    pub profile_id: String,
    pub name: String,
    pub open: usize,
    pub closed: usize,
}

/// Dashboard counters over the whole collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub open: usize,
    pub closed: usize,
    pub on_site: usize,
    pub remote: usize,
    pub members: Vec<MemberCounts>,
}

fn count_where(tickets: &[Ticket], pred: impl Fn(&Ticket) -> bool) -> usize {
    tickets.iter().filter(|t| pred(t)).count()
}

pub fn overview(tickets: &[Ticket], profiles: &[Profile]) -> Overview {
    let mut members: Vec<MemberCounts> = profiles
        .iter()
        .map(|p| {
            let mine = tickets.iter().filter(|t| t.user_id == p.id);
            let (open, closed) = mine.fold((0, 0), |(o, c), t| match t.status {
                TicketStatus::Open => (o + 1, c),
                TicketStatus::Closed => (o, c + 1),
            });
            MemberCounts {
                profile_id: p.id.clone(),
                name: p.full_name.clone(),
                open,
                closed,
            }
        })
        .collect();
    members.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.profile_id.cmp(&b.profile_id)));

    Overview {
        open: count_where(tickets, |t| t.status == TicketStatus::Open),
        closed: count_where(tickets, |t| t.status == TicketStatus::Closed),
        on_site: count_where(tickets, |t| t.location == WorkLocation::OnSite),
        remote: count_where(tickets, |t| t.location == WorkLocation::Remote),
        members,
    }
}
