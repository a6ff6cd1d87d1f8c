//! Elapsed-time ledger for tickets.
//!
//! Stored minutes only ever come from explicit events (an update, a manual
//! log, closing the ticket). Everything accrued since the last event is a
//! projection of `(ticket, now)` and is recomputed on every read.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::trace;

use crate::models::{Ticket, TimeLog};

/// Description of the synthetic entry written when a ticket is created.
pub const OPENING_DESCRIPTION: &str = "Ticket opened";
pub const CLOSING_DESCRIPTION: &str = "Ticket closed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Elapsed {
    pub logged_minutes: i64,
    pub live_minutes: i64,
    pub total_minutes: i64,
    pub display: String,
}

/// A time-log entry as it should be displayed at a given instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub minutes: i64,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub logged_by: Option<String>,
    pub live: bool,
}

/// Whole minutes from `from` to `to`, rounded half-up. Never negative.
pub fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    let ms = to.signed_duration_since(from).num_milliseconds();
    if ms <= 0 {
        if ms < 0 {
            trace!(skew_ms = ms, "clamping negative elapsed time to zero");
        }
        return 0;
    }
    ms.saturating_add(30_000) / 60_000
}

pub fn format_duration(minutes: i64) -> String {
    let minutes = minutes.max(0);
    format!("{}h {}m", minutes / 60, minutes % 60)
}

/// The instant live accrual is measured from: the last update, or creation.
pub fn anchor(ticket: &Ticket) -> DateTime<Utc> {
    ticket
        .updates
        .last()
        .map(|u| u.timestamp)
        .unwrap_or(ticket.created_at)
}

pub fn compute_elapsed(ticket: &Ticket, now: DateTime<Utc>) -> Elapsed {
    let logged_minutes = ticket.total_time_minutes.unwrap_or(0).max(0);
    let live_minutes = if ticket.is_open() {
        minutes_between(anchor(ticket), now)
    } else {
        0
    };
    let total_minutes = logged_minutes.saturating_add(live_minutes);

    Elapsed {
        logged_minutes,
        live_minutes,
        total_minutes,
        display: format_duration(total_minutes),
    }
}

/// True for the synthetic zero-minute entry at the head of the ledger.
///
/// Entries written by this crate carry the `opening` marker; entries from
/// older dumps are recognised by their description.
pub fn is_opening_entry(index: usize, log: &TimeLog) -> bool {
    index == 0 && log.minutes == 0 && (log.opening || log.description == OPENING_DESCRIPTION)
}

/// Display lines for every entry, with the opening entry showing time since
/// creation while the ticket is still open.
pub fn annotate_time_logs(ticket: &Ticket, now: DateTime<Utc>) -> Vec<LogLine> {
    ticket
        .time_logs
        .iter()
        .enumerate()
        .map(|(idx, log)| {
            let live = ticket.is_open() && is_opening_entry(idx, log);
            let minutes = if live {
                minutes_between(ticket.created_at, now)
            } else {
                log.minutes
            };
            LogLine {
                minutes,
                description: log.description.clone(),
                timestamp: log.timestamp,
                logged_by: log.logged_by.clone(),
                live,
            }
        })
        .collect()
}

/// Minutes accrued since the last update on an open ticket, if any.
pub fn tracking_tail(ticket: &Ticket, now: DateTime<Utc>) -> Option<i64> {
    if !ticket.is_open() {
        return None;
    }
    let last = ticket.updates.last()?;
    let minutes = minutes_between(last.timestamp, now);
    (minutes > 0).then_some(minutes)
}

pub fn opening_entry(created_at: DateTime<Utc>, logged_by: Option<&str>) -> TimeLog {
    TimeLog {
        minutes: 0,
        description: OPENING_DESCRIPTION.to_string(),
        timestamp: created_at,
        logged_by: logged_by.map(str::to_string),
        opening: true,
    }
}

/// The entry that persists the live gap at an explicit event.
pub fn commit_entry(
    ticket: &Ticket,
    now: DateTime<Utc>,
    description: &str,
    logged_by: Option<&str>,
) -> TimeLog {
    TimeLog {
        minutes: compute_elapsed(ticket, now).live_minutes,
        description: description.to_string(),
        timestamp: now,
        logged_by: logged_by.map(str::to_string),
        opening: false,
    }
}
