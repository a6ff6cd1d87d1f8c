use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::ledger;
use crate::models::{
    Profile, SiteFile, Snapshot, Ticket, TicketStatus, TicketType, TicketUpdate, TimeLog,
    WorkLocation,
};

const SCHEMA_VERSION: i32 = 1;

const TICKET_COLUMNS: &str = "id, ticket_number, user_id, ticket_type, status, location, client, issue, resolution, clickup_ticket, estate_or_building, cml_location, site_name, installers, target_date, has_dependencies, dependency_name, site_files, created_at, closed_at, response_time_minutes, total_time_minutes, updates, time_logs";

/// Fields supplied when a ticket is raised.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub user_id: String,
    pub ticket_type: TicketType,
    pub location: WorkLocation,
    pub client: String,
    pub issue: String,
    pub clickup_ticket: Option<String>,
    pub estate_or_building: Option<String>,
    pub cml_location: Option<String>,
    pub site_name: Option<String>,
    pub installers: Vec<String>,
    pub target_date: Option<NaiveDate>,
    pub has_dependencies: bool,
    pub dependency_name: Option<String>,
    pub created_by: Option<String>,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open database")?;
        let db = Database { conn };
        db.init_schema()?;
        debug!(path = %path.display(), "opened ticket store");
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap_or(0);

        if version < SCHEMA_VERSION {
            self.conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS profiles (
                    id TEXT PRIMARY KEY,
                    full_name TEXT NOT NULL,
                    role TEXT NOT NULL DEFAULT '',
                    is_admin INTEGER NOT NULL DEFAULT 0,
                    avatar_url TEXT
                );

                -- Ledger and business fields; list-valued columns hold JSON
                CREATE TABLE IF NOT EXISTS tickets (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    ticket_number INTEGER NOT NULL UNIQUE,
                    user_id TEXT NOT NULL,
                    ticket_type TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'open',
                    location TEXT NOT NULL,
                    client TEXT NOT NULL DEFAULT '',
                    issue TEXT NOT NULL DEFAULT '',
                    resolution TEXT,
                    clickup_ticket TEXT,
                    estate_or_building TEXT,
                    cml_location TEXT,
                    site_name TEXT,
                    installers TEXT NOT NULL DEFAULT '[]',
                    target_date TEXT,
                    has_dependencies INTEGER NOT NULL DEFAULT 0,
                    dependency_name TEXT,
                    site_files TEXT NOT NULL DEFAULT '[]',
                    created_at TEXT NOT NULL,
                    closed_at TEXT,
                    response_time_minutes INTEGER,
                    total_time_minutes INTEGER,
                    updates TEXT NOT NULL DEFAULT '[]',
                    time_logs TEXT NOT NULL DEFAULT '[]'
                );

                CREATE INDEX IF NOT EXISTS idx_tickets_user ON tickets(user_id);
                CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);
                CREATE INDEX IF NOT EXISTS idx_tickets_created ON tickets(created_at);
                "#,
            )?;

            self.conn
                .execute(&format!("PRAGMA user_version = {}", SCHEMA_VERSION), [])?;
        }

        Ok(())
    }

    // Profiles
    pub fn create_profile(&self, profile: &Profile) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO profiles (id, full_name, role, is_admin, avatar_url) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    profile.id,
                    profile.full_name,
                    profile.role,
                    profile.is_admin,
                    profile.avatar_url
                ],
            )
            .with_context(|| format!("Failed to create profile '{}'", profile.id))?;
        info!(profile = %profile.id, "created profile");
        Ok(())
    }

    fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO profiles (id, full_name, role, is_admin, avatar_url) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                profile.id,
                profile.full_name,
                profile.role,
                profile.is_admin,
                profile.avatar_url
            ],
        )?;
        Ok(())
    }

    pub fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT id, full_name, role, is_admin, avatar_url FROM profiles WHERE id = ?1",
                [id],
                profile_from_row,
            )
            .optional()?;
        Ok(profile)
    }

    pub fn list_profiles(&self) -> Result<Vec<Profile>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, full_name, role, is_admin, avatar_url FROM profiles ORDER BY full_name, id",
        )?;
        let profiles = stmt
            .query_map([], profile_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(profiles)
    }

    // Tickets
    pub fn create_ticket(&self, new: &NewTicket, now: DateTime<Utc>) -> Result<i64> {
        let ticket_number: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(ticket_number), 0) + 1 FROM tickets",
            [],
            |row| row.get(0),
        )?;

        let opening = ledger::opening_entry(now, new.created_by.as_deref());
        let updates: Vec<TicketUpdate> = Vec::new();
        let site_files: Vec<SiteFile> = Vec::new();

        self.conn.execute(
            "INSERT INTO tickets (ticket_number, user_id, ticket_type, status, location, client, issue, clickup_ticket, estate_or_building, cml_location, site_name, installers, target_date, has_dependencies, dependency_name, site_files, created_at, total_time_minutes, updates, time_logs) VALUES (?1, ?2, ?3, 'open', ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, 0, ?17, ?18)",
            params![
                ticket_number,
                new.user_id,
                new.ticket_type.as_str(),
                new.location.as_str(),
                new.client,
                new.issue,
                new.clickup_ticket,
                new.estate_or_building,
                new.cml_location,
                new.site_name,
                to_json(&new.installers)?,
                new.target_date.map(|d| d.format("%Y-%m-%d").to_string()),
                new.has_dependencies,
                new.dependency_name,
                to_json(&site_files)?,
                now.to_rfc3339(),
                to_json(&updates)?,
                to_json(&vec![opening])?,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(id, ticket_number, assignee = %new.user_id, "created ticket");
        Ok(id)
    }

    pub fn get_ticket(&self, id: i64) -> Result<Option<Ticket>> {
        let sql = format!("SELECT {} FROM tickets WHERE id = ?1", TICKET_COLUMNS);
        let ticket = self
            .conn
            .query_row(&sql, [id], ticket_from_row)
            .optional()?;
        Ok(ticket)
    }

    /// Row id of the ticket shown to users as `#number`.
    pub fn ticket_id(&self, number: i64) -> Result<i64> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM tickets WHERE ticket_number = ?1",
                [number],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(id) => Ok(id),
            None => bail!("Ticket #{} not found", number),
        }
    }

    pub fn list_tickets(&self) -> Result<Vec<Ticket>> {
        let sql = format!("SELECT {} FROM tickets ORDER BY ticket_number", TICKET_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let tickets = stmt
            .query_map([], ticket_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tickets)
    }

    pub fn delete_ticket(&self, id: i64) -> Result<bool> {
        let rows = self.conn.execute("DELETE FROM tickets WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    fn require_open(&self, id: i64) -> Result<Ticket> {
        let ticket = match self.get_ticket(id)? {
            Some(t) => t,
            None => bail!("Ticket id {} not found", id),
        };
        if !ticket.is_open() {
            bail!("Ticket #{} is closed", ticket.ticket_number);
        }
        Ok(ticket)
    }

    // Ledger events
    /// Post an update, first persisting the minutes accrued since the
    /// previous event. Returns the committed entry.
    pub fn add_update(
        &self,
        id: i64,
        text: &str,
        logged_by: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<TimeLog> {
        let mut ticket = self.require_open(id)?;
        let entry = ledger::commit_entry(&ticket, now, &format!("Update: {}", text), logged_by);
        append_entry(&mut ticket, entry.clone());
        ticket.updates.push(TicketUpdate {
            text: text.to_string(),
            timestamp: now,
        });
        self.save_ticket(&ticket)?;
        info!(id, minutes = entry.minutes, "posted update");
        Ok(entry)
    }

    /// Record manually reported work. Does not move the live anchor.
    pub fn log_time(
        &self,
        id: i64,
        minutes: i64,
        description: &str,
        logged_by: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<TimeLog> {
        if minutes < 0 {
            bail!("Minutes must not be negative (got {})", minutes);
        }
        let mut ticket = self.require_open(id)?;
        let entry = TimeLog {
            minutes,
            description: description.to_string(),
            timestamp: now,
            logged_by: logged_by.map(str::to_string),
            opening: false,
        };
        append_entry(&mut ticket, entry.clone());
        self.save_ticket(&ticket)?;
        info!(id, minutes, "logged time");
        Ok(entry)
    }

    /// Close a ticket, persisting the final live gap. Returns the closed
    /// ticket.
    pub fn close_ticket(
        &self,
        id: i64,
        resolution: &str,
        response_time_minutes: Option<i64>,
        logged_by: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Ticket> {
        if let Some(m) = response_time_minutes {
            if m < 0 {
                bail!("Response time must not be negative (got {})", m);
            }
        }
        let mut ticket = self.require_open(id)?;
        let entry = ledger::commit_entry(&ticket, now, ledger::CLOSING_DESCRIPTION, logged_by);
        append_entry(&mut ticket, entry);
        ticket.status = TicketStatus::Closed;
        ticket.closed_at = Some(now);
        ticket.resolution = Some(resolution.to_string());
        ticket.response_time_minutes = response_time_minutes;
        self.save_ticket(&ticket)?;
        info!(id, total = ?ticket.total_time_minutes, "closed ticket");
        Ok(ticket)
    }

    pub fn attach_site_file(&self, id: i64, file: SiteFile) -> Result<()> {
        if file.label.trim().is_empty() {
            bail!("Site file '{}' needs a label", file.name);
        }
        let mut ticket = match self.get_ticket(id)? {
            Some(t) => t,
            None => bail!("Ticket id {} not found", id),
        };
        if ticket.ticket_type != TicketType::NewSite {
            warn!(id, "attaching a site file to a non New Site ticket");
        }
        ticket.site_files.push(file);
        self.save_ticket(&ticket)
    }

    fn save_ticket(&self, ticket: &Ticket) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE tickets SET status = ?1, resolution = ?2, closed_at = ?3, response_time_minutes = ?4, total_time_minutes = ?5, updates = ?6, time_logs = ?7, site_files = ?8 WHERE id = ?9",
            params![
                ticket.status.as_str(),
                ticket.resolution,
                ticket.closed_at.map(|dt| dt.to_rfc3339()),
                ticket.response_time_minutes,
                ticket.total_time_minutes,
                to_json(&ticket.updates)?,
                to_json(&ticket.time_logs)?,
                to_json(&ticket.site_files)?,
                ticket.id,
            ],
        )?;
        if rows == 0 {
            bail!("Ticket id {} not found", ticket.id);
        }
        Ok(())
    }

    /// Insert or update by `id`. A ticket number held by a different row is
    /// an error, never a replacement.
    fn insert_ticket(&self, t: &Ticket) -> Result<()> {
        let holder: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM tickets WHERE ticket_number = ?1 AND id != ?2",
                params![t.ticket_number, t.id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(other) = holder {
            bail!(
                "Ticket number #{} already belongs to ticket id {}",
                t.ticket_number,
                other
            );
        }

        let updates = TICKET_COLUMNS
            .split(", ")
            .filter(|col| *col != "id")
            .map(|col| format!("{col} = excluded.{col}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO tickets ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24) ON CONFLICT(id) DO UPDATE SET {}",
            TICKET_COLUMNS, updates
        );
        self.conn.execute(
            &sql,
            params![
                t.id,
                t.ticket_number,
                t.user_id,
                t.ticket_type.as_str(),
                t.status.as_str(),
                t.location.as_str(),
                t.client,
                t.issue,
                t.resolution,
                t.clickup_ticket,
                t.estate_or_building,
                t.cml_location,
                t.site_name,
                to_json(&t.installers)?,
                t.target_date.map(|d| d.format("%Y-%m-%d").to_string()),
                t.has_dependencies,
                t.dependency_name,
                to_json(&t.site_files)?,
                t.created_at.to_rfc3339(),
                t.closed_at.map(|dt| dt.to_rfc3339()),
                t.response_time_minutes,
                t.total_time_minutes,
                to_json(&t.updates)?,
                to_json(&t.time_logs)?,
            ],
        )?;
        Ok(())
    }

    /// Load a dump of both collections. Existing rows with the same id are
    /// updated in place; on any failure nothing is written. Returns
    /// (profiles, tickets) written.
    pub fn import_snapshot(&self, snapshot: &Snapshot) -> Result<(usize, usize)> {
        let tx = self.conn.unchecked_transaction()?;
        for profile in &snapshot.profiles {
            self.upsert_profile(profile)?;
        }
        for ticket in &snapshot.tickets {
            self.insert_ticket(ticket)
                .with_context(|| format!("Failed to import ticket #{}", ticket.ticket_number))?;
        }
        tx.commit()?;
        info!(
            profiles = snapshot.profiles.len(),
            tickets = snapshot.tickets.len(),
            "imported snapshot"
        );
        Ok((snapshot.profiles.len(), snapshot.tickets.len()))
    }

    /// Both collections, read once for a report pass.
    pub fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            profiles: self.list_profiles()?,
            tickets: self.list_tickets()?,
        })
    }
}

fn append_entry(ticket: &mut Ticket, entry: TimeLog) {
    let total = ticket.total_time_minutes.unwrap_or(0).max(0);
    ticket.total_time_minutes = Some(total.saturating_add(entry.minutes));
    ticket.time_logs.push(entry);
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).context("Failed to encode column")
}

fn json_col<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Enum columns store the serde name as plain text.
fn enum_col<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_value(serde_json::Value::String(raw))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn profile_from_row(row: &Row) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        full_name: row.get(1)?,
        role: row.get(2)?,
        is_admin: row.get(3)?,
        avatar_url: row.get(4)?,
    })
}

fn ticket_from_row(row: &Row) -> rusqlite::Result<Ticket> {
    Ok(Ticket {
        id: row.get(0)?,
        ticket_number: row.get(1)?,
        user_id: row.get(2)?,
        ticket_type: enum_col(row, 3)?,
        status: enum_col(row, 4)?,
        location: enum_col(row, 5)?,
        client: row.get(6)?,
        issue: row.get(7)?,
        resolution: row.get(8)?,
        clickup_ticket: row.get(9)?,
        estate_or_building: row.get(10)?,
        cml_location: row.get(11)?,
        site_name: row.get(12)?,
        installers: json_col(row, 13)?,
        target_date: row
            .get::<_, Option<String>>(14)?
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        has_dependencies: row.get(15)?,
        dependency_name: row.get(16)?,
        site_files: json_col(row, 17)?,
        created_at: parse_datetime(row.get::<_, String>(18)?),
        closed_at: row.get::<_, Option<String>>(19)?.map(parse_datetime),
        response_time_minutes: row.get(20)?,
        total_time_minutes: row.get(21)?,
        updates: json_col(row, 22)?,
        time_logs: json_col(row, 23)?,
    })
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            warn!(value = %s, "unparseable timestamp in store, using the epoch");
            DateTime::UNIX_EPOCH
        })
}
