use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketType {
    Hardware,
    Software,
    #[serde(rename = "New Site")]
    NewSite,
}

impl TicketType {
    pub const VALID: [&'static str; 3] = ["Hardware", "Software", "New Site"];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketType::Hardware => "Hardware",
            TicketType::Software => "Software",
            TicketType::NewSite => "New Site",
        }
    }

    /// Accepts the stored names case-insensitively, plus `new-site`.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hardware" => Ok(TicketType::Hardware),
            "software" => Ok(TicketType::Software),
            "new site" | "new-site" | "newsite" => Ok(TicketType::NewSite),
            _ => bail!(
                "Invalid ticket type '{}'. Must be one of: {}",
                s,
                Self::VALID.join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Closed => "closed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TicketStatus::Open => "Open",
            TicketStatus::Closed => "Closed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(TicketStatus::Open),
            "closed" => Ok(TicketStatus::Closed),
            _ => bail!("Invalid status '{}'. Must be one of: open, closed", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkLocation {
    #[serde(rename = "on-site")]
    OnSite,
    #[serde(rename = "remote")]
    Remote,
}

impl WorkLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkLocation::OnSite => "on-site",
            WorkLocation::Remote => "remote",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WorkLocation::OnSite => "On-Site",
            WorkLocation::Remote => "Remote",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "on-site" | "onsite" => Ok(WorkLocation::OnSite),
            "remote" => Ok(WorkLocation::Remote),
            _ => bail!("Invalid location '{}'. Must be one of: on-site, remote", s),
        }
    }
}

/// Dumps from the hosted backend write `null` for empty columns; read that
/// the same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketUpdate {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// One entry of a ticket's append-only time ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeLog {
    pub minutes: i64,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logged_by: Option<String>,
    /// Set on the synthetic entry written when the ticket is created.
    #[serde(default)]
    pub opening: bool,
}

/// Reference to an auxiliary file for a New Site ticket. The label is
/// mandatory; the file itself lives in external storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteFile {
    pub name: String,
    pub location: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub full_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_admin: bool,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub ticket_number: i64,
    pub user_id: String,
    pub ticket_type: TicketType,
    pub status: TicketStatus,
    pub location: WorkLocation,
    #[serde(default, deserialize_with = "null_as_default")]
    pub client: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issue: String,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub clickup_ticket: Option<String>,
    #[serde(default)]
    pub estate_or_building: Option<String>,
    #[serde(default)]
    pub cml_location: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub installers: Vec<String>,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub has_dependencies: bool,
    #[serde(default)]
    pub dependency_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub site_files: Vec<SiteFile>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub response_time_minutes: Option<i64>,
    #[serde(default)]
    pub total_time_minutes: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub updates: Vec<TicketUpdate>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub time_logs: Vec<TimeLog>,
}

impl Ticket {
    pub fn is_open(&self) -> bool {
        self.status == TicketStatus::Open
    }
}

/// One fetch of both collections from the backing store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub tickets: Vec<Ticket>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_type_serde_names() {
        let json = serde_json::to_string(&TicketType::NewSite).unwrap();
        assert_eq!(json, "\"New Site\"");
        let parsed: TicketType = serde_json::from_str("\"Hardware\"").unwrap();
        assert_eq!(parsed, TicketType::Hardware);
    }

    #[test]
    fn test_ticket_type_parse() {
        assert_eq!(TicketType::parse("software").unwrap(), TicketType::Software);
        assert_eq!(TicketType::parse("New Site").unwrap(), TicketType::NewSite);
        assert_eq!(TicketType::parse("new-site").unwrap(), TicketType::NewSite);
        let err = TicketType::parse("firmware").unwrap_err().to_string();
        assert!(err.contains("Invalid ticket type"));
    }

    #[test]
    fn test_location_labels() {
        assert_eq!(WorkLocation::parse("on-site").unwrap().label(), "On-Site");
        assert_eq!(WorkLocation::parse("REMOTE").unwrap().label(), "Remote");
        assert!(WorkLocation::parse("hybrid").is_err());
    }

    #[test]
    fn test_status_parse_is_exact() {
        assert_eq!(TicketStatus::parse("open").unwrap(), TicketStatus::Open);
        assert!(TicketStatus::parse("Open").is_err());
    }

    #[test]
    fn test_time_log_opening_defaults_false() {
        let log: TimeLog = serde_json::from_str(
            r#"{"minutes":0,"description":"Ticket opened","timestamp":"2024-01-01T08:00:00Z"}"#,
        )
        .unwrap();
        assert!(!log.opening);
        assert!(log.logged_by.is_none());
    }

    #[test]
    fn test_ticket_deserializes_with_missing_optionals() {
        let json = r#"{
            "id": 7,
            "ticket_number": 12,
            "user_id": "tech-1",
            "ticket_type": "Software",
            "status": "open",
            "location": "remote",
            "created_at": "2024-03-01T09:00:00Z"
        }"#;
        let ticket: Ticket = serde_json::from_str(json).unwrap();
        assert!(ticket.is_open());
        assert!(ticket.updates.is_empty());
        assert!(ticket.time_logs.is_empty());
        assert_eq!(ticket.total_time_minutes, None);
    }
}
