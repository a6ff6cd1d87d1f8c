use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

use crate::db::{Database, NewTicket};
use crate::models::TicketType;

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trim every text field and check the fields each ticket type requires.
pub fn validate(mut new: NewTicket) -> Result<NewTicket> {
    new.user_id = new.user_id.trim().to_string();
    new.client = new.client.trim().to_string();
    new.issue = new.issue.trim().to_string();
    new.clickup_ticket = trimmed(new.clickup_ticket);
    new.estate_or_building = trimmed(new.estate_or_building);
    new.cml_location = trimmed(new.cml_location);
    new.site_name = trimmed(new.site_name);
    new.dependency_name = trimmed(new.dependency_name);
    new.installers = new
        .installers
        .into_iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect();

    if new.user_id.is_empty() {
        bail!("An assignee is required");
    }
    if new.client.is_empty() {
        bail!("Client name is required");
    }
    if new.issue.is_empty() {
        bail!("Issue description is required");
    }

    match new.ticket_type {
        TicketType::NewSite => {
            if new.site_name.is_none() {
                bail!("New Site tickets need a site name");
            }
        }
        TicketType::Hardware | TicketType::Software => {
            if new.estate_or_building.is_none() || new.cml_location.is_none() {
                bail!(
                    "{} tickets need an estate/building and a CML location",
                    new.ticket_type.as_str()
                );
            }
        }
    }

    if new.dependency_name.is_some() {
        new.has_dependencies = true;
    }

    Ok(new)
}

pub fn run(db: &Database, new: NewTicket, now: DateTime<Utc>) -> Result<()> {
    let new = validate(new)?;

    let assignee = match db.get_profile(&new.user_id)? {
        Some(p) => p,
        None => bail!("Profile '{}' not found", new.user_id),
    };

    let id = db.create_ticket(&new, now)?;
    let number = match db.get_ticket(id)? {
        Some(t) => t.ticket_number,
        None => bail!("Ticket id {} vanished after insert", id),
    };
    println!("Created ticket #{} for {}", number, assignee.full_name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, new_ticket, sample_profile};
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn setup_test_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(&db_path).unwrap();
        db.create_profile(&sample_profile("tech-1", "Thandi")).unwrap();
        (db, dir)
    }

    // ==================== Unit Tests ====================

    #[test]
    fn test_create_ticket() {
        let (db, _dir) = setup_test_db();
        let now = at("2024-05-01T08:00:00Z");
        run(&db, new_ticket("tech-1"), now).unwrap();

        let tickets = db.list_tickets().unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].user_id, "tech-1");
        assert_eq!(tickets[0].created_at, now);
    }

    #[test]
    fn test_unknown_assignee_fails() {
        let (db, _dir) = setup_test_db();
        let now = at("2024-05-01T08:00:00Z");
        let err = run(&db, new_ticket("ghost"), now).unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(db.list_tickets().unwrap().is_empty());
    }

    #[test]
    fn test_regular_ticket_needs_location_fields() {
        let mut new = new_ticket("tech-1");
        new.cml_location = Some("   ".to_string());
        let err = validate(new).unwrap_err();
        assert!(err.to_string().contains("CML location"));
    }

    #[test]
    fn test_new_site_needs_site_name() {
        let mut new = new_ticket("tech-1");
        new.ticket_type = TicketType::NewSite;
        new.estate_or_building = None;
        new.cml_location = None;
        assert!(validate(new.clone()).is_err());

        new.site_name = Some("Sandton branch".to_string());
        new.installers = vec![" Lwazi ".to_string(), "".to_string()];
        let ok = validate(new).unwrap();
        assert_eq!(ok.installers, vec!["Lwazi"]);
    }

    #[test]
    fn test_dependency_name_sets_flag() {
        let mut new = new_ticket("tech-1");
        new.dependency_name = Some("Telkom".to_string());
        assert!(validate(new).unwrap().has_dependencies);
    }

    #[test]
    fn test_blank_client_rejected() {
        let mut new = new_ticket("tech-1");
        new.client = "  ".to_string();
        assert!(validate(new).is_err());
    }

    // ==================== Property-Based Tests ====================

    proptest! {
        #[test]
        fn prop_validate_trims(client in "[a-zA-Z]{1,20}", pad in " {0,3}") {
            let mut new = new_ticket("tech-1");
            new.client = format!("{}{}{}", pad, client, pad);
            let ok = validate(new).unwrap();
            prop_assert_eq!(ok.client, client);
        }
    }
}
