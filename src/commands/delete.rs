use anyhow::{bail, Result};
use std::io::{self, Write};

use crate::db::Database;

pub fn run(db: &Database, number: i64, force: bool) -> Result<()> {
    let id = db.ticket_id(number)?;
    let ticket = match db.get_ticket(id)? {
        Some(t) => t,
        None => bail!("Ticket #{} not found", number),
    };

    if !force {
        print!(
            "Delete ticket #{} ({}: {})? This cannot be undone. [y/N] ",
            ticket.ticket_number,
            ticket.client,
            ticket.ticket_type.as_str()
        );
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    if db.delete_ticket(id)? {
        println!("Deleted ticket #{}", number);
    } else {
        bail!("Failed to delete ticket #{}", number);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, new_ticket};
    use tempfile::tempdir;

    fn setup_test_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(&db_path).unwrap();
        (db, dir)
    }

    #[test]
    fn test_delete_existing_ticket_force() {
        let (db, _dir) = setup_test_db();
        let id = db
            .create_ticket(&new_ticket("tech-1"), at("2024-05-01T08:00:00Z"))
            .unwrap();

        run(&db, id, true).unwrap();
        assert!(db.get_ticket(id).unwrap().is_none());
    }

    #[test]
    fn test_delete_nonexistent_ticket() {
        let (db, _dir) = setup_test_db();
        let err = run(&db, 99999, true).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_delete_leaves_other_tickets() {
        let (db, _dir) = setup_test_db();
        let now = at("2024-05-01T08:00:00Z");
        let keep = db.create_ticket(&new_ticket("tech-1"), now).unwrap();
        let drop_id = db.create_ticket(&new_ticket("tech-1"), now).unwrap();

        run(&db, drop_id, true).unwrap();
        let remaining: Vec<i64> = db.list_tickets().unwrap().iter().map(|t| t.id).collect();
        assert_eq!(remaining, vec![keep]);
    }
}
