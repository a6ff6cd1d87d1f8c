use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::db::Database;

pub const DATA_DIR: &str = ".deskledger";
pub const DB_FILE: &str = "tickets.db";

pub fn run(path: &Path) -> Result<()> {
    let data_dir = path.join(DATA_DIR);

    if data_dir.exists() {
        println!("Already initialized at {}", path.display());
        return Ok(());
    }

    fs::create_dir_all(&data_dir).context("Failed to create .deskledger directory")?;
    Database::open(&data_dir.join(DB_FILE))?;
    info!(dir = %data_dir.display(), "initialized data directory");
    println!("Created {}", data_dir.display());
    println!("Add technicians with 'deskledger profile add <id> <name>'.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_creates_database() {
        let dir = tempdir().unwrap();
        run(dir.path()).unwrap();
        assert!(dir.path().join(DATA_DIR).join(DB_FILE).exists());
    }

    #[test]
    fn test_init_is_idempotent() {
        let dir = tempdir().unwrap();
        run(dir.path()).unwrap();

        let db = Database::open(&dir.path().join(DATA_DIR).join(DB_FILE)).unwrap();
        db.create_profile(&crate::test_support::sample_profile("tech-1", "Anele"))
            .unwrap();
        drop(db);

        run(dir.path()).unwrap();
        let db = Database::open(&dir.path().join(DATA_DIR).join(DB_FILE)).unwrap();
        assert_eq!(db.list_profiles().unwrap().len(), 1);
    }

    #[test]
    fn test_init_fails_on_unwritable_path() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        fs::write(&file, "").unwrap();
        assert!(run(&file).is_err());
    }
}
