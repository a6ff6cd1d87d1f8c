use anyhow::{bail, Result};

use crate::db::Database;
use crate::models::Profile;

pub fn add(db: &Database, id: &str, full_name: &str, role: &str, is_admin: bool) -> Result<()> {
    let id = id.trim();
    let full_name = full_name.trim();
    if id.is_empty() || id == "all" {
        bail!("Invalid profile id '{}'", id);
    }
    if full_name.is_empty() {
        bail!("Profile name must not be empty");
    }
    if db.get_profile(id)?.is_some() {
        bail!("Profile '{}' already exists", id);
    }

    db.create_profile(&Profile {
        id: id.to_string(),
        full_name: full_name.to_string(),
        role: role.to_string(),
        is_admin,
        avatar_url: None,
    })?;
    println!("Added profile {} ({})", id, full_name);
    Ok(())
}

pub fn list(db: &Database) -> Result<()> {
    let profiles = db.list_profiles()?;

    if profiles.is_empty() {
        println!("No profiles found.");
        return Ok(());
    }

    for p in profiles {
        let admin = if p.is_admin { " [admin]" } else { "" };
        println!("{:<16} {:<30} {}{}", p.id, p.full_name, p.role, admin);
    }

    Ok(())
}
