use anyhow::Result;

use crate::db::Database;
use crate::report::{self, Overview};

pub fn run(db: &Database) -> Result<Overview> {
    let snapshot = db.snapshot()?;
    let overview = report::overview(&snapshot.tickets, &snapshot.profiles);

    println!(
        "Open: {}  Closed: {}  On-Site: {}  Remote: {}",
        overview.open, overview.closed, overview.on_site, overview.remote
    );

    if !overview.members.is_empty() {
        println!();
        println!("Team:");
        for m in &overview.members {
            println!(
                "  {:<24} {:>3} open {:>4} closed",
                m.name, m.open, m.closed
            );
        }
    }

    Ok(overview)
}
