use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::db::Database;
use crate::ledger;
use crate::report::{self, AssigneeFilter, ExportFilter, Stats};

/// On-screen preview of the KPI export for the same filter.
pub fn run(db: &Database, filter: &ExportFilter, now: DateTime<Utc>) -> Result<Stats> {
    let snapshot = db.snapshot()?;
    let selected = report::filter_tickets(&snapshot.tickets, filter);
    let stats = report::summarize(&selected);
    let tracked = report::total_time_tracked(&selected, now);

    let range = |d: Option<chrono::NaiveDate>| {
        d.map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    let who = match &filter.assignee {
        AssigneeFilter::All => "all team members".to_string(),
        AssigneeFilter::Profile(id) => match db.get_profile(id)? {
            Some(p) => p.full_name,
            None => id.clone(),
        },
    };

    println!(
        "KPI summary {} to {} ({})",
        range(filter.date_from),
        range(filter.date_to),
        who
    );
    println!("Total tickets:      {}", stats.total);
    println!("Open:               {}", stats.open);
    println!("Closed:             {}", stats.closed);
    println!("Close rate:         {}%", stats.closed_rate);
    println!("Avg response time:  {} min", stats.avg_response_time);
    println!("Time tracked:       {}", ledger::format_duration(tracked));

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, new_ticket, sample_profile};
    use chrono::Duration;
    use tempfile::tempdir;

    fn setup_test_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(&db_path).unwrap();
        db.create_profile(&sample_profile("tech-1", "Thandi")).unwrap();
        db.create_profile(&sample_profile("tech-2", "Sam")).unwrap();
        (db, dir)
    }

    #[test]
    fn test_stats_empty_store() {
        let (db, _dir) = setup_test_db();
        let stats = run(&db, &ExportFilter::default(), at("2024-05-01T08:00:00Z")).unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.closed_rate, "0");
        assert_eq!(stats.avg_response_time, 0);
    }

    #[test]
    fn test_stats_per_assignee() {
        let (db, _dir) = setup_test_db();
        let t0 = at("2024-05-01T08:00:00Z");
        let a = db.create_ticket(&new_ticket("tech-1"), t0).unwrap();
        db.create_ticket(&new_ticket("tech-1"), t0).unwrap();
        db.create_ticket(&new_ticket("tech-2"), t0).unwrap();
        db.close_ticket(a, "Done", Some(20), None, t0 + Duration::minutes(30))
            .unwrap();

        let filter = ExportFilter {
            assignee: AssigneeFilter::parse("tech-1"),
            ..Default::default()
        };
        let stats = run(&db, &filter, t0 + Duration::hours(1)).unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.closed, 1);
        assert_eq!(stats.closed_rate, "50.0");
        assert_eq!(stats.avg_response_time, 20);
    }
}
