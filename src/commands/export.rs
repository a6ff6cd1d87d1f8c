use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::db::Database;
use crate::report::{self, ExportFilter};

/// Write the KPI report. `output` of `None` writes the default file name
/// into `dir`; `Some("-")` writes to stdout.
pub fn run(
    db: &Database,
    filter: &ExportFilter,
    output: Option<&str>,
    dir: &Path,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<Option<PathBuf>> {
    let snapshot = db.snapshot()?;
    let export = report::build_export(&snapshot.tickets, &snapshot.profiles, filter, now, offset);
    let csv = export.to_csv();

    let path = match output {
        Some("-") => {
            let mut stdout = io::stdout().lock();
            write!(stdout, "{}", csv)?;
            return Ok(None);
        }
        Some(path) => PathBuf::from(path),
        None => dir.join(&export.file_name),
    };

    fs::write(&path, csv).context("Failed to write export file")?;
    info!(rows = export.rows.len(), path = %path.display(), "wrote KPI export");
    eprintln!(
        "Exported {} tickets to {}",
        export.stats.total,
        path.display()
    );
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{AssigneeFilter, EXPORT_HEADERS};
    use crate::test_support::{at, new_ticket, read_csv, sample_profile};
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn setup_test_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(&db_path).unwrap();
        db.create_profile(&sample_profile("tech-1", "Thandi Mokoena")).unwrap();
        (db, dir)
    }

    fn sast() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).unwrap()
    }

    #[test]
    fn test_export_default_file_name() {
        let (db, dir) = setup_test_db();
        let t0 = at("2024-05-10T08:00:00Z");
        db.create_ticket(&new_ticket("tech-1"), t0).unwrap();

        let filter = ExportFilter::last_days(
            NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
            30,
            AssigneeFilter::All,
        );
        let path = run(&db, &filter, None, dir.path(), t0, sast()).unwrap().unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "kpi-report-2024-05-01-to-2024-05-31.csv"
        );

        let content = fs::read_to_string(&path).unwrap();
        let parsed = read_csv(&content);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], EXPORT_HEADERS.iter().map(|h| h.to_string()).collect::<Vec<_>>());
        assert_eq!(parsed[1][1], "Thandi Mokoena");
    }

    #[test]
    fn test_export_explicit_path() {
        let (db, dir) = setup_test_db();
        let t0 = at("2024-05-10T08:00:00Z");
        let id = db.create_ticket(&new_ticket("tech-1"), t0).unwrap();
        db.add_update(id, "Looked at it, \"briefly\"", None, t0 + Duration::minutes(5))
            .unwrap();

        let out = dir.path().join("report.csv");
        let now = t0 + Duration::minutes(65);
        run(
            &db,
            &ExportFilter::default(),
            Some(out.to_str().unwrap()),
            dir.path(),
            now,
            sast(),
        )
        .unwrap();

        let parsed = read_csv(&fs::read_to_string(&out).unwrap());
        assert_eq!(parsed[1][13], "[2024/05/10, 10:05:00] Looked at it, \"briefly\"");
        // 5 logged + 60 live since the update.
        assert_eq!(parsed[1][14], "65");
    }

    #[test]
    fn test_export_empty_range() {
        let (db, dir) = setup_test_db();
        let t0 = at("2024-05-10T08:00:00Z");
        db.create_ticket(&new_ticket("tech-1"), t0).unwrap();
        let filter = ExportFilter {
            date_from: NaiveDate::from_ymd_opt(2025, 1, 1),
            ..Default::default()
        };
        let path = run(&db, &filter, None, dir.path(), t0, sast()).unwrap().unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    proptest! {
        #[test]
        fn prop_export_roundtrips_issue_text(issue in "[a-zA-Z0-9 ,\"]{1,40}") {
            let (db, dir) = setup_test_db();
            let t0 = at("2024-05-10T08:00:00Z");
            let mut new = new_ticket("tech-1");
            new.issue = issue.clone();
            db.create_ticket(&new, t0).unwrap();

            let out = dir.path().join("out.csv");
            run(&db, &ExportFilter::default(), Some(out.to_str().unwrap()), dir.path(), t0, sast())
                .unwrap();
            let parsed = read_csv(&fs::read_to_string(&out).unwrap());
            prop_assert_eq!(&parsed[1][9], &issue);
        }
    }
}
