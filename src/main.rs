use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use deskledger::commands;
use deskledger::commands::init::{DATA_DIR, DB_FILE};
use deskledger::db::{Database, NewTicket};
use deskledger::models::{TicketType, WorkLocation};
use deskledger::report::{AssigneeFilter, ExportFilter};

/// Days covered by `stats` and `export` when no range is given.
const DEFAULT_RANGE_DAYS: i64 = 30;

#[derive(Parser)]
#[command(name = "deskledger")]
#[command(about = "Ticket time ledger and KPI reports for a support desk")]
#[command(version)]
struct Cli {
    /// Data directory (defaults to the nearest .deskledger above the cwd)
    #[arg(long, global = true, env = "DESKLEDGER_DIR")]
    dir: Option<PathBuf>,

    /// Offset from UTC, in minutes, for displayed timestamps
    #[arg(
        long,
        global = true,
        env = "DESKLEDGER_UTC_OFFSET",
        default_value_t = 120,
        allow_negative_numbers = true
    )]
    utc_offset: i32,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize deskledger in the current directory
    Init,

    /// Manage team member profiles
    Profile {
        #[command(subcommand)]
        action: ProfileCommands,
    },

    /// Raise a new ticket
    Create {
        /// Assigned team member (profile id)
        #[arg(short, long)]
        assignee: String,
        /// Ticket type (Hardware, Software, New Site)
        #[arg(short = 't', long = "type")]
        ticket_type: String,
        /// Work location (on-site, remote)
        #[arg(short, long, default_value = "remote")]
        location: String,
        /// Client name
        #[arg(short, long)]
        client: String,
        /// Issue description
        #[arg(short, long)]
        issue: String,
        /// Reference in the external ClickUp board
        #[arg(long)]
        clickup: Option<String>,
        /// Estate or building
        #[arg(long)]
        estate: Option<String>,
        /// CML location
        #[arg(long)]
        cml: Option<String>,
        /// Site name (New Site tickets)
        #[arg(long)]
        site: Option<String>,
        /// Installer name, repeatable
        #[arg(long = "installer")]
        installers: Vec<String>,
        /// Target date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        target: Option<NaiveDate>,
        /// Name of the party this ticket depends on
        #[arg(long)]
        dependency: Option<String>,
        /// Who raised the ticket
        #[arg(long)]
        by: Option<String>,
    },

    /// List tickets
    List {
        /// Filter by assignee (profile id or "all")
        #[arg(short, long, default_value = "all")]
        assignee: String,
        /// Filter by status (open, closed, all)
        #[arg(short, long, default_value = "open")]
        status: String,
    },

    /// Show ticket details and its time ledger
    Show {
        /// Ticket number, as shown by `list`
        number: i64,
    },

    /// Post an update, committing the time since the last one
    Update {
        /// Ticket number, as shown by `list`
        number: i64,
        /// Update text
        text: String,
        #[arg(long)]
        by: Option<String>,
    },

    /// Log work done outside the update flow
    Log {
        /// Ticket number, as shown by `list`
        number: i64,
        /// Minutes worked
        minutes: i64,
        /// What was done
        description: String,
        #[arg(long)]
        by: Option<String>,
    },

    /// Close a ticket
    Close {
        /// Ticket number, as shown by `list`
        number: i64,
        /// How the ticket was resolved
        #[arg(short, long)]
        resolution: String,
        /// Minutes until first response
        #[arg(long)]
        response_minutes: Option<i64>,
        #[arg(long)]
        by: Option<String>,
    },

    /// Attach a labelled site file reference
    Attach {
        /// Ticket number, as shown by `list`
        number: i64,
        /// File path or URL
        path: String,
        #[arg(short, long)]
        label: String,
    },

    /// Delete a ticket
    Delete {
        /// Ticket number, as shown by `list`
        number: i64,
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Print KPI summary for a date range
    Stats {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Write the KPI report as CSV
    Export {
        #[command(flatten)]
        range: RangeArgs,
        /// Output path, or "-" for stdout
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Dashboard counters
    Overview,

    /// Load profiles and tickets from a JSON snapshot
    Import {
        /// Snapshot file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Add a team member
    Add {
        /// Profile id
        id: String,
        /// Full name
        name: String,
        #[arg(long, default_value = "technician")]
        role: String,
        #[arg(long)]
        admin: bool,
    },
    /// List team members
    List,
}

#[derive(clap::Args)]
struct RangeArgs {
    /// First day (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    from: Option<NaiveDate>,
    /// Last day (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    to: Option<NaiveDate>,
    /// Ignore dates entirely
    #[arg(long, conflicts_with_all = ["from", "to"])]
    all: bool,
    /// Profile id or "all"
    #[arg(short, long, default_value = "all")]
    assignee: String,
}

impl RangeArgs {
    fn into_filter(self, today: NaiveDate, offset: FixedOffset) -> ExportFilter {
        let assignee = AssigneeFilter::parse(&self.assignee);
        let filter = if self.all || self.from.is_some() || self.to.is_some() {
            ExportFilter {
                date_from: self.from,
                date_to: self.to,
                assignee,
                ..Default::default()
            }
        } else {
            ExportFilter::last_days(today, DEFAULT_RANGE_DAYS, assignee)
        };
        filter.in_offset(offset)
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got '{}' ({})", s, e))
}

fn display_offset(minutes: i32) -> Result<FixedOffset> {
    if !(-14 * 60..=14 * 60).contains(&minutes) {
        bail!("UTC offset out of range: {} minutes", minutes);
    }
    match FixedOffset::east_opt(minutes * 60) {
        Some(offset) => Ok(offset),
        None => bail!("UTC offset out of range: {} minutes", minutes),
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_env("DESKLEDGER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn find_data_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        if !dir.is_dir() {
            bail!("Data directory {} does not exist", dir.display());
        }
        return Ok(dir.to_path_buf());
    }

    let mut current = env::current_dir()?;
    loop {
        let candidate = current.join(DATA_DIR);
        if candidate.is_dir() {
            return Ok(candidate);
        }

        if !current.pop() {
            bail!("No {} directory here or in any parent. Run 'deskledger init' first.", DATA_DIR);
        }
    }
}

fn get_db(explicit: Option<&Path>) -> Result<Database> {
    let data_dir = find_data_dir(explicit)?;
    let db_path = data_dir.join(DB_FILE);
    debug!(path = %db_path.display(), "opening database");
    Database::open(&db_path).context("Failed to open database")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let offset = display_offset(cli.utc_offset)?;
    let now: DateTime<Utc> = Utc::now();
    let today = now.with_timezone(&offset).date_naive();
    let dir = cli.dir.as_deref();

    match cli.command {
        Commands::Init => {
            let cwd = env::current_dir()?;
            commands::init::run(&cwd)
        }

        Commands::Profile { action } => {
            let db = get_db(dir)?;
            match action {
                ProfileCommands::Add {
                    id,
                    name,
                    role,
                    admin,
                } => commands::profile::add(&db, &id, &name, &role, admin),
                ProfileCommands::List => commands::profile::list(&db),
            }
        }

        Commands::Create {
            assignee,
            ticket_type,
            location,
            client,
            issue,
            clickup,
            estate,
            cml,
            site,
            installers,
            target,
            dependency,
            by,
        } => {
            let db = get_db(dir)?;
            let new = NewTicket {
                user_id: assignee,
                ticket_type: TicketType::parse(&ticket_type)?,
                location: WorkLocation::parse(&location)?,
                client,
                issue,
                clickup_ticket: clickup,
                estate_or_building: estate,
                cml_location: cml,
                site_name: site,
                installers,
                target_date: target,
                has_dependencies: dependency.is_some(),
                dependency_name: dependency,
                created_by: by,
            };
            commands::create::run(&db, new, now)
        }

        Commands::List { assignee, status } => {
            let db = get_db(dir)?;
            commands::list::run(&db, &AssigneeFilter::parse(&assignee), Some(status.as_str()), now)
        }

        Commands::Show { number } => {
            let db = get_db(dir)?;
            commands::show::run(&db, number, now, offset)
        }

        Commands::Update { number, text, by } => {
            let db = get_db(dir)?;
            commands::update::run(&db, number, &text, by.as_deref(), now)
        }

        Commands::Log {
            number,
            minutes,
            description,
            by,
        } => {
            let db = get_db(dir)?;
            commands::timelog::run(&db, number, minutes, &description, by.as_deref(), now)
        }

        Commands::Close {
            number,
            resolution,
            response_minutes,
            by,
        } => {
            let db = get_db(dir)?;
            commands::status::close(&db, number, &resolution, response_minutes, by.as_deref(), now)
        }

        Commands::Attach { number, path, label } => {
            let db = get_db(dir)?;
            commands::attach::run(&db, number, &path, &label)
        }

        Commands::Delete { number, force } => {
            let db = get_db(dir)?;
            commands::delete::run(&db, number, force)
        }

        Commands::Stats { range } => {
            let db = get_db(dir)?;
            commands::stats::run(&db, &range.into_filter(today, offset), now).map(|_| ())
        }

        Commands::Export { range, output } => {
            let db = get_db(dir)?;
            let cwd = env::current_dir()?;
            commands::export::run(
                &db,
                &range.into_filter(today, offset),
                output.as_deref(),
                &cwd,
                now,
                offset,
            )
            .map(|_| ())
        }

        Commands::Overview => {
            let db = get_db(dir)?;
            commands::overview::run(&db).map(|_| ())
        }

        Commands::Import { file } => {
            let db = get_db(dir)?;
            commands::import::run(&db, &file)
        }
    }
}
