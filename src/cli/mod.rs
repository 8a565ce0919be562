pub mod backup;
pub mod dashboard;
pub mod export;
pub mod import;
pub mod init;
pub mod report;
pub mod staff;
pub mod stages;
pub mod status;

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rusqlite::Connection;

use crate::db::{get_connection, init_db, SqliteTable, DB_FILE};
use crate::error::{Result, ShopfloorError};
use crate::ledger::ReportBook;
use crate::models::{parse_day, ReportStatus};
use crate::settings::{load_settings, Backend, Settings};
use crate::table::TableApi;
use crate::views::ReportFilter;

pub(crate) fn parse_month(month: &str) -> Result<(i32, u32)> {
    let parts: Vec<&str> = month.trim().split('-').collect();
    if parts.len() == 2 {
        if let (Ok(year), Ok(m)) = (parts[0].parse(), parts[1].parse::<u32>()) {
            if (1..=12).contains(&m) {
                return Ok((year, m));
            }
        }
    }
    Err(ShopfloorError::Validation(vec![format!(
        "month '{month}' is not YYYY-MM"
    )]))
}

pub(crate) fn parse_date_opt(raw: &Option<String>) -> Result<Option<NaiveDate>> {
    match raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse_day(s)
            .map(Some)
            .ok_or_else(|| ShopfloorError::Validation(vec![format!("'{s}' is not a date")])),
    }
}

pub(crate) fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// The acting user: `--as` wins over the configured user name.
pub(crate) fn actor(settings: &Settings, as_user: Option<&str>) -> Result<String> {
    let name = as_user
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(settings.user_name.trim());
    if name.is_empty() {
        return Err(ShopfloorError::Settings(
            "no user set (run `shopfloor init --user NAME` or pass --as NAME)".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Local database: the report store for the local backend and the import
/// log for both backends.
pub(crate) fn local_conn(settings: &Settings) -> Result<Connection> {
    let dir = settings.data_path();
    std::fs::create_dir_all(&dir)?;
    let conn = get_connection(&dir.join(DB_FILE))?;
    init_db(&conn)?;
    Ok(conn)
}

pub(crate) fn open_table(settings: &Settings) -> Result<Box<dyn TableApi>> {
    match settings.backend {
        Backend::Local => Ok(Box::new(SqliteTable::new(local_conn(settings)?))),
        #[cfg(feature = "remote")]
        Backend::Appsheet => Ok(Box::new(crate::remote::AppSheetTable::new(
            &settings.appsheet.base_url,
            &settings.appsheet.app_id,
            &settings.access_key(),
        )?)),
        #[cfg(not(feature = "remote"))]
        Backend::Appsheet => Err(ShopfloorError::Settings(
            "this build has no remote backend (enable the `remote` feature)".to_string(),
        )),
    }
}

pub(crate) fn open_book() -> Result<(Settings, ReportBook<Box<dyn TableApi>>)> {
    let settings = load_settings();
    let book = ReportBook::load(open_table(&settings)?)?;
    Ok((settings, book))
}

pub(crate) fn status_label(status: ReportStatus) -> colored::ColoredString {
    match status {
        ReportStatus::Approved => status.label().green(),
        ReportStatus::Pending => status.label().yellow(),
        ReportStatus::Rejected => status.label().red(),
    }
}

// ---------------------------------------------------------------------------
// Command tree
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "shopfloor",
    version,
    about = "Production report ledger: submit, approve and summarize shop-floor reports."
)]
pub struct Cli {
    /// Act as this user instead of the configured one
    #[arg(long = "as", global = true, value_name = "NAME")]
    pub as_user: Option<String>,
    /// Verbose logging (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone, Default)]
pub struct FilterArgs {
    /// Case-insensitive match on ID or stage
    #[arg(long)]
    pub search: Option<String>,
    /// Exact stage name
    #[arg(long)]
    pub stage: Option<String>,
    /// Pending, Approved or Rejected
    #[arg(long)]
    pub status: Option<String>,
    /// Start date: YYYY-MM-DD
    #[arg(long = "from")]
    pub from_date: Option<String>,
    /// End date: YYYY-MM-DD
    #[arg(long = "to")]
    pub to_date: Option<String>,
}

impl FilterArgs {
    pub fn status(&self) -> Result<Option<ReportStatus>> {
        match self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(s) => ReportStatus::parse(s)
                .map(Some)
                .ok_or_else(|| ShopfloorError::Validation(vec![format!("unknown status '{s}'")])),
        }
    }

    pub fn to_filter(&self) -> Result<ReportFilter> {
        Ok(ReportFilter {
            search: self.search.clone().unwrap_or_default(),
            stage: self.stage.clone().filter(|s| !s.trim().is_empty()),
            status: self.status()?,
            date_from: parse_date_opt(&self.from_date)?,
            date_to: parse_date_opt(&self.to_date)?,
        })
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up shopfloor: data directory, user name and table backend.
    Init {
        /// Path for shopfloor data (default: ~/Documents/shopfloor)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Name recorded in report history
        #[arg(long)]
        user: Option<String>,
        /// Where report tables live
        #[arg(long, value_enum)]
        backend: Option<Backend>,
        /// AppSheet application id (appsheet backend)
        #[arg(long = "app-id")]
        app_id: Option<String>,
    },
    /// Show configuration and report counts.
    Status,
    /// Create, review and approve production reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Import reports from a CSV or XLSX file.
    Import {
        /// Path to CSV or XLSX file to import
        file: String,
        /// Validate and preview without sending anything
        #[arg(long = "dry-run")]
        dry_run: bool,
        /// Import even if this exact file was imported before
        #[arg(long)]
        force: bool,
    },
    /// Export reports to CSV.
    Export {
        /// Report IDs to export (default: everything matching the filters)
        ids: Vec<String>,
        #[command(flatten)]
        filter: FilterArgs,
        /// Output path (default: <data_dir>/exports/bao-cao-YYYY-MM-DD.csv)
        #[arg(long)]
        output: Option<String>,
    },
    /// Write an import template with two example rows.
    Template {
        /// Output path (default: ./mau_nhap_bao_cao.csv)
        #[arg(long)]
        output: Option<String>,
    },
    /// Production totals by stage, status counts and daily trend.
    Dashboard {
        /// Every report regardless of date
        #[arg(long, conflicts_with_all = ["day", "month"])]
        all: bool,
        /// Single day: YYYY-MM-DD
        #[arg(long, conflicts_with = "month")]
        day: Option<String>,
        /// Month: YYYY-MM (default: current month)
        #[arg(long)]
        month: Option<String>,
        /// Trend start date: YYYY-MM-DD
        #[arg(long = "from")]
        from_date: Option<String>,
        /// Trend end date: YYYY-MM-DD
        #[arg(long = "to")]
        to_date: Option<String>,
    },
    /// Manage production stages and their unit prices.
    Stages {
        #[command(subcommand)]
        command: StagesCommands,
    },
    /// Manage staff names offered as participants.
    Staff {
        #[command(subcommand)]
        command: StaffCommands,
    },
    /// Back up the local database.
    Backup {
        /// Output path (default: <data_dir>/backups/shopfloor-YYYYMMDD-HHMMSS.db)
        #[arg(long)]
        output: Option<String>,
    },
    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// List reports, newest first within each page.
    List {
        #[command(flatten)]
        filter: FilterArgs,
        /// Page number (1-based)
        #[arg(long, default_value = "1")]
        page: usize,
        /// Group the page by date
        #[arg(long = "by-date")]
        by_date: bool,
    },
    /// Show one report with its history.
    Show { id: String },
    /// Submit a new report (status Pending).
    Add {
        #[arg(long)]
        stage: String,
        #[arg(long)]
        quantity: String,
        /// Date: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Comma-separated staff names
        #[arg(long)]
        participants: Option<String>,
        #[arg(long)]
        note: Option<String>,
        /// Defaults to the acting user
        #[arg(long = "entered-by")]
        entered_by: Option<String>,
    },
    /// Edit a report that is not approved.
    Edit {
        id: String,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        stage: Option<String>,
        #[arg(long)]
        quantity: Option<String>,
        /// Comma-separated staff names (replaces the list)
        #[arg(long)]
        participants: Option<String>,
        #[arg(long)]
        note: Option<String>,
        #[arg(long = "entered-by")]
        entered_by: Option<String>,
    },
    /// Approve a pending report and fix its amount.
    Approve { id: String },
    /// Reject a pending report.
    Reject { id: String },
    /// Return an approved report to pending.
    Unapprove { id: String },
    /// Send a rejected report back for review.
    Resubmit { id: String },
    /// Delete reports that are not approved.
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum StagesCommands {
    /// List stages and unit prices.
    List,
    /// Add a stage.
    Add {
        name: String,
        #[arg(long, default_value = "0")]
        price: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Change a stage's unit price.
    SetPrice { name: String, price: String },
    /// Remove a stage. Existing reports keep its name.
    Remove { name: String },
}

#[derive(Subcommand)]
pub enum StaffCommands {
    /// List staff.
    List,
    /// Add a staff member.
    Add {
        name: String,
        #[arg(long)]
        position: Option<String>,
    },
    /// Remove a staff member.
    Remove { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("2025-03").unwrap(), (2025, 3));
        assert!(parse_month("2025-13").is_err());
        assert!(parse_month("March").is_err());
    }

    #[test]
    fn test_actor_prefers_flag() {
        let settings = Settings {
            user_name: "An".to_string(),
            ..Default::default()
        };
        assert_eq!(actor(&settings, Some("Dũng")).unwrap(), "Dũng");
        assert_eq!(actor(&settings, None).unwrap(), "An");
        assert_eq!(actor(&settings, Some("  ")).unwrap(), "An");
        assert!(actor(&Settings::default(), None).is_err());
    }

    #[test]
    fn test_filter_args() {
        let args = FilterArgs {
            status: Some("đã duyệt".to_string()),
            ..Default::default()
        };
        // the sheet value is matched exactly, only English labels ignore case
        assert!(args.to_filter().is_err());
        let args = FilterArgs {
            status: Some("approved".to_string()),
            from_date: Some("2025-03-01".to_string()),
            ..Default::default()
        };
        let f = args.to_filter().unwrap();
        assert_eq!(f.status, Some(ReportStatus::Approved));
        assert_eq!(f.date_from, NaiveDate::from_ymd_opt(2025, 3, 1));
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
