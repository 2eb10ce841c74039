//! Command-line interface argument parsing.
//!
//! Global flags select the data source and the session (role and scope);
//! each subcommand renders one view or performs one store mutation.

use crate::context::Role;
use crate::insight::InsightKind;
use crate::snapshot::PeriodPreset;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// celulas - cell-group hierarchy reports
///
/// Roll weekly cell reports up through coordinations and networks, rank
/// members, follow multiplication lineage and keep a local store of
/// reports and multiplications.
///
/// Examples:
///   celulas --data ./export dashboard --period last-month
///   celulas --db celulas.db --role coordinator --scope <ID> dashboard --min-submission-rate 80
///   celulas --db celulas.db import ./export
///   celulas --db celulas.db submit-report --cell <ID> --date 2024-03-06 --members-present 9
///   celulas init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .celulas.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Directory of JSON table exports
    #[arg(long, value_name = "DIR", env = "CELULAS_DATA_DIR", global = true)]
    pub data: Option<PathBuf>,

    /// SQLite store; when set, reads and writes go through it
    #[arg(long, value_name = "FILE", env = "CELULAS_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Role of the person running the command
    #[arg(long, value_enum, default_value = "pastor", global = true)]
    pub role: Role,

    /// Id of the network, coordination or cell the role is attached to
    #[arg(long, value_name = "ID", global = true)]
    pub scope: Option<Uuid>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Reporting window. Without flags the configured preset applies.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct PeriodArgs {
    /// Named period relative to today
    #[arg(long, value_enum, conflicts_with_all = ["from", "to"])]
    pub period: Option<PeriodPreset>,

    /// First day of an explicit period (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", requires = "to")]
    pub from: Option<NaiveDate>,

    /// Last day of an explicit period (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", requires = "from")]
    pub to: Option<NaiveDate>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Output format (markdown, json)
    #[arg(long, value_enum, default_value = "markdown")]
    pub format: OutputFormat,

    /// Write to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Per-network, per-coordination, per-cell and per-leader statistics
    Dashboard {
        #[command(flatten)]
        period: PeriodArgs,
        #[command(flatten)]
        output: OutputArgs,
        /// Exit with code 2 if any coordination submits below this rate (0-100)
        #[arg(long, value_name = "PERCENT")]
        min_submission_rate: Option<u32>,
    },

    /// Member leaderboard by tenure and spiritual milestones
    Ranking {
        /// Number of members to show
        #[arg(long, value_name = "COUNT")]
        limit: Option<usize>,
        /// Only members of this cell
        #[arg(long, value_name = "ID")]
        cell: Option<Uuid>,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Multiplication forest
    Lineage {
        /// Also list cells that can still be recorded as a new cell
        #[arg(long)]
        available: bool,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Organization tree (network, coordination, supervisors, cells)
    Tree {
        /// Case-insensitive filter on names and couple names
        #[arg(short, long, value_name = "TEXT")]
        search: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Write the dashboard as an XLSX workbook
    Export {
        #[command(flatten)]
        period: PeriodArgs,
        /// Workbook path
        #[arg(short, long, value_name = "FILE", default_value = "dashboard.xlsx")]
        output: PathBuf,
    },

    /// Ask the summarization endpoint for a narrative over the period
    Insight {
        /// Kind of narrative
        #[arg(long, value_enum, default_value = "growth")]
        kind: InsightKind,
        #[command(flatten)]
        period: PeriodArgs,
        #[command(flatten)]
        output: OutputArgs,
        /// Endpoint URL
        #[arg(long, value_name = "URL", env = "CELULAS_INSIGHT_URL")]
        endpoint: Option<String>,
        /// Request timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Load a directory of JSON exports into the store
    Import {
        /// Export directory (defaults to --data or the configured directory)
        #[arg(value_name = "DIR")]
        dir: Option<PathBuf>,
    },

    /// Submit (or replace) a cell's report for the week of a meeting
    SubmitReport {
        #[arg(long, value_name = "ID")]
        cell: Uuid,
        /// Meeting date (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        date: NaiveDate,
        #[arg(long, default_value = "0")]
        members_present: u32,
        #[arg(long, default_value = "0")]
        leaders_in_training: u32,
        #[arg(long, default_value = "0")]
        discipleships: u32,
        #[arg(long, default_value = "0")]
        visitors: u32,
        #[arg(long, default_value = "0")]
        children: u32,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long, value_name = "URL")]
        photo_url: Option<String>,
    },

    /// Delete a weekly report
    DeleteReport {
        #[arg(value_name = "ID")]
        id: Uuid,
    },

    /// Record that a cell multiplied into a new cell
    Multiply {
        #[arg(long, value_name = "ID")]
        origin: Uuid,
        #[arg(long = "new-cell", value_name = "ID")]
        new_cell: Uuid,
        /// Multiplication date (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        date: NaiveDate,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a multiplication record; both cells stay
    Unmultiply {
        #[arg(value_name = "ID")]
        id: Uuid,
    },

    /// Generate a default .celulas.toml configuration file
    InitConfig,
}

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Command {
    /// Commands that write to the store.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Command::Import { .. }
                | Command::SubmitReport { .. }
                | Command::DeleteReport { .. }
                | Command::Multiply { .. }
                | Command::Unmultiply { .. }
        )
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if matches!(self.command, Command::InitConfig) {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.role != Role::Pastor && self.scope.is_none() {
            return Err(format!("{} sessions require --scope <ID>", self.role));
        }

        match &self.command {
            Command::Dashboard {
                period,
                min_submission_rate,
                ..
            } => {
                validate_period(period)?;
                if let Some(rate) = min_submission_rate {
                    if *rate > 100 {
                        return Err("Minimum submission rate must be between 0 and 100".to_string());
                    }
                }
            }
            Command::Ranking { limit: Some(0), .. } => {
                return Err("Limit must be at least 1".to_string());
            }
            Command::Export { period, .. } => validate_period(period)?,
            Command::Insight {
                period,
                endpoint,
                timeout,
                ..
            } => {
                validate_period(period)?;
                if let Some(url) = endpoint {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        return Err("Endpoint URL must start with 'http://' or 'https://'".to_string());
                    }
                }
                if *timeout == Some(0) {
                    return Err("Timeout must be at least 1 second".to_string());
                }
            }
            Command::Import { dir: Some(dir) } => {
                if !dir.is_dir() {
                    return Err(format!("Export directory does not exist: {}", dir.display()));
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

fn validate_period(period: &PeriodArgs) -> Result<(), String> {
    if let (Some(from), Some(to)) = (period.from, period.to) {
        if from > to {
            return Err(format!("--from {} is after --to {}", from, to));
        }
    }
    Ok(())
}
