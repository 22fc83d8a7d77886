//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::RangePreset;
use crate::models::{DateRange, DeliveryStatus, Entity, OrderCategory, MAX_WINDOW_DAYS};
use chrono::{Duration, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Palmtrack - admin console for a palm-fruit trading business
///
/// Dashboards, agent statements and record keeping over a PostgREST
/// backend.
///
/// Examples:
///   palmtrack dashboard
///   palmtrack dashboard --range all-time --format json
///   palmtrack report --agent 7 --from 2026-10-01 --to 2026-10-31 --open
///   palmtrack advance add --agent 7 --amount 1500
///   palmtrack collection add --agent 7 --item 120@2.5 --item 80@2.4
///   palmtrack init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .palmtrack.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Backend base URL (without /rest/v1)
    #[arg(long, value_name = "URL", env = "PALMTRACK_BACKEND_URL", global = true)]
    pub backend_url: Option<String>,

    /// Backend API key
    #[arg(
        long,
        value_name = "KEY",
        env = "PALMTRACK_API_KEY",
        hide_env_values = true,
        global = true
    )]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Skip the backend summary procedure and compute figures from rows
    #[arg(long, global = true)]
    pub no_summary_rpc: bool,

    /// Minutes of inactivity before a privileged session is signed out
    #[arg(long, value_name = "MINUTES", global = true)]
    pub idle_timeout: Option<u64>,

    /// Signed-in user
    #[arg(long, default_value = "admin", env = "PALMTRACK_USER", global = true)]
    pub user: String,

    /// Role of the signed-in user
    #[arg(long, default_value = "admin", env = "PALMTRACK_ROLE", global = true)]
    pub role: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the dashboard for a date range
    Dashboard(DashboardArgs),

    /// Write a printable statement for one agent
    Report(ReportArgs),

    /// Keep the dashboard on screen, refreshing periodically
    ///
    /// Press Enter to refresh, type a row number to print that agent's
    /// statement, `q` to quit.
    Watch(WatchArgs),

    /// Field agents
    Agent {
        #[command(subcommand)]
        action: AgentCommand,
    },

    /// Cash advances
    Advance {
        #[command(subcommand)]
        action: AdvanceCommand,
    },

    /// Operating expenses
    Expense {
        #[command(subcommand)]
        action: ExpenseCommand,
    },

    /// Fruit collections
    Collection {
        #[command(subcommand)]
        action: CollectionCommand,
    },

    /// Payments against orders
    Payment {
        #[command(subcommand)]
        action: PaymentCommand,
    },

    /// Customer orders
    Order {
        #[command(subcommand)]
        action: OrderCommand,
    },

    /// Delete a record (asks for confirmation)
    Delete(DeleteArgs),

    /// Generate a default .palmtrack.toml configuration file
    InitConfig,
}

/// Date range selection shared by dashboard, report and watch.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RangeArgs {
    /// Named range (defaults to the config's default_range)
    #[arg(long, value_enum, conflicts_with_all = ["from", "to", "last"])]
    pub range: Option<RangePreset>,

    /// First day to include (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub to: Option<NaiveDate>,

    /// The last N days, today included
    #[arg(long, value_name = "DAYS", conflicts_with_all = ["from", "to"])]
    pub last: Option<u32>,
}

impl RangeArgs {
    /// Turn the flags into a half-open range. `--to` is inclusive on the
    /// command line.
    pub fn resolve(&self, default: RangePreset, today: NaiveDate) -> DateRange {
        if let Some(days) = self.last {
            return DateRange::last_days(today, days);
        }
        if self.from.is_some() || self.to.is_some() {
            return DateRange::custom(self.from, self.to.map(|to| to + Duration::days(1)));
        }
        match self.range.unwrap_or(default) {
            RangePreset::ThisMonth => DateRange::this_month(today),
            RangePreset::Last30Days => DateRange::last_days(today, 30),
            RangePreset::AllTime => DateRange::all_time(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(format!("--from {} is after --to {}", from, to));
            }
        }
        if self.last == Some(0) {
            return Err("--last must be at least 1 day".to_string());
        }
        if let Some(days) = self.last {
            if i64::from(days) > MAX_WINDOW_DAYS {
                return Err(format!(
                    "--last must be at most {} days, got {}",
                    MAX_WINDOW_DAYS, days
                ));
            }
        }
        Ok(())
    }
}

/// Output format for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Cards and tables (default)
    #[default]
    Text,
    /// JSON format
    Json,
}

#[derive(clap::Args, Debug, Clone)]
pub struct DashboardArgs {
    #[command(flatten)]
    pub range: RangeArgs,

    /// Number of agents in the outstanding table
    #[arg(long, value_name = "COUNT")]
    pub top: Option<usize>,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Print the statement for this row of the outstanding table
    #[arg(long, value_name = "ROW")]
    pub select: Option<usize>,

    /// Open the selected statement in the browser
    #[arg(long, requires = "select")]
    pub open: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ReportArgs {
    /// Agent id
    #[arg(long, value_name = "ID")]
    pub agent: String,

    #[command(flatten)]
    pub range: RangeArgs,

    /// Output file (defaults to the configured output directory)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Open the statement in the default browser
    #[arg(long)]
    pub open: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct WatchArgs {
    #[command(flatten)]
    pub range: RangeArgs,

    /// Seconds between refreshes
    #[arg(long, default_value = "60", value_name = "SECS")]
    pub interval: u64,

    /// Number of agents in the outstanding table
    #[arg(long, value_name = "COUNT")]
    pub top: Option<usize>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum AgentCommand {
    /// Register a new agent
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum AdvanceCommand {
    /// Record cash handed to an agent
    Add {
        #[arg(long, value_name = "ID")]
        agent: Option<String>,
        #[arg(long)]
        amount: String,
        /// Defaults to today
        #[arg(long, value_name = "DATE")]
        date: Option<NaiveDate>,
        #[arg(long)]
        method: Option<String>,
        /// Who signed for the cash
        #[arg(long)]
        signer: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ExpenseCommand {
    /// Record an operating expense
    Add {
        #[arg(long, value_name = "ID")]
        agent: Option<String>,
        /// Expense type, e.g. FUEL, LABOUR
        #[arg(long = "type", value_name = "TYPE")]
        expense_type: String,
        #[arg(long)]
        amount: String,
        #[arg(long, value_name = "DATE")]
        date: Option<NaiveDate>,
        #[arg(long)]
        note: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum CollectionCommand {
    /// Record a fruit collection
    Add {
        #[arg(long, value_name = "ID")]
        agent: Option<String>,
        #[arg(long, value_name = "DATE")]
        date: Option<NaiveDate>,
        #[arg(long)]
        driver: Option<String>,
        /// Weighed lot, repeatable
        #[arg(long = "item", value_name = "WEIGHT@PRICE")]
        items: Vec<String>,
        /// Total actually paid, if different from the items
        #[arg(long, value_name = "AMOUNT")]
        total: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum PaymentCommand {
    /// Record a payment against an order
    Add {
        #[arg(long, value_name = "ID")]
        order: String,
        #[arg(long)]
        amount: String,
        #[arg(long, value_name = "DATE")]
        date: Option<NaiveDate>,
        #[arg(long)]
        method: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum OrderCommand {
    /// Create a customer order
    Add {
        #[arg(long, value_name = "NAME")]
        customer: Option<String>,
        #[arg(long, value_name = "ID")]
        customer_id: Option<String>,
        #[arg(long, value_enum)]
        category: OrderCategory,
        /// Order line, repeatable
        #[arg(long = "item", value_name = "DESCRIPTION:QTY@PRICE")]
        items: Vec<String>,
        #[arg(long, value_name = "AMOUNT")]
        discount: Option<String>,
        #[arg(long, value_name = "DATE")]
        date: Option<NaiveDate>,
    },

    /// Move an order to a new delivery status
    Status {
        /// Order id
        id: String,
        #[arg(value_enum)]
        status: DeliveryStatus,
    },
}

/// Record types that can be deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RecordKind {
    Agent,
    Advance,
    Collection,
    Expense,
    Order,
    Payment,
}

impl RecordKind {
    pub fn entity(&self) -> Entity {
        match self {
            RecordKind::Agent => Entity::Agents,
            RecordKind::Advance => Entity::Advances,
            RecordKind::Collection => Entity::Collections,
            RecordKind::Expense => Entity::Expenses,
            RecordKind::Order => Entity::Orders,
            RecordKind::Payment => Entity::Payments,
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct DeleteArgs {
    #[arg(value_enum)]
    pub kind: RecordKind,

    pub id: String,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate backend URL format if one was given
        if let Some(ref url) = self.backend_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Backend URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        match &self.command {
            Command::Dashboard(args) => {
                args.range.validate()?;
                if args.top == Some(0) {
                    return Err("--top must be at least 1".to_string());
                }
                if args.select == Some(0) {
                    return Err("Rows are numbered from 1".to_string());
                }
            }
            Command::Report(args) => {
                args.range.validate()?;
                if args.agent.trim().is_empty() {
                    return Err("--agent must not be empty".to_string());
                }
            }
            Command::Watch(args) => {
                args.range.validate()?;
                if args.interval == 0 {
                    return Err("Refresh interval must be at least 1 second".to_string());
                }
                if args.top == Some(0) {
                    return Err("--top must be at least 1".to_string());
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
