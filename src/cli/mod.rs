pub mod config;
pub mod dashboard;
pub mod endpoint;
pub mod export;
pub mod init;
pub mod pending;
pub mod reload;
pub mod report;
pub mod review;
pub mod status;
pub mod sync;
pub mod upload;

use clap::{Parser, Subcommand, ValueEnum};

use crate::app::AppState;
use crate::db::get_connection;
use crate::error::Result;
use crate::extractor::{GeminiClient, GeminiConfig};
use crate::models::{CategoryType, Direction};
use crate::settings::{api_key, load_settings, Settings};
use crate::sync::SheetClient;

/// Load settings and the persisted application state.
pub(crate) fn open_app() -> Result<(Settings, AppState)> {
    let settings = load_settings();
    let conn = get_connection(&settings.db_path())?;
    let app = AppState::load(conn)?;
    Ok((settings, app))
}

pub(crate) fn sheet_client(app: &AppState) -> Result<SheetClient> {
    SheetClient::new(&app.script_url)
}

pub(crate) fn gemini_client(settings: &Settings) -> Result<GeminiClient> {
    let config = GeminiConfig::from_settings(settings, api_key())?;
    Ok(GeminiClient::new(config)?)
}

#[derive(Parser)]
#[command(
    name = "fintrack",
    version,
    about = "Track spending from PDF bank statements: extract, review, sync, analyze."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory and database.
    Init {
        /// Path for fintrack data (default: ~/.local/share/fintrack)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Show where data lives and what it holds.
    Status,
    /// Extract transactions from a PDF statement into the review list.
    Upload {
        /// Path to the PDF statement
        file: String,
        /// Extract again even if this statement was processed before
        #[arg(long)]
        force: bool,
    },
    /// Inspect and edit the transactions awaiting review.
    Pending {
        #[command(subcommand)]
        command: PendingCommands,
    },
    /// Review pending transactions interactively.
    Review,
    /// Send approved transactions to the sheet.
    Sync,
    /// Replace local history with the sheet's copy.
    Reload,
    /// Show or change the sheet web-hook URL.
    Endpoint {
        #[command(subcommand)]
        command: EndpointCommands,
    },
    /// Manage tags.
    Tags {
        #[command(subcommand)]
        command: NameCommands,
    },
    /// Manage banks.
    Banks {
        #[command(subcommand)]
        command: NameCommands,
    },
    /// Share configuration with the sheet.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Spending reports over synced history.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Export synced history to CSV.
    Export {
        /// Output path (default: <data_dir>/exports/fintrack-YYYY-MM-DD.csv)
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum PendingCommands {
    /// List pending transactions.
    List,
    /// Mark transactions approved.
    Approve {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Mark transactions pending again.
    Unapprove {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Approve everything, or un-approve everything if all are approved.
    ToggleAll,
    /// Change fields of a transaction.
    Edit {
        id: String,
        /// YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        bank: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long, value_enum)]
        direction: Option<DirectionArg>,
        #[arg(long = "type", value_enum)]
        category: Option<TypeArg>,
        #[arg(long)]
        tag: Option<String>,
    },
    /// Remove a transaction from the review list.
    Delete { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum DirectionArg {
    Spent,
    Received,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Spent => Direction::Spent,
            DirectionArg::Received => Direction::Received,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum TypeArg {
    Personal,
    Office,
}

impl From<TypeArg> for CategoryType {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::Personal => CategoryType::Personal,
            TypeArg::Office => CategoryType::Office,
        }
    }
}

#[derive(Subcommand)]
pub enum EndpointCommands {
    /// Print the current URL.
    Show,
    /// Validate and store a new URL.
    Set { url: String },
}

#[derive(Subcommand)]
pub enum NameCommands {
    List,
    Add { name: String },
    Remove { name: String },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Send the tag and bank lists to the sheet.
    Push,
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Totals for spending, income and the personal/office split.
    Summary {
        /// YYYY-MM
        #[arg(long)]
        month: Option<String>,
        #[arg(long)]
        bank: Option<String>,
    },
    /// Spending by tag.
    Tags {
        #[arg(long)]
        month: Option<String>,
        #[arg(long)]
        bank: Option<String>,
    },
    /// Spent and received over time.
    Trend {
        #[arg(long)]
        month: Option<String>,
        #[arg(long)]
        bank: Option<String>,
    },
    /// Spent and received per bank.
    Banks {
        #[arg(long)]
        month: Option<String>,
        #[arg(long)]
        bank: Option<String>,
    },
    /// Months present in history.
    Months,
}
