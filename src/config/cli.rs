use crate::config::toml_config::TomlConfig;
use crate::core::subscriptions::SortOption;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "subscritrack")]
#[command(about = "Track your channel subscriptions from the command line")]
pub struct CliConfig {
    #[arg(long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Base URL of the SubscriTrack API")]
    pub api_url: Option<String>,

    #[arg(long, global = true, help = "Directory holding the stored session")]
    pub session_dir: Option<String>,

    #[arg(long, global = true, help = "Per-request timeout in seconds")]
    pub timeout_seconds: Option<u64>,

    #[arg(long, short, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List the channels available for subscription
    Channels,
    /// List your subscriptions
    Subscriptions {
        #[arg(long, value_enum)]
        sort: Option<SortOption>,
    },
    /// Print a spending report
    Report {
        #[arg(value_enum)]
        kind: ReportKind,
    },
    /// Subscribe to a channel
    Enroll(EnrollArgs),
    /// Create a new account
    Signup(SignupArgs),
    /// Store the session carried by an OAuth redirect URL
    Login {
        #[arg(long)]
        redirect_url: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in account
    Whoami,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    Monthly,
    MonthToMonth,
}

#[derive(Debug, Clone, Args)]
pub struct EnrollArgs {
    #[arg(long)]
    pub channel_id: String,

    #[arg(long)]
    pub start_date: NaiveDate,

    #[arg(long, value_parser = parse_time)]
    pub start_time: Option<NaiveTime>,

    #[arg(long)]
    pub due_date: NaiveDate,

    #[arg(long, value_parser = parse_time)]
    pub due_time: Option<NaiveTime>,

    #[arg(long)]
    pub monthly_bill: f64,

    #[arg(long)]
    pub reminder_date: Option<NaiveDate>,

    #[arg(long, value_parser = parse_time)]
    pub reminder_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, Args)]
pub struct SignupArgs {
    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub password: String,

    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub given_name: String,

    #[arg(long)]
    pub family_name: String,
}

fn parse_time(raw: &str) -> std::result::Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|e| format!("expected HH:MM, got '{}': {}", raw, e))
}

impl CliConfig {
    /// 讀取 TOML（若有指定），套用命令列覆寫後驗證
    pub fn resolve(&self) -> Result<TomlConfig> {
        let mut settings = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };

        if let Some(url) = &self.api_url {
            settings.api.base_url = url.clone();
        }
        if let Some(dir) = &self.session_dir {
            settings.session.directory = dir.clone();
        }
        if let Some(timeout) = self.timeout_seconds {
            settings.api.timeout_seconds = Some(timeout);
        }

        settings.validate()?;
        Ok(settings)
    }
}
