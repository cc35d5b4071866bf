use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Converts Torque accounting logs into per-job, per-node and per-user CSV tables.
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(version, about)]
pub struct Args {
    /// Accounting files (`server_priv/accounting/YYYYMMDD`, optionally `.gz`)
    #[arg(required = true)]
    pub files: Vec<String>,

    /// Treat every FILE as a prefix, e.g. `2024` matches `20240101`, `20240102.gz`, ...
    #[arg(short, long)]
    pub pattern: bool,

    /// Replay every record type, not just the `E` records
    #[arg(short, long)]
    pub full: bool,

    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Zone the server wrote its timestamps in
    #[arg(long, value_enum)]
    pub time_zone: Option<TimeZoneArg>,

    /// Torque `server_priv/nodes` file with the cores per node. Estimated from the log otherwise.
    #[arg(long)]
    pub node_capacity: Option<PathBuf>,

    /// Omit the header row of every table
    #[arg(long)]
    pub no_headers: bool,

    /// Settings file, instead of `./torque_report.toml`
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// `info`, `debug`, ... or any `RUST_LOG` style directive
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TimeZoneArg {
    Local,
    Utc,
}

impl TimeZoneArg {
    /// Spelled the way [`torque_accounting::LogTimeZone`] deserializes.
    pub fn as_str(self) -> &'static str {
        match self {
            TimeZoneArg::Local => "local",
            TimeZoneArg::Utc => "utc",
        }
    }
}
