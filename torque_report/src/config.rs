use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use torque_accounting::{EventFilter, LogTimeZone, ReconstructOptions};

use crate::cli::Args;

const DEFAULT_CONFIG_FILE: &str = "torque_report";
const DEFAULT_OUTPUT_DIR: &str = ".";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    /// replay every record instead of only `E`
    pub full: bool,
    pub time_zone: LogTimeZone,
    pub output_dir: PathBuf,
    pub headers: bool,
    pub node_capacity: Option<PathBuf>,
    pub log_level: String,
}

impl Settings {
    /// Defaults, then `torque_report.toml` (or `--config`), then `TORQUE_*`, then the flags.
    pub fn new(args: &Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => File::from(path.as_path()).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let builder = Config::builder()
            .set_default("full", false)?
            .set_default("time_zone", "local")?
            .set_default("output_dir", DEFAULT_OUTPUT_DIR)?
            .set_default("headers", true)?
            .set_default("log_level", DEFAULT_LOG_LEVEL)?
            .add_source(file)
            .add_source(Environment::with_prefix("TORQUE").try_parsing(true))
            // flags only override when given
            .set_override_option("full", args.full.then_some(true))?
            .set_override_option("time_zone", args.time_zone.map(|zone| zone.as_str()))?
            .set_override_option(
                "output_dir",
                args.output_dir.as_ref().map(|dir| dir.to_string_lossy().into_owned()),
            )?
            .set_override_option("headers", args.no_headers.then_some(false))?
            .set_override_option(
                "node_capacity",
                args.node_capacity.as_ref().map(|path| path.to_string_lossy().into_owned()),
            )?
            .set_override_option("log_level", args.log_level.clone())?
            .build()?;

        builder.try_deserialize()
    }

    pub fn reconstruct_options(&self) -> ReconstructOptions {
        ReconstructOptions {
            filter: if self.full { EventFilter::All } else { EventFilter::EndedOnly },
            time_zone: self.time_zone,
        }
    }
}
