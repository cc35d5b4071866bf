mod cli;
mod config;
mod input;
mod output;

use std::fs;

use clap::Parser as _;
use color_eyre::{
    eyre::{eyre, Context},
    Result,
};
use torque_accounting::{utilization, AggregateError, EventCollector, NodeCapacity, NodeUsage, UserBilling};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    cli::Args,
    config::Settings,
    output::{write_rows, ReportPaths},
};

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let settings = Settings::new(&args).wrap_err("loading settings")?;
    register_logging(&settings.log_level)?;

    let paths = input::expand(&args.files, args.pattern)?;
    let mut collector = EventCollector::new(settings.reconstruct_options());
    input::collect_all(&paths, &mut collector)?;
    let table = collector.finish()?;

    let base = input::base_name(args.files.first().map(String::as_str).unwrap_or_default());
    let report = ReportPaths::new(&settings.output_dir, &base);

    write_rows(&report.jobs, table.rows(), settings.headers)?;

    match NodeUsage::collect(table.jobs()) {
        Ok(usage) => {
            write_rows(&report.usage, usage.rows(), settings.headers)?;

            let authoritative = settings
                .node_capacity
                .as_deref()
                .map(|path| {
                    fs::read_to_string(path)
                        .wrap_err_with(|| format!("reading nodes file {}", path.display()))
                        .map(|content| NodeCapacity::from_nodes_file(&content))
                })
                .transpose()?;
            let capacity = NodeCapacity::resolve(authoritative, table.jobs());
            write_rows(
                &report.nodes,
                utilization(&usage, &capacity, table.period_seconds()),
                settings.headers,
            )?;
        }
        Err(AggregateError::EmptyResultSet) => {
            warn!("no job ended in the given period, skipping the node usage and utilization tables");
        }
    }

    write_rows(&report.users, UserBilling::collect(table.jobs()).rows(), settings.headers)?;

    info!(jobs = table.len(), "done");
    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn register_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level `{level}`"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| eyre!("setting default subscriber failed: {e}"))
}
