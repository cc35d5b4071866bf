//! Reconstructs Torque/PBS jobs from the server's accounting log
//! (`$PBS_HOME/server_priv/accounting/*`) and aggregates their resource usage per node and per
//! user.
//!
//! ```text
//! lines ─▶ EventCollector ─(sort)─▶ JobTable ─▶ NodeUsage / NodeCapacity / UserBilling
//! ```
pub mod event;
pub mod exec_host;
pub mod fields;
pub mod job;
pub mod misc {
    pub mod parsing;
}
pub mod multiplex;
pub mod node;
pub mod report;
pub mod user;

pub use event::{AccountingEvent, JobId, LogTimeZone, MalformedEntry, RecordType};
pub use job::{JobRecord, JobStatus, Transition};
pub use multiplex::{
    EventCollector, EventFilter, IngestStats, JobTable, ReconstructError, ReconstructOptions, ReconstructOptionsBuilder,
};
pub use node::{utilization, AggregateError, CoreSeconds, NodeCapacity, NodeUsage};
pub use user::{UserAggregate, UserBilling};

/// Collects and folds a single source in one go.
pub fn reconstruct<I, S>(lines: I, options: ReconstructOptions) -> Result<JobTable, ReconstructError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut collector = EventCollector::new(options);
    collector.extend_lines("input", lines);
    collector.finish()
}
