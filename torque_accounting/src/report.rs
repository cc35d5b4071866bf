//! Rows of the exported tables. Field order is column order, serde names are the headers.

use serde::{Serialize, Serializer};

use crate::{job::JobRecord, node::CoreSeconds};

/// A row of one exported table.
pub trait TableRow: Serialize {
    /// Header names, identical to what serde writes for the fields.
    const COLUMNS: &'static [&'static str];
}

fn two_decimals<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:.2}"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRow {
    /// last applied record, seconds since epoch
    pub timestamp: i64,
    pub jobid: String,
    pub owner: String,
    /// code of the last applied record, so a rerun job shows `R`
    pub status: String,
    pub exitcode: i32,
    pub queue: String,
    pub t_queue: i64,
    pub t_start: i64,
    pub t_end: i64,
    #[serde(rename = "#nodes")]
    pub nodes: usize,
    #[serde(rename = "#cores")]
    pub cores: u32,
    pub used_cputime: u64,
    #[serde(rename = "used_memory(kb)")]
    pub used_memory: u64,
    pub used_walltime: u64,
}

impl From<&JobRecord> for JobRow {
    fn from(job: &JobRecord) -> Self {
        let fields = job.fields();
        JobRow {
            timestamp: job.timestamp().map(|t| t.timestamp()).unwrap_or_default(),
            jobid: job.job_id().to_string(),
            owner: job.account().to_owned(),
            status: job.last_applied().map(|record| record.code().to_string()).unwrap_or_default(),
            exitcode: fields.exit_code,
            queue: fields.queue.clone(),
            t_queue: fields.ctime,
            t_start: fields.start,
            t_end: fields.end,
            nodes: fields.req_nodes(),
            cores: fields.req_cpus,
            used_cputime: fields.cpu_time,
            used_memory: fields.memory_kb,
            used_walltime: fields.wall_time,
        }
    }
}

impl TableRow for JobRow {
    const COLUMNS: &'static [&'static str] = &[
        "timestamp",
        "jobid",
        "owner",
        "status",
        "exitcode",
        "queue",
        "t_queue",
        "t_start",
        "t_end",
        "#nodes",
        "#cores",
        "used_cputime",
        "used_memory(kb)",
        "used_walltime",
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeUsageRow {
    pub node: String,
    pub reserved_core_seconds: CoreSeconds,
}

impl TableRow for NodeUsageRow {
    const COLUMNS: &'static [&'static str] = &["node", "reserved_core_seconds"];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserBillingRow {
    pub user: String,
    #[serde(rename = "used_cpuhours", serialize_with = "two_decimals")]
    pub used_cpu_hours: f64,
    #[serde(rename = "req_cpus*walltime_hours", serialize_with = "two_decimals")]
    pub requested_hours: f64,
    #[serde(serialize_with = "two_decimals")]
    pub pct_parallel: f64,
}

impl TableRow for UserBillingRow {
    const COLUMNS: &'static [&'static str] = &["user", "used_cpuhours", "req_cpus*walltime_hours", "pct_parallel"];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeUtilizationRow {
    pub node: String,
    pub cores: u32,
    pub reserved_core_seconds: CoreSeconds,
    pub available_core_seconds: CoreSeconds,
    #[serde(serialize_with = "two_decimals")]
    pub pct_utilized: f64,
}

impl TableRow for NodeUtilizationRow {
    const COLUMNS: &'static [&'static str] =
        &["node", "cores", "reserved_core_seconds", "available_core_seconds", "pct_utilized"];
}
