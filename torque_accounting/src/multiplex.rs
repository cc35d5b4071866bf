//! Collect-then-fold: every line of every input is parsed and kept first, then the events are
//! sorted by time and folded into one [`JobRecord`] per job id.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::{
    event::{AccountingEvent, JobId, LogTimeZone, MalformedEntry, RecordType},
    job::{JobRecord, Transition},
    report::JobRow,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventFilter {
    #[default]
    All,
    /// Only `E` records reach the jobs, everything else is dropped before dispatch.
    EndedOnly,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Builder)]
#[builder(default, setter(into))]
pub struct ReconstructOptions {
    pub filter: EventFilter,
    pub time_zone: LogTimeZone,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconstructError {
    #[error("no usable accounting entry among {lines} lines")]
    NoUsableInput { lines: usize },
}

/// Counters over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub lines: usize,
    pub blank: usize,
    pub malformed: usize,
    /// license, checkpoint and continue records
    pub markers: usize,
    /// dropped by [`EventFilter::EndedOnly`]
    pub filtered: usize,
    pub dispatched: usize,
    pub record_only: usize,
    pub unparsable_fields: usize,
    pub payload_errors: usize,
}

impl IngestStats {
    /// Lines that parsed as an accounting event, whether or not they were dispatched.
    pub fn well_formed(&self) -> usize {
        self.lines - self.blank - self.malformed
    }
}

/// First phase: parses lines from any number of sources and holds on to the events.
#[derive(Debug, Default)]
pub struct EventCollector {
    options: ReconstructOptions,
    events: Vec<AccountingEvent>,
    period: Option<(DateTime<Utc>, DateTime<Utc>)>,
    stats: IngestStats,
}

impl EventCollector {
    pub fn new(options: ReconstructOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// A malformed line changes nothing but the counters.
    pub fn push_line(&mut self, line: &str) -> Result<(), MalformedEntry> {
        self.stats.lines += 1;
        if line.trim().is_empty() {
            self.stats.blank += 1;
            return Ok(());
        }

        let event = AccountingEvent::parse(line, self.options.time_zone).inspect_err(|_| self.stats.malformed += 1)?;
        self.period = Some(match self.period {
            None => (event.timestamp, event.timestamp),
            Some((first, last)) => (first.min(event.timestamp), last.max(event.timestamp)),
        });

        if event.record_type.is_marker() {
            trace!(record_type = %event.record_type, "dropping marker record");
            self.stats.markers += 1;
        } else if self.options.filter == EventFilter::EndedOnly && event.record_type != RecordType::Ended {
            self.stats.filtered += 1;
        } else {
            self.events.push(event);
        }
        Ok(())
    }

    /// Feeds a whole source, logging and skipping malformed lines.
    pub fn extend_lines<I, S>(&mut self, source: &str, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for (i, line) in lines.into_iter().enumerate() {
            if let Err(e) = self.push_line(line.as_ref()) {
                warn!(source, line = i + 1, "skipping malformed accounting entry: {e}");
            }
        }
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Second phase: sorts everything collected by time and dispatches it. The sort is stable,
    /// events with equal timestamps keep their input order.
    pub fn finish(self) -> Result<JobTable, ReconstructError> {
        let EventCollector {
            mut events,
            period,
            stats,
            ..
        } = self;
        if stats.well_formed() == 0 {
            return Err(ReconstructError::NoUsableInput { lines: stats.lines });
        }

        events.sort_by_key(|event| event.timestamp);

        let mut table = JobTable {
            period,
            stats,
            ..JobTable::default()
        };
        for event in &events {
            table.dispatch(event);
        }

        let stats = &table.stats;
        info!(
            jobs = table.len(),
            lines = stats.lines,
            dispatched = stats.dispatched,
            malformed = stats.malformed,
            filtered = stats.filtered,
            "reconstructed jobs"
        );
        Ok(table)
    }
}

/// One record per job id, in order of first sighting.
#[derive(Debug, Clone, Default)]
pub struct JobTable {
    jobs: Vec<JobRecord>,
    index: HashMap<JobId, usize>,
    period: Option<(DateTime<Utc>, DateTime<Utc>)>,
    stats: IngestStats,
}

impl JobTable {
    /// Routes the event to its job, creating the job on first sight. Events for one job must
    /// arrive in time order.
    pub fn dispatch(&mut self, event: &AccountingEvent) -> &JobRecord {
        let idx = match self.index.get(&event.job_id) {
            Some(&idx) => idx,
            None => {
                self.jobs.push(JobRecord::new(event.job_id.clone()));
                self.index.insert(event.job_id.clone(), self.jobs.len() - 1);
                self.jobs.len() - 1
            }
        };

        let step = std::mem::take(&mut self.jobs[idx]).transition(event);
        self.stats.dispatched += 1;
        if step.transition == Transition::RecordOnly {
            self.stats.record_only += 1;
            debug!(job = %event.job_id, record_type = %event.record_type, status = ?step.record.status(), "record only");
        }
        for issue in &step.unparsable {
            debug!(job = %event.job_id, "defaulting field: {issue}");
        }
        self.stats.unparsable_fields += step.unparsable.len();
        if let Some(e) = &step.payload_error {
            self.stats.payload_errors += 1;
            warn!(job = %event.job_id, record_type = %event.record_type, "keeping previous fields: {e}");
        }

        self.jobs[idx] = step.record;
        &self.jobs[idx]
    }

    pub fn get(&self, job_id: &str) -> Option<&JobRecord> {
        self.index.get(job_id).map(|&idx| &self.jobs[idx])
    }

    pub fn jobs(&self) -> impl Iterator<Item = &JobRecord> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Earliest and latest timestamp of any well-formed line.
    pub fn period(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.period
    }

    pub fn period_seconds(&self) -> u64 {
        self.period
            .map(|(first, last)| u64::try_from((last - first).num_seconds()).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Per-job table, ordered by the time of each job's last applied record.
    pub fn rows(&self) -> Vec<JobRow> {
        let mut jobs: Vec<&JobRecord> = self.jobs.iter().collect();
        jobs.sort_by_key(|job| job.timestamp());
        jobs.into_iter().map(JobRow::from).collect()
    }
}
