use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    event::{AccountingEvent, JobId, RecordType},
    fields::{JobFields, PayloadError},
    misc::parsing::UnparsableField,
    node::CoreSeconds,
};

/// Lifecycle phase of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum JobStatus {
    /// created, no record applied yet
    #[default]
    Unset,
    Queued,
    Started,
    Ended,
    Deleted,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// parse the record, replace all fields, move to the record's status
    Apply,
    /// only append to the history
    RecordOnly,
}

impl Transition {
    /// The complete transition table.
    ///
    /// `Ended` absorbs everything. A queue record never overwrites a started job, markers only
    /// extend the history.
    pub fn lookup(current: JobStatus, incoming: RecordType) -> Self {
        use JobStatus as S;
        use RecordType as R;

        match (current, incoming) {
            (S::Ended, _) => Transition::RecordOnly,
            (_, R::License | R::Checkpointed | R::Continued) => Transition::RecordOnly,
            (S::Started, R::Queued) => Transition::RecordOnly,
            (
                S::Unset | S::Queued | S::Started | S::Deleted | S::Aborted,
                R::Queued | R::Started | R::Ended | R::Deleted | R::Rerun | R::Aborted,
            ) => Transition::Apply,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub record_type: RecordType,
}

/// Everything known about one job. Only changed through [`JobRecord::transition`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobRecord {
    job_id: JobId,
    status: JobStatus,
    /// time of the last applied record
    timestamp: Option<DateTime<Utc>>,
    /// type of the last applied record, `R` stays `R` here while the status is `Queued`
    last_applied: Option<RecordType>,
    history: Vec<HistoryEntry>,
    fields: JobFields,
    usage: Option<BTreeMap<String, CoreSeconds>>,
}

/// Result of feeding one event to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub record: JobRecord,
    pub transition: Transition,
    /// fields that fell back to their default
    pub unparsable: Vec<UnparsableField>,
    /// set when the message could not be split into attributes at all; fields were kept
    pub payload_error: Option<PayloadError>,
}

impl JobRecord {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            ..Self::default()
        }
    }

    /// Pure transition `(record, event) → record`. The event is always appended to the history,
    /// whether it changes anything else is decided by [`Transition::lookup`].
    pub fn transition(mut self, event: &AccountingEvent) -> Step {
        let transition = Transition::lookup(self.status, event.record_type);
        self.history.push(HistoryEntry {
            timestamp: event.timestamp,
            record_type: event.record_type,
        });

        let mut unparsable = Vec::new();
        let mut payload_error = None;
        if transition == Transition::Apply {
            match JobFields::parse(event.record_type, &event.message) {
                Ok((fields, issues)) => {
                    self.fields = fields;
                    unparsable = issues;
                }
                Err(e) => payload_error = Some(e),
            }
            if let Some(status) = event.record_type.status() {
                self.status = status;
            }
            self.timestamp = Some(event.timestamp);
            self.last_applied = Some(event.record_type);

            if self.status == JobStatus::Ended {
                // reserved, not consumed: cores × walltime
                self.usage = Some(
                    self.fields
                        .exec_host
                        .cores()
                        .iter()
                        .map(|(node, &cores)| {
                            (node.clone(), CoreSeconds(u64::from(cores).saturating_mul(self.fields.wall_time)))
                        })
                        .collect(),
                );
            }
        }

        Step {
            record: self,
            transition,
            unparsable,
            payload_error,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn last_applied(&self) -> Option<RecordType> {
        self.last_applied
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Codes of all records seen for this job, in order, e.g. `QSE`.
    pub fn status_string(&self) -> String {
        self.history.iter().map(|entry| entry.record_type.code()).collect()
    }

    pub fn fields(&self) -> &JobFields {
        &self.fields
    }

    /// Reserved core-seconds per node. `Some` exactly when the job has ended.
    pub fn usage(&self) -> Option<&BTreeMap<String, CoreSeconds>> {
        self.usage.as_ref()
    }

    /// Who to attribute the job to: the requestor for deletions, the user otherwise.
    pub fn account(&self) -> &str {
        match self.status {
            JobStatus::Deleted => &self.fields.owner,
            _ => &self.fields.user,
        }
    }
}
