//! One accounting line: `<MM/DD/YYYY HH:MM:SS>;<type>;<job id>;<key=value ...>`

use std::{borrow::Borrow, fmt};

use chrono::{DateTime, NaiveDateTime, TimeZone as _, Utc};
use derive_more::derive::{Deref, Display, From, Into};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::JobStatus;

pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Deref, Into, From, Display, Serialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Borrow<str> for JobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Record types of the Torque accounting log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RecordType {
    /// `L`: license information, the job id field holds license text
    License,
    Queued,
    Started,
    Ended,
    Deleted,
    Rerun,
    Aborted,
    Checkpointed,
    /// `T`: job restarted from a checkpoint
    Continued,
}

impl RecordType {
    pub fn from_code(code: &str) -> Option<Self> {
        use RecordType::*;
        Some(match code {
            "L" => License,
            "Q" => Queued,
            "S" => Started,
            "E" => Ended,
            "D" => Deleted,
            "R" => Rerun,
            "A" => Aborted,
            "C" => Checkpointed,
            "T" => Continued,
            _ => return None,
        })
    }

    pub fn code(self) -> char {
        use RecordType::*;
        match self {
            License => 'L',
            Queued => 'Q',
            Started => 'S',
            Ended => 'E',
            Deleted => 'D',
            Rerun => 'R',
            Aborted => 'A',
            Checkpointed => 'C',
            Continued => 'T',
        }
    }

    /// Records that never reach a job: license lines and checkpoint/continue markers.
    pub fn is_marker(self) -> bool {
        matches!(self, Self::License | Self::Checkpointed | Self::Continued)
    }

    /// Lifecycle phase a job enters when this record applies. A rerun re-enters the queue.
    pub fn status(self) -> Option<JobStatus> {
        use RecordType::*;
        match self {
            Queued | Rerun => Some(JobStatus::Queued),
            Started => Some(JobStatus::Started),
            Ended => Some(JobStatus::Ended),
            Deleted => Some(JobStatus::Deleted),
            Aborted => Some(JobStatus::Aborted),
            License | Checkpointed | Continued => None,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Zone the server wrote its timestamps in. Torque logs server-local time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTimeZone {
    #[default]
    Local,
    Utc,
}

impl LogTimeZone {
    /// `None` for local times skipped by a DST transition. Ambiguous times take the earlier
    /// instant.
    pub fn to_utc(self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            LogTimeZone::Utc => Some(naive.and_utc()),
            LogTimeZone::Local => chrono::Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|local| local.to_utc()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEntry {
    #[error("expected at least 3 `;`-separated fields, found {found}")]
    TooFewFields { found: usize },
    #[error("unknown record type `{0}`")]
    UnknownRecordType(String),
    #[error("cannot parse timestamp `{raw}`: {source}")]
    Timestamp {
        raw: String,
        source: chrono::ParseError,
    },
    #[error("local time `{0}` does not exist in this time zone")]
    NonexistentLocalTime(NaiveDateTime),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountingEvent {
    pub timestamp: DateTime<Utc>,
    pub record_type: RecordType,
    pub job_id: JobId,
    /// everything after the third `;`, untouched
    pub message: String,
}

impl AccountingEvent {
    pub fn parse(line: &str, zone: LogTimeZone) -> Result<Self, MalformedEntry> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut fields = line.splitn(4, ';');
        let (Some(timestamp), Some(code), Some(job_id)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(MalformedEntry::TooFewFields {
                found: line.split(';').count(),
            });
        };

        let record_type =
            RecordType::from_code(code.trim()).ok_or_else(|| MalformedEntry::UnknownRecordType(code.to_owned()))?;
        let naive = NaiveDateTime::parse_from_str(timestamp.trim(), TIMESTAMP_FORMAT).map_err(|source| {
            MalformedEntry::Timestamp {
                raw: timestamp.to_owned(),
                source,
            }
        })?;
        let timestamp = zone.to_utc(naive).ok_or(MalformedEntry::NonexistentLocalTime(naive))?;

        Ok(AccountingEvent {
            timestamp,
            record_type,
            job_id: JobId::from(job_id),
            message: fields.next().unwrap_or_default().to_owned(),
        })
    }
}
