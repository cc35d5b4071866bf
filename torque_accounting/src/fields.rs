use std::{collections::HashMap, str::FromStr};

use derive_more::derive::Deref;
use thiserror::Error;

use crate::{
    event::RecordType,
    exec_host::ExecHost,
    misc::parsing::{parse_hms, parse_kilobytes, HmsParseError, KilobyteParseError, UnparsableField},
};

/// Failure of the message as a whole. The event's field updates are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("text `{0}` precedes the first `name=` marker")]
    UnattributedText(String),
}

/// Flat `name → raw value` view of an accounting message, borrowing from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref)]
pub struct Attributes<'a>(HashMap<&'a str, &'a str>);

impl<'a> Attributes<'a> {
    /// Every whitespace-delimited token containing `=` is a marker; its name is everything up to
    /// the token's last `=`. A value runs from the marker to the next marker, trailing whitespace
    /// stripped. Repeated names keep the last value.
    pub fn parse(message: &'a str) -> Result<Self, PayloadError> {
        let mut attributes = HashMap::new();
        let mut open: Option<(&'a str, usize)> = None;

        let mut close = |open: Option<(&'a str, usize)>, end: usize| {
            if let Some((name, start)) = open {
                if !name.is_empty() {
                    attributes.insert(name, message[start..end].trim_end());
                }
            }
        };

        for (offset, token) in tokens(message) {
            match token.rfind('=') {
                Some(eq) => {
                    close(open.take(), offset);
                    open = Some((&token[..eq], offset + eq + 1));
                }
                None if open.is_none() => return Err(PayloadError::UnattributedText(token.to_owned())),
                None => {}
            }
        }
        close(open, message.len());

        Ok(Attributes(attributes))
    }

    /// Missing attributes read as the empty string.
    pub fn text(&self, name: &str) -> &'a str {
        self.0.get(name).copied().unwrap_or_default()
    }
}

/// Whitespace-delimited tokens with their byte offset in `message`.
fn tokens(message: &str) -> Vec<(usize, &str)> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (i, c) in message.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                tokens.push((s, &message[s..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        tokens.push((s, &message[s..]));
    }
    tokens
}

/// Resource attributes of a job as parsed from a single accounting record. Applying a record
/// replaces all of them at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFields {
    pub user: String,
    pub group: String,
    /// `owner` normally, the `requestor` on a deletion record
    pub owner: String,
    pub queue: String,
    pub job_name: String,
    pub exit_code: i32,
    pub ctime: i64,
    pub qtime: i64,
    pub etime: i64,
    pub start: i64,
    pub end: i64,
    pub exec_host: ExecHost,
    pub req_cpus: u32,
    /// seconds
    pub cpu_time: u64,
    pub memory_kb: u64,
    /// seconds
    pub wall_time: u64,
}

impl JobFields {
    pub fn parse(record_type: RecordType, message: &str) -> Result<(Self, Vec<UnparsableField>), PayloadError> {
        let attributes = Attributes::parse(message)?;
        let mut convert = Conversions {
            attributes: &attributes,
            issues: Vec::new(),
        };

        let (exec_host, mut issues) = ExecHost::parse(attributes.text("exec_host"));
        let req_cpus = match exec_host.total_cores() {
            0 => match convert.number::<u32>("total_execution_slots") {
                0 => convert.number("Resource_List.ncpus"),
                slots => slots,
            },
            cores => cores,
        };

        let fields = JobFields {
            user: attributes.text("user").to_owned(),
            group: attributes.text("group").to_owned(),
            owner: match record_type {
                RecordType::Deleted => attributes.text("requestor"),
                _ => attributes.text("owner"),
            }
            .to_owned(),
            queue: attributes.text("queue").to_owned(),
            job_name: attributes.text("jobname").to_owned(),
            exit_code: convert.number("Exit_status"),
            ctime: convert.number("ctime"),
            qtime: convert.number("qtime"),
            etime: convert.number("etime"),
            start: convert.number("start"),
            end: convert.number("end"),
            exec_host,
            req_cpus,
            cpu_time: convert.duration("resources_used.cput"),
            memory_kb: convert.kilobytes("resources_used.mem"),
            wall_time: convert.duration("resources_used.walltime"),
        };

        issues.append(&mut convert.issues);
        Ok((fields, issues))
    }

    pub fn req_nodes(&self) -> usize {
        self.exec_host.nodes()
    }
}

/// Typed lookups that default absent values silently and garbled values with a recorded issue.
struct Conversions<'a, 'm> {
    attributes: &'a Attributes<'m>,
    issues: Vec<UnparsableField>,
}

impl Conversions<'_, '_> {
    fn number<T>(&mut self, name: &str) -> T
    where
        T: FromStr + Default,
        T::Err: std::fmt::Display,
    {
        let raw = self.attributes.text(name);
        if raw.is_empty() {
            return T::default();
        }
        raw.parse().unwrap_or_else(|e| {
            self.issues.push(UnparsableField::new(name, raw, e));
            T::default()
        })
    }

    fn duration(&mut self, name: &str) -> u64 {
        let raw = self.attributes.text(name);
        match parse_hms(raw) {
            Ok(secs) => secs,
            Err(HmsParseError::Empty) => 0,
            Err(e) => {
                self.issues.push(UnparsableField::new(name, raw, e));
                0
            }
        }
    }

    fn kilobytes(&mut self, name: &str) -> u64 {
        let raw = self.attributes.text(name);
        match parse_kilobytes(raw) {
            Ok(kb) => kb,
            Err(KilobyteParseError::Empty) if raw.trim().is_empty() => 0,
            Err(e) => {
                self.issues.push(UnparsableField::new(name, raw, e));
                0
            }
        }
    }
}
