use std::fmt::Display;

use thiserror::Error;

/// A recognized attribute whose value failed type conversion. The field falls back to its default,
/// the rest of the event still applies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("attribute `{attribute}`: cannot convert `{value}` ({reason})")]
pub struct UnparsableField {
    pub attribute: String,
    pub value: String,
    pub reason: String,
}

impl UnparsableField {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>, reason: impl Display) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

pub mod duration {
    use std::num::ParseIntError;

    use thiserror::Error;

    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum HmsParseError {
        #[error("trying to parse an empty string")]
        Empty,
        #[error("component is not an unsigned integer")]
        InvalidComponent(#[from] ParseIntError),
        #[error("duration does not fit into 64 bits of seconds")]
        Overflow,
    }

    /// Parses Torque's `H*:MM:SS` notation (any number of `:`-separated components, least
    /// significant last) into seconds. A bare number is taken as seconds.
    pub fn parse_hms(input: &str) -> Result<u64, HmsParseError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(HmsParseError::Empty);
        }

        input.split(':').rev().enumerate().try_fold(0u64, |total, (i, component)| {
            let component: u64 = component.parse()?;
            let scale = u32::try_from(i)
                .ok()
                .and_then(|i| 60u64.checked_pow(i))
                .ok_or(HmsParseError::Overflow)?;
            component
                .checked_mul(scale)
                .and_then(|secs| total.checked_add(secs))
                .ok_or(HmsParseError::Overflow)
        })
    }

    /// Lenient variant: absent or garbled durations are zero seconds.
    pub fn hms_to_seconds(input: &str) -> u64 {
        parse_hms(input).unwrap_or(0)
    }
}

pub mod memory {
    use std::num::ParseIntError;

    use thiserror::Error;

    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum KilobyteParseError {
        #[error("trying to parse an empty string")]
        Empty,
        #[error("scalar part is not an unsigned integer")]
        InvalidInt(#[from] ParseIntError),
    }

    /// `<integer>kb` into kilobytes. The alphabetic unit suffix is stripped without looking at
    /// it, so `512mb` reads as 512.
    pub fn parse_kilobytes(input: &str) -> Result<u64, KilobyteParseError> {
        let scalar = input.trim().trim_end_matches(|c: char| c.is_ascii_alphabetic());
        if scalar.is_empty() {
            return Err(KilobyteParseError::Empty);
        }
        Ok(scalar.parse()?)
    }
}

pub use duration::{hms_to_seconds, parse_hms, HmsParseError};
pub use memory::{parse_kilobytes, KilobyteParseError};
