use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, Timelike};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

pub const CANONICAL_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

const CANONICAL_LEN: usize = 19;

const LEGACY_FORMATS: &[&str] = &[
    "%Y:%m:%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("not a canonical timestamp (YYYY-MM-DD_HH-MM-SS): {0:?}")]
    NotCanonical(String),
    #[error("timestamp has an invalid date or time: {0:?}")]
    OutOfRange(String),
    #[error("unrecognized timestamp: {0:?}")]
    Unrecognized(String),
}

#[derive(Debug, Clone)]
pub struct CanonicalTimestamp {
    text: String,
    naive: NaiveDateTime,
}

impl CanonicalTimestamp {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        if !has_canonical_shape(input) {
            return Err(ParseError::NotCanonical(input.to_string()));
        }
        let naive = NaiveDateTime::parse_from_str(input, CANONICAL_FORMAT)
            .map_err(|_| ParseError::OutOfRange(input.to_string()))?;
        Ok(Self::from_naive(naive))
    }

    pub fn format(instant: DateTime<Local>, shift: TimeDelta) -> Option<Self> {
        instant
            .naive_local()
            .checked_add_signed(shift)
            .map(Self::from_naive)
    }

    pub fn from_naive(naive: NaiveDateTime) -> Self {
        let naive = naive.with_nanosecond(0).unwrap_or(naive);
        Self {
            text: naive.format(CANONICAL_FORMAT).to_string(),
            naive,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn naive(&self) -> NaiveDateTime {
        self.naive
    }

    pub fn shifted(&self, delta: TimeDelta) -> Option<Self> {
        self.naive.checked_add_signed(delta).map(Self::from_naive)
    }

    pub fn plus_minutes(&self, minutes: usize) -> Option<Self> {
        let minutes = i64::try_from(minutes).ok()?;
        self.shifted(TimeDelta::try_minutes(minutes)?)
    }
}

impl PartialEq for CanonicalTimestamp {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for CanonicalTimestamp {}

impl Hash for CanonicalTimestamp {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl fmt::Display for CanonicalTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for CanonicalTimestamp {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

pub fn parse_base_time(input: &str) -> Result<CanonicalTimestamp, ParseError> {
    let trimmed = input.trim();
    if let Ok(ts) = CanonicalTimestamp::parse(trimmed) {
        return Ok(ts);
    }

    LEGACY_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(CanonicalTimestamp::from_naive)
        .ok_or_else(|| ParseError::Unrecognized(input.to_string()))
}

pub fn sanitize_tool_output(raw: &str) -> String {
    raw.lines()
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-' || *c == '_')
        .collect()
}

pub(crate) fn has_canonical_shape(input: &str) -> bool {
    let bytes = input.as_bytes();
    if bytes.len() != CANONICAL_LEN {
        return false;
    }
    bytes.iter().enumerate().all(|(i, b)| match i {
        4 | 7 | 13 | 16 => *b == b'-',
        10 => *b == b'_',
        _ => b.is_ascii_digit(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeShift(String);

impl TimeShift {
    pub fn new(value: Option<&str>) -> Self {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => Self(v.to_string()),
            None => Self::default(),
        }
    }

    pub fn as_arg(&self) -> &str {
        &self.0
    }
}

impl Default for TimeShift {
    fn default() -> Self {
        Self("0".to_string())
    }
}
