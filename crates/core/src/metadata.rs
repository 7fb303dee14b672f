use crate::timestamp::{sanitize_tool_output, CanonicalTimestamp, TimeShift, CANONICAL_FORMAT};
use chrono::{DateTime, Local, TimeDelta};
use exiftool::ExifTool;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const TAG_DEFAULT: &str = "DateTimeOriginal";
pub const TAG_CREATE: &str = "CreateDate";
pub const TAG_MODIFY: &str = "ModifyDate";
pub const TAG_IMOVIE: &str = "CreationDate-jpn-JP";
pub const TAG_MP4: &str = "MediaCreateDate";

pub const WRITE_TARGET_TAGS: &[&str] = &[TAG_DEFAULT, TAG_CREATE, TAG_MODIFY];

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("exiftool is not available")]
    Unavailable,
    #[error("exiftool failed to read the file")]
    Tool(#[from] exiftool::ExifToolError),
}

pub trait MetadataReader {
    fn read_tags(
        &mut self,
        path: &Path,
        tags: &[&str],
        shift: &TimeShift,
    ) -> Result<String, MetadataError>;
}

pub struct ExifToolReader {
    executable: Option<PathBuf>,
    exiftool: Option<ExifTool>,
    unavailable: bool,
}

impl ExifToolReader {
    pub fn new(executable: Option<PathBuf>) -> Self {
        Self {
            executable,
            exiftool: None,
            unavailable: false,
        }
    }

    fn exiftool(&mut self) -> Result<&mut ExifTool, MetadataError> {
        if self.exiftool.is_none() && !self.unavailable {
            let started = match &self.executable {
                Some(path) => ExifTool::with_executable(path),
                None => ExifTool::new(),
            };
            match started {
                Ok(et) => self.exiftool = Some(et),
                Err(err) => {
                    debug!(error = %err, "exiftool could not be started");
                    self.unavailable = true;
                }
            }
        }
        self.exiftool.as_mut().ok_or(MetadataError::Unavailable)
    }
}

impl MetadataReader for ExifToolReader {
    fn read_tags(
        &mut self,
        path: &Path,
        tags: &[&str],
        shift: &TimeShift,
    ) -> Result<String, MetadataError> {
        let args = read_args(tags, shift);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        let json = self.exiftool()?.json(path, &args)?;
        Ok(first_populated(&json, tags).unwrap_or_default())
    }
}

fn read_args(tags: &[&str], shift: &TimeShift) -> Vec<String> {
    let mut args = vec![
        "-d".to_string(),
        CANONICAL_FORMAT.to_string(),
        "-globalTimeShift".to_string(),
        shift.as_arg().to_string(),
    ];
    args.extend(tags.iter().map(|tag| format!("-{tag}")));
    args
}

fn first_populated(json: &Value, tags: &[&str]) -> Option<String> {
    tags.iter().find_map(|tag| {
        let value = match json.get(*tag)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!value.is_empty()).then_some(value)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Tag,
    FallbackFileCreated,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCandidate {
    pub timestamp: Option<CanonicalTimestamp>,
    pub source: CandidateSource,
}

#[derive(Debug, Clone, Copy)]
pub struct TagQuery {
    pub tags: &'static [&'static str],
    pub sanitize: bool,
    pub fallback_to_filesystem: bool,
}

pub const SOURCE_QUERY: TagQuery = TagQuery {
    tags: &[TAG_DEFAULT, TAG_IMOVIE, TAG_MP4],
    sanitize: true,
    fallback_to_filesystem: true,
};

pub const TARGET_QUERY: TagQuery = TagQuery {
    tags: &[TAG_DEFAULT],
    sanitize: false,
    fallback_to_filesystem: false,
};

pub fn resolve_tag_candidate<R: MetadataReader + ?Sized>(
    reader: &mut R,
    path: &Path,
    query: &TagQuery,
    shift: &TimeShift,
) -> TagCandidate {
    let raw = reader
        .read_tags(path, query.tags, shift)
        .unwrap_or_else(|err| {
            debug!(path = %path.display(), error = %err, "metadata read degraded to empty");
            String::new()
        });

    let text = if query.sanitize {
        sanitize_tool_output(&raw)
    } else {
        raw.lines().next().unwrap_or_default().trim().to_string()
    };

    if !text.is_empty() {
        match CanonicalTimestamp::parse(&text) {
            Ok(ts) => {
                return TagCandidate {
                    timestamp: Some(ts),
                    source: CandidateSource::Tag,
                }
            }
            Err(err) => debug!(path = %path.display(), error = %err, "ignoring unusable tag value"),
        }
    }

    if query.fallback_to_filesystem {
        let created = filesystem_created(path)
            .and_then(|created| CanonicalTimestamp::format(created, TimeDelta::zero()));
        if let Some(timestamp) = created {
            return TagCandidate {
                timestamp: Some(timestamp),
                source: CandidateSource::FallbackFileCreated,
            };
        }
    }

    TagCandidate {
        timestamp: None,
        source: CandidateSource::Missing,
    }
}

pub fn filesystem_created(path: &Path) -> Option<DateTime<Local>> {
    let meta = fs::metadata(path).ok()?;
    let time = meta.created().or_else(|_| meta.modified()).ok()?;
    Some(DateTime::from(time))
}
