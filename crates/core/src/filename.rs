use crate::timestamp::{has_canonical_shape, CanonicalTimestamp};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};

const CAPTURE_DATE_FORMAT: &str = "%Y-%m-%d %H.%M.%S";
const CAPTURE_DATE_LEN: usize = 19;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    path: PathBuf,
    basename: String,
}

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let basename = path.file_name()?.to_string_lossy().to_string();
        Some(Self { path, basename })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    pub fn extension_lower(&self) -> String {
        self.path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
            .unwrap_or_default()
    }

    pub fn renamed_to(&self, stem: &str) -> PathBuf {
        self.dir()
            .join(format!("{}{}", stem, self.extension_lower()))
    }
}

pub fn split_basename(basename: &str) -> Option<(&str, &str)> {
    basename.rsplit_once('.')
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureNaming {
    prefix: String,
}

impl CaptureNaming {
    pub fn new(prefix: impl Into<String>) -> Option<Self> {
        let prefix = prefix.into();
        let trimmed = prefix.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            prefix: trimmed.to_string(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn parse(&self, basename: &str) -> Option<CanonicalTimestamp> {
        let rest = basename.strip_prefix(&self.prefix)?.strip_prefix(' ')?;
        let date = rest.get(..CAPTURE_DATE_LEN)?;
        NaiveDateTime::parse_from_str(date, CAPTURE_DATE_FORMAT)
            .ok()
            .map(CanonicalTimestamp::from_naive)
    }
}

pub fn filename_candidate(
    basename: &str,
    capture: Option<&CaptureNaming>,
) -> Option<CanonicalTimestamp> {
    if let Some(ts) = capture.and_then(|c| c.parse(basename)) {
        return Some(ts);
    }
    let (stem, _) = split_basename(basename)?;
    CanonicalTimestamp::parse(stem).ok()
}

pub fn ctime_candidate(basename: &str) -> Option<CanonicalTimestamp> {
    if basename.len() == 4 && basename.bytes().all(|b| b.is_ascii_digit()) {
        let year = basename.parse::<i32>().ok()?;
        let naive = NaiveDate::from_ymd_opt(year, 1, 2)?.and_hms_opt(12, 0, 0)?;
        return Some(CanonicalTimestamp::from_naive(naive));
    }

    let bytes = basename.as_bytes();
    (0..bytes.len())
        .filter(|start| basename.is_char_boundary(*start))
        .filter_map(|start| basename.get(start..start + 19))
        .filter(|window| has_canonical_shape(window))
        .find_map(|window| CanonicalTimestamp::parse(window).ok())
}
