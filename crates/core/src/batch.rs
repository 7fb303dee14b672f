use crate::executor::{CommandRunner, Executor};
use crate::filename::{ctime_candidate, filename_candidate, CaptureNaming, MediaFile};
use crate::metadata::{resolve_tag_candidate, MetadataReader, SOURCE_QUERY, TARGET_QUERY};
use crate::policy::{self, Action, Mode};
use crate::timestamp::TimeShift;
use anyhow::{Context, Result};
use globset::GlobBuilder;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

const GLOB_META: &[char] = &['*', '?', '[', '{'];

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub mode: Mode,
    pub force: bool,
    pub time_shift: TimeShift,
    pub capture: Option<CaptureNaming>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub processed: usize,
    pub skipped_missing: usize,
    pub actions: usize,
    pub failures: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

pub fn expand_paths(
    patterns: &[String],
    recursive: bool,
    include_hidden: bool,
) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for pattern in patterns {
        if recursive {
            out.extend(walk_recursive(Path::new(pattern), include_hidden));
        } else if pattern.contains(GLOB_META) {
            out.extend(expand_glob(pattern, include_hidden)?);
        } else {
            out.push(PathBuf::from(pattern));
        }
    }
    Ok(out)
}

fn walk_recursive(root: &Path, include_hidden: bool) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| include_hidden || entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(root = %root.display(), error = %err, "directory walk failed");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let has_extension = entry.file_name().to_string_lossy().contains('.');
        if has_extension {
            out.push(entry.into_path());
        }
    }
    out
}

fn expand_glob(pattern: &str, include_hidden: bool) -> Result<Vec<PathBuf>> {
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))?
        .compile_matcher();

    let (base, depth) = glob_base(pattern);
    let relative = base.as_os_str().is_empty();
    let root = if relative { Path::new(".") } else { base.as_path() };

    let mut out = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| include_hidden || entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        let Ok(entry) = entry else {
            continue;
        };
        let candidate = if relative {
            entry.path().strip_prefix(root).unwrap_or(entry.path())
        } else {
            entry.path()
        };
        if matcher.is_match(candidate) {
            out.push(candidate.to_path_buf());
        }
    }
    Ok(out)
}

fn glob_base(pattern: &str) -> (PathBuf, usize) {
    let mut base = PathBuf::new();
    let mut depth = 0usize;
    let mut in_glob = false;

    for component in Path::new(pattern).components() {
        let text = component.as_os_str().to_string_lossy();
        if !in_glob && !text.contains(GLOB_META) {
            base.push(component);
            continue;
        }
        in_glob = true;
        if matches!(component, Component::Normal(_)) && text == "**" {
            return (base, usize::MAX);
        }
        depth += 1;
    }
    (base, depth.max(1))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

pub fn plan_file<R: MetadataReader + ?Sized>(
    file: &MediaFile,
    index: usize,
    options: &BatchOptions,
    reader: &mut R,
) -> Vec<Action> {
    match &options.mode {
        Mode::MoveByTag => {
            let tag =
                resolve_tag_candidate(reader, file.path(), &SOURCE_QUERY, &options.time_shift);
            let name = filename_candidate(file.basename(), None);
            policy::move_by_tag(file, tag.timestamp.as_ref(), name.as_ref(), options.force)
        }
        Mode::WriteByFilename => {
            let tag =
                resolve_tag_candidate(reader, file.path(), &TARGET_QUERY, &options.time_shift);
            let name = filename_candidate(file.basename(), options.capture.as_ref());
            policy::write_by_filename(
                file,
                tag.timestamp.as_ref(),
                name.as_ref(),
                options.force,
            )
        }
        Mode::SetCtimeByFilename => {
            policy::set_ctime_by_filename(file, ctime_candidate(file.basename()).as_ref())
        }
        Mode::Compare => {
            let tag =
                resolve_tag_candidate(reader, file.path(), &SOURCE_QUERY, &options.time_shift);
            let name = filename_candidate(file.basename(), None);
            policy::compare(file, tag.timestamp.as_ref(), name.as_ref(), options.force)
        }
        Mode::Sequential { base } => match base.plus_minutes(index) {
            Some(assigned) => policy::sequential(file, &assigned),
            None => {
                warn!(file = %file.path().display(), index, "sequential time out of range");
                Vec::new()
            }
        },
    }
}

pub fn run_batch<R, C, O, E>(
    paths: &[PathBuf],
    options: &BatchOptions,
    reader: &mut R,
    executor: &mut Executor<C, O, E>,
    cancel: &CancellationToken,
) -> BatchStats
where
    R: MetadataReader + ?Sized,
    C: CommandRunner,
    O: Write,
    E: Write,
{
    let mut stats = BatchStats::default();

    for (index, path) in paths.iter().enumerate() {
        if cancel.is_cancelled() {
            stats.cancelled = true;
            break;
        }
        if !path.exists() {
            stats.skipped_missing += 1;
            continue;
        }
        let Some(file) = MediaFile::new(path.clone()) else {
            debug!(path = %path.display(), "no file name, skipping");
            continue;
        };

        stats.processed += 1;
        for action in plan_file(&file, index, options, reader) {
            stats.actions += 1;
            if let Err(err) = executor.perform(&action) {
                stats.failures += 1;
                warn!(file = %path.display(), error = %err, "action failed");
                break;
            }
        }
    }

    stats
}
