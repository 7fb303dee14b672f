mod batch;
mod config;
mod executor;
mod filename;
mod metadata;
mod policy;
mod timestamp;

pub use batch::{
    expand_paths, plan_file, run_batch, BatchOptions, BatchStats, CancellationToken,
};
pub use config::{
    app_paths, discover_capture_name, load_config, load_config_from, AppConfig, AppPaths,
};
pub use executor::{
    operations_for, CommandRunner, ExecError, ExecOptions, Executor, ExternalCommand, Operation,
    Platform, SystemRunner,
};
pub use filename::{
    ctime_candidate, filename_candidate, split_basename, CaptureNaming, MediaFile,
};
pub use metadata::{
    filesystem_created, resolve_tag_candidate, CandidateSource, ExifToolReader, MetadataError,
    MetadataReader, TagCandidate, TagQuery, SOURCE_QUERY, TARGET_QUERY, WRITE_TARGET_TAGS,
};
pub use policy::{
    compare, move_by_tag, sequential, set_ctime_by_filename, write_by_filename, Action, Mode,
};
pub use timestamp::{
    parse_base_time, sanitize_tool_output, CanonicalTimestamp, ParseError, TimeShift,
    CANONICAL_FORMAT,
};
