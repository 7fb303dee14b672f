use crate::policy::Action;
use crate::timestamp::{CanonicalTimestamp, CANONICAL_FORMAT};
use chrono::{Local, NaiveDateTime, TimeZone};
use filetime::FileTime;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Other
        }
    }

    pub fn native_time(self, value: &CanonicalTimestamp) -> String {
        let fmt = match self {
            Platform::MacOs => "%m/%d/%Y %H:%M:%S",
            Platform::Windows => "%Y/%m/%d %H:%M:%S",
            Platform::Other => "%Y-%m-%d %H:%M:%S",
        };
        value.naive().format(fmt).to_string()
    }
}

#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub dry_run: bool,
    pub quiet: bool,
    pub exiftool: PathBuf,
    pub platform: Platform,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            quiet: false,
            exiftool: PathBuf::from("exiftool"),
            platform: Platform::current(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Run(ExternalCommand),
    Rename { from: PathBuf, to: PathBuf },
    SetTimes { path: PathBuf, time: NaiveDateTime },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Run(cmd) => write!(f, "{cmd}"),
            Operation::Rename { from, to } => {
                write!(f, "mv \"{}\" \"{}\"", from.display(), to.display())
            }
            Operation::SetTimes { path, time } => write!(
                f,
                "touch -d \"{}\" \"{}\"",
                time.format("%Y-%m-%d %H:%M:%S"),
                path.display()
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start {program}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {status}")]
    Status { program: String, status: ExitStatus },
    #[error("failed to rename {} -> {}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to set file times on {}", path.display())]
    SetTimes {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0} does not exist in the local time zone")]
    NonexistentLocalTime(NaiveDateTime),
    #[error("failed to write report line")]
    Report(#[source] io::Error),
}

pub trait CommandRunner {
    fn execute(&mut self, operation: &Operation) -> Result<(), ExecError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn execute(&mut self, operation: &Operation) -> Result<(), ExecError> {
        match operation {
            Operation::Run(cmd) => {
                let status = Command::new(&cmd.program)
                    .args(&cmd.args)
                    .status()
                    .map_err(|source| ExecError::Spawn {
                        program: cmd.program.clone(),
                        source,
                    })?;
                if !status.success() {
                    return Err(ExecError::Status {
                        program: cmd.program.clone(),
                        status,
                    });
                }
                Ok(())
            }
            Operation::Rename { from, to } => {
                fs::rename(from, to).map_err(|source| ExecError::Rename {
                    from: from.clone(),
                    to: to.clone(),
                    source,
                })
            }
            Operation::SetTimes { path, time } => set_local_times(path, *time),
        }
    }
}

fn set_local_times(path: &Path, time: NaiveDateTime) -> Result<(), ExecError> {
    let local = Local
        .from_local_datetime(&time)
        .earliest()
        .ok_or(ExecError::NonexistentLocalTime(time))?;
    let ft = FileTime::from_unix_time(local.timestamp(), 0);
    filetime::set_file_times(path, ft, ft).map_err(|source| ExecError::SetTimes {
        path: path.to_path_buf(),
        source,
    })
}

pub fn operations_for(action: &Action, options: &ExecOptions) -> Vec<Operation> {
    match action {
        Action::Rename { from, to } => vec![Operation::Rename {
            from: from.clone(),
            to: to.clone(),
        }],
        Action::WriteTags { path, tags, value } => {
            let mut args = vec![
                "-F".to_string(),
                "-d".to_string(),
                CANONICAL_FORMAT.to_string(),
            ];
            args.extend(tags.iter().map(|tag| format!("-{tag}={value}")));
            args.push("-overwrite_original".to_string());
            args.push(path.display().to_string());
            vec![Operation::Run(ExternalCommand::new(
                options.exiftool.display().to_string(),
                args,
            ))]
        }
        Action::SetFileTimes { path, value } => set_times_operations(path, value, options.platform),
        Action::Report { .. } => Vec::new(),
    }
}

fn set_times_operations(
    path: &Path,
    value: &CanonicalTimestamp,
    platform: Platform,
) -> Vec<Operation> {
    let native = platform.native_time(value);
    let target = path.display().to_string();
    match platform {
        Platform::MacOs => ["-d", "-m"]
            .iter()
            .map(|flag| {
                Operation::Run(ExternalCommand::new(
                    "setfile",
                    [flag.to_string(), native.clone(), target.clone()],
                ))
            })
            .collect(),
        Platform::Windows => {
            let quoted = powershell_quote(&target);
            let script = format!(
                "Set-ItemProperty {quoted} -name CreationTime -value '{native}'; \
                 Set-ItemProperty {quoted} -name LastWriteTime -value '{native}';"
            );
            vec![Operation::Run(ExternalCommand::new(
                "powershell",
                [
                    "-NoProfile".to_string(),
                    "-ExecutionPolicy".to_string(),
                    "Unrestricted".to_string(),
                    "-Command".to_string(),
                    script,
                ],
            ))]
        }
        Platform::Other => vec![Operation::SetTimes {
            path: path.to_path_buf(),
            time: value.naive(),
        }],
    }
}

fn powershell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:+,@".contains(c));
    if plain {
        value.to_string()
    } else {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

pub struct Executor<C, O, E> {
    runner: C,
    options: ExecOptions,
    out: O,
    trace: E,
}

impl<C: CommandRunner, O: Write, E: Write> Executor<C, O, E> {
    pub fn new(runner: C, options: ExecOptions, out: O, trace: E) -> Self {
        Self {
            runner,
            options,
            out,
            trace,
        }
    }

    pub fn perform(&mut self, action: &Action) -> Result<(), ExecError> {
        if let Action::Report { path, value } = action {
            return writeln!(self.out, "{}\t{}", path.display(), value).map_err(ExecError::Report);
        }

        for operation in operations_for(action, &self.options) {
            self.echo(&operation.to_string());
            if self.options.dry_run {
                continue;
            }
            self.runner.execute(&operation)?;
        }
        Ok(())
    }

    pub fn echo(&mut self, message: &str) {
        if self.options.quiet {
            return;
        }
        let _ = writeln!(self.trace, "### {message}");
    }

    pub fn into_parts(self) -> (C, O, E) {
        (self.runner, self.out, self.trace)
    }
}
