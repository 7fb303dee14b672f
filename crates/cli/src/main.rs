use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{ArgGroup, Args, Parser, Subcommand};
use exifrenamer_core::{
    app_paths, discover_capture_name, expand_paths, load_config, parse_base_time, run_batch,
    BatchOptions, BatchStats, CancellationToken, CaptureNaming, ExecOptions, ExifToolReader,
    Executor, Mode, Platform, SystemRunner, TimeShift,
};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "exifrenamer", version)]
#[command(about = "Reconcile capture dates between file names, EXIF tags and file times")]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
#[command(after_help = "A file named `config` must be given as `./config` or after `--`.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    #[command(flatten)]
    run: RunArgs,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the configuration file location and contents
    Config,
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("mode").required(true).multiple(false)))]
struct RunArgs {
    /// Set file creation time by filename
    #[arg(short = 'c', long, group = "mode")]
    ctime: bool,
    /// Rename files by their EXIF DateTimeOriginal
    #[arg(short = 'm', long = "move", group = "mode")]
    move_by_tag: bool,
    /// Write EXIF DateTimeOriginal by filename
    #[arg(short = 'w', long, group = "mode")]
    write: bool,
    /// List files whose name differs from their EXIF date
    #[arg(short = 'C', long, group = "mode")]
    compare: bool,
    /// Name and tag files one minute apart starting at BASE_TIME
    #[arg(short = 's', long, group = "mode", value_name = "BASE_TIME")]
    sequential: Option<String>,

    /// Do not actually change anything
    #[arg(short = 'D', long)]
    dry_run: bool,
    /// Less output
    #[arg(short, long)]
    quiet: bool,
    /// Find files recursively
    #[arg(short, long)]
    recursive: bool,
    /// Act even when source and target already agree
    #[arg(short, long)]
    force: bool,
    /// Shift time when reading tags (exiftool -globalTimeShift syntax)
    #[arg(short, long, allow_hyphen_values = true)]
    time_shift: Option<String>,
    /// Prefix of screen-capture file names
    #[arg(long)]
    capture_name: Option<String>,
    /// Path to the exiftool executable
    #[arg(long)]
    exiftool: Option<PathBuf>,
    /// Debug diagnostics on stderr
    #[arg(short, long)]
    verbose: bool,

    #[arg(required = true)]
    paths: Vec<String>,
}

impl RunArgs {
    fn mode(&self) -> Result<Mode> {
        if let Some(base) = &self.sequential {
            let base = parse_base_time(base).context("invalid base time")?;
            return Ok(Mode::Sequential { base });
        }
        let mode = if self.ctime {
            Mode::SetCtimeByFilename
        } else if self.move_by_tag {
            Mode::MoveByTag
        } else if self.write {
            Mode::WriteByFilename
        } else {
            Mode::Compare
        };
        Ok(mode)
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                err.exit();
            }
            let _ = err.print();
            return ExitCode::from(1);
        }
    };

    init_logging(cli.run.verbose);

    let result = match cli.command {
        Some(Commands::Config) => cmd_config_show().map(|_| ExitCode::SUCCESS),
        None => cmd_run(cli.run),
    };

    match result {
        Ok(code) => code,
        Err(err) => report_failure(&err),
    }
}

fn report_failure(err: &anyhow::Error) -> ExitCode {
    error!("{err:#}");
    ExitCode::from(1)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn cmd_run(args: RunArgs) -> Result<ExitCode> {
    let config = load_config()?;
    let mode = args.mode()?;
    let capture = args
        .capture_name
        .clone()
        .or_else(|| config.capture_name.clone())
        .or_else(discover_capture_name)
        .and_then(CaptureNaming::new);

    let time_shift = args.time_shift.as_deref().or(config.time_shift.as_deref());
    let options = BatchOptions {
        mode,
        force: args.force,
        time_shift: TimeShift::new(time_shift),
        capture,
    };

    let exiftool = args.exiftool.clone().or_else(|| config.exiftool_path.clone());
    let exec_options = ExecOptions {
        dry_run: args.dry_run,
        quiet: args.quiet,
        exiftool: exiftool.clone().unwrap_or_else(|| PathBuf::from("exiftool")),
        platform: Platform::current(),
    };

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .context("could not install the Ctrl-C handler")?;

    let paths = expand_paths(&args.paths, args.recursive, config.include_hidden)?;
    debug!(
        mode = ?options.mode,
        files = paths.len(),
        dry_run = args.dry_run,
        time_shift = options.time_shift.as_arg(),
        "starting batch"
    );
    let mut reader = ExifToolReader::new(exiftool);
    let mut executor = Executor::new(SystemRunner, exec_options, io::stdout(), io::stderr());

    let stats = run_batch(&paths, &options, &mut reader, &mut executor, &cancel);
    if stats.cancelled {
        warn!("interrupted, remaining files were not processed");
    }
    if !args.quiet {
        print_summary(&stats);
    }

    Ok(if stats.failures > 0 {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let paths = app_paths()?;
    println!("config file: {}", paths.config_path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn print_summary(stats: &BatchStats) {
    eprintln!(
        "processed={} missing={} actions={} failures={}{}",
        stats.processed,
        stats.skipped_missing,
        stats.actions,
        stats.failures,
        if stats.cancelled { " (cancelled)" } else { "" }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::sync::{Arc, Mutex};

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("exifrenamer").chain(args.iter().copied()))
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn exactly_one_mode_is_required() {
        assert!(parse(&["photo.jpg"]).is_err());
        assert!(parse(&["-m", "-w", "photo.jpg"]).is_err());
        assert!(parse(&["-m"]).is_err());
    }

    #[test]
    fn mode_flags_select_operation() {
        let cli = parse(&["-m", "-D", "-t", "-1:00", "a.jpg"]).expect("valid");
        assert_eq!(cli.run.mode().expect("mode"), Mode::MoveByTag);
        assert!(cli.run.dry_run);
        assert_eq!(cli.run.time_shift.as_deref(), Some("-1:00"));

        let cli = parse(&["--compare", "a.jpg"]).expect("valid");
        assert_eq!(cli.run.mode().expect("mode"), Mode::Compare);

        let cli = parse(&["-s", "2022-01-01_00-00-00", "a.jpg", "b.jpg"]).expect("valid");
        assert_eq!(
            cli.run.mode().expect("mode"),
            Mode::Sequential {
                base: parse_base_time("2022-01-01_00-00-00").expect("base")
            }
        );
        assert_eq!(cli.run.paths, vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn bad_base_time_is_reported() {
        let cli = parse(&["-s", "tomorrow", "a.jpg"]).expect("parses as a string");
        assert!(cli.run.mode().is_err());
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn runtime_errors_are_logged_with_context() {
        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .finish();

        let err = anyhow::anyhow!("permission denied").context("could not read config file");
        let code = tracing::subscriber::with_default(subscriber, || report_failure(&err));
        assert_eq!(code, ExitCode::from(1));

        let logged = String::from_utf8(captured.0.lock().expect("lock").clone()).expect("utf8");
        assert!(logged.contains("ERROR"), "{logged}");
        assert!(logged.contains("could not read config file: permission denied"));
    }

    #[test]
    fn config_subcommand_needs_no_mode() {
        let cli = parse(&["config"]).expect("valid");
        assert!(matches!(cli.command, Some(Commands::Config)));
    }

    #[test]
    fn file_named_config_can_still_be_processed() {
        for args in [&["-m", "--", "config"][..], &["-m", "./config"][..]] {
            let cli = parse(args).expect("valid");
            assert!(cli.command.is_none(), "{args:?}");
            assert_eq!(cli.run.mode().expect("mode"), Mode::MoveByTag);
            assert_eq!(cli.run.paths, vec![args[args.len() - 1]]);
        }

        let help = Cli::command().render_long_help().to_string();
        assert!(help.contains("./config"));
    }
}
