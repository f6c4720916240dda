//! Command line front end for the `pipecopy` binary.
//!
//! Parses arguments, sets up logging, opens the two files with `tokio::fs`
//! and hands them to [`crate::copy`].

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, builder::PossibleValuesParser, value_parser};
use tokio_util::compat::{TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, prelude::*};

use crate::{CopyConfig, CopyError, CopyReport, Strategy};

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppArgs {
    /// File to read.
    pub source: PathBuf,
    /// File to create or truncate.
    pub destination: PathBuf,
    /// Raw strategy selector, checked by [`AppArgs::strategy`].
    pub mode: String,
    /// `--buffer-size`
    pub buffer_size: Option<usize>,
    /// `--segment-size`
    pub segment_size: Option<usize>,
    /// `--capacity`
    pub capacity: Option<usize>,
    /// `--wide`
    pub wide: bool,
    /// Default tracing level, overridden by `RUST_LOG`.
    pub log_level: String,
}

impl AppArgs {
    /// The selected strategy.
    pub fn strategy(&self) -> Result<Strategy, CopyError> {
        self.mode.parse()
    }

    /// The copy configuration the flags describe, validated.
    pub fn config(&self) -> Result<CopyConfig, CopyError> {
        let mut config = if self.wide {
            CopyConfig::wide_segments()
        } else {
            CopyConfig::default()
        };
        if let Some(size) = self.buffer_size {
            config = config.with_buffer_size(size);
        }
        if let Some(size) = self.segment_size {
            config = config.with_segment_size(size);
        }
        if let Some(capacity) = self.capacity {
            config = config.with_channel_capacity(capacity);
        }
        config.validate()?;
        Ok(config)
    }
}

/// The source path does not name an existing file.
#[derive(Debug)]
pub struct SourceMissing(pub PathBuf);

impl fmt::Display for SourceMissing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source file not found: {}", self.0.display())
    }
}

impl std::error::Error for SourceMissing {}

/// Process exit statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Exit {
    Success = 0,
    CopyFailed = 1,
    InvalidStrategy = 2,
    SourceMissing = 3,
    InvalidUsage = 4,
}

impl Exit {
    /// Exit status for a failed run.
    pub fn for_error(err: &anyhow::Error) -> Self {
        if err.downcast_ref::<SourceMissing>().is_some() {
            return Exit::SourceMissing;
        }
        match err.downcast_ref::<CopyError>() {
            Some(CopyError::InvalidStrategy { .. }) => Exit::InvalidStrategy,
            Some(CopyError::InvalidConfig { .. }) => Exit::InvalidUsage,
            _ => Exit::CopyFailed,
        }
    }
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

fn command() -> clap::Command {
    clap::Command::new("pipecopy")
        .version(crate::VERSION)
        .about("Copies a file through one of three overlapped streaming engines")
        .arg(
            clap::Arg::new("source")
                .help("File to read")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            clap::Arg::new("destination")
                .help("File to create or truncate")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            clap::Arg::new("mode")
                .short('m')
                .long("mode")
                .help("Copy engine: segmented, bulk or pooled")
                .default_value("pooled")
                .value_parser(value_parser!(String))
                .num_args(1),
        )
        .arg(
            clap::Arg::new("buffer-size")
                .long("buffer-size")
                .help("Pooled buffer size in bytes")
                .value_parser(value_parser!(usize))
                .num_args(1),
        )
        .arg(
            clap::Arg::new("segment-size")
                .long("segment-size")
                .help("Minimum pipe segment size in bytes")
                .value_parser(value_parser!(usize))
                .num_args(1),
        )
        .arg(
            clap::Arg::new("capacity")
                .long("capacity")
                .help("Bounded queue capacity in chunks")
                .value_parser(value_parser!(usize))
                .num_args(1),
        )
        .arg(
            clap::Arg::new("wide")
                .long("wide")
                .help("Use pipe segments ten times the default size")
                .action(ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("log-level")
                .short('l')
                .long("log")
                .help("Set log level")
                .value_parser(PossibleValuesParser::new([
                    "error", "warn", "info", "debug", "trace",
                ]))
                .num_args(1),
        )
}

/// Parses the process arguments.
pub fn parse_args() -> Result<AppArgs, clap::Error> {
    parse_args_from(std::env::args_os())
}

/// Parses `args`; the first item is the program name.
pub fn parse_args_from<I, T>(args: I) -> Result<AppArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = command().try_get_matches_from(args)?;
    let path = |id: &str| args.get_one::<PathBuf>(id).cloned().unwrap_or_default();

    Ok(AppArgs {
        source: path("source"),
        destination: path("destination"),
        mode: args
            .get_one("mode")
            .map(String::as_str)
            .unwrap_or("pooled")
            .to_string(),
        buffer_size: args.get_one("buffer-size").copied(),
        segment_size: args.get_one("segment-size").copied(),
        capacity: args.get_one("capacity").copied(),
        wide: args.get_flag("wide"),
        log_level: args
            .get_one("log-level")
            .map(String::as_str)
            .unwrap_or("warn")
            .to_string(),
    })
}

/// Installs the global tracing subscriber, writing to stderr.
pub fn init_logging(log_level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.parse()?)
                .from_env()?,
        )
        .init();
    Ok(())
}

/// Runs one copy as described by `args`.
pub async fn run(args: &AppArgs) -> Result<CopyReport> {
    let strategy = args.strategy()?;
    let config = args.config()?;
    check_source(&args.source)?;

    let source = tokio::fs::File::open(&args.source)
        .await
        .map_err(CopyError::SourceUnreadable)
        .with_context(|| format!("opening {}", args.source.display()))?;
    let destination = tokio::fs::File::create(&args.destination)
        .await
        .map_err(CopyError::DestinationUnwritable)
        .with_context(|| format!("creating {}", args.destination.display()))?;

    info!(
        source = %args.source.display(),
        destination = %args.destination.display(),
        %strategy,
        "copying"
    );
    let report = crate::copy(
        strategy,
        source.compat(),
        destination.compat_write(),
        &config,
    )
    .await
    .with_context(|| {
        format!(
            "copying {} to {}",
            args.source.display(),
            args.destination.display()
        )
    })?;
    Ok(report)
}

fn check_source(path: &Path) -> Result<(), SourceMissing> {
    if path.is_file() {
        Ok(())
    } else {
        Err(SourceMissing(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> AppArgs {
        let mut argv = vec!["pipecopy", "in.bin", "out.bin"];
        argv.extend_from_slice(extra);
        parse_args_from(argv).unwrap()
    }

    #[test]
    fn test_parse_args_default() {
        let args = args(&[]);
        assert_eq!(args.source, PathBuf::from("in.bin"));
        assert_eq!(args.destination, PathBuf::from("out.bin"));
        assert_eq!(args.strategy().unwrap(), Strategy::PooledQueue);
        assert_eq!(args.config().unwrap(), CopyConfig::default());
        assert_eq!(args.log_level, "warn");
    }

    #[test]
    fn test_parse_args_overrides() {
        let args = args(&[
            "-m",
            "segmented",
            "--wide",
            "--capacity",
            "4",
            "--buffer-size",
            "1024",
            "-l",
            "debug",
        ]);
        let config = args.config().unwrap();

        assert_eq!(args.strategy().unwrap(), Strategy::SegmentedPipe);
        assert_eq!(config.segment_size(), 10 * 65535);
        assert_eq!(config.channel_capacity(), 4);
        assert_eq!(config.buffer_size(), 1024);
        assert_eq!(args.log_level, "debug");
    }

    #[test]
    fn test_parse_args_requires_paths() {
        assert!(parse_args_from(["pipecopy", "only-one"]).is_err());
        assert!(parse_args_from(["pipecopy", "a", "b", "--capacity", "lots"]).is_err());
    }

    #[test]
    fn test_exit_status_mapping() {
        let strategy = anyhow::Error::from(args(&["-m", "turbo"]).strategy().unwrap_err());
        assert_eq!(Exit::for_error(&strategy), Exit::InvalidStrategy);

        let config = anyhow::Error::from(args(&["--capacity", "0"]).config().unwrap_err());
        assert_eq!(Exit::for_error(&config), Exit::InvalidUsage);

        let max = usize::MAX.to_string();
        let config = anyhow::Error::from(args(&["--capacity", max.as_str()]).config().unwrap_err());
        assert_eq!(Exit::for_error(&config), Exit::InvalidUsage);

        let missing = anyhow::Error::from(SourceMissing(PathBuf::from("nope")));
        assert_eq!(Exit::for_error(&missing), Exit::SourceMissing);

        let failed = anyhow::Error::from(CopyError::DestinationUnwritable(
            std::io::Error::other("disk full"),
        ))
        .context("copying a to b");
        assert_eq!(Exit::for_error(&failed), Exit::CopyFailed);
    }

    #[tokio::test]
    async fn test_run_missing_source() {
        let args = args(&[]);
        let args = AppArgs {
            source: std::env::temp_dir().join("pipecopy-cli-missing-source.bin"),
            ..args
        };
        let err = run(&args).await.unwrap_err();
        assert_eq!(Exit::for_error(&err), Exit::SourceMissing);
    }

    #[tokio::test]
    async fn test_run_copies_file() {
        let dir = std::env::temp_dir();
        let source = dir.join(format!("pipecopy-cli-src-{}.bin", std::process::id()));
        let destination = dir.join(format!("pipecopy-cli-dst-{}.bin", std::process::id()));
        let data: Vec<u8> = (0..300_000u32).map(|i| (i % 253) as u8).collect();
        tokio::fs::write(&source, &data).await.unwrap();

        let args = AppArgs {
            source: source.clone(),
            destination: destination.clone(),
            ..args(&["-m", "bulk"])
        };
        let report = run(&args).await.unwrap();

        assert_eq!(report.bytes_copied, data.len() as u64);
        assert_eq!(tokio::fs::read(&destination).await.unwrap(), data);

        let _ = tokio::fs::remove_file(&source).await;
        let _ = tokio::fs::remove_file(&destination).await;
    }
}
