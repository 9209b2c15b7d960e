//! serverlog - pipe stdin into a leveled, rotating log
//!
//! Every stdin line becomes a log item. Lines starting with `warning:` or `fatal:`
//! are logged in that category, everything else as general. A fatal line ends the
//! process with status 1 once it is written.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use serverlog::{Category, Destination, Error, Logger, LoggerConfig};

#[derive(Debug, Parser)]
#[command(name = "serverlog", version, about = "Pipe stdin into a leveled, rotating log")]
struct Cli {
    /// TOML config file (defaults to ~/.serverlog/config.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Do not write to the console
    #[arg(long)]
    quiet: bool,

    /// Write daily-rotated logfiles into this directory
    #[arg(long, conflicts_with = "file")]
    dir: Option<PathBuf>,

    /// Append to this single logfile instead of rotating
    #[arg(long)]
    file: Option<PathBuf>,

    /// Number of daily logfiles to keep; zero or less keeps all
    #[arg(long, allow_negative_numbers = true)]
    max_days: Option<i64>,

    /// Items queued before producers block
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Startup message logged before reading stdin
    #[arg(long)]
    startup: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<(LoggerConfig, Option<String>)> {
        let mut config = match &self.config {
            Some(path) => LoggerConfig::load_from(path)?,
            None => LoggerConfig::load()?,
        };

        if self.quiet {
            config.console_enabled = false;
        }
        if let Some(path) = self.file {
            config.file_enabled = true;
            config.destination = Destination::File { path };
        }
        if let Some(path) = self.dir {
            config.file_enabled = true;
            let max_retained_days = match config.destination {
                Destination::Directory {
                    max_retained_days, ..
                } => max_retained_days,
                Destination::File { .. } => 0,
            };
            config.destination = Destination::Directory {
                path,
                max_retained_days,
            };
        }
        if let Some(days) = self.max_days {
            if let Destination::Directory {
                max_retained_days, ..
            } = &mut config.destination
            {
                *max_retained_days = days;
            }
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }

        Ok((config, self.startup))
    }
}

/// Split an input line into its category and content
fn classify(line: &str) -> (Category, &str) {
    if let Some(rest) = line.strip_prefix("warning:") {
        (Category::Warning, rest.trim_start())
    } else if let Some(rest) = line.strip_prefix("fatal:") {
        (Category::Fatal, rest.trim_start())
    } else {
        (Category::General, line)
    }
}

/// Log every line of `reader` until it ends or a fatal line is sent
///
/// A writer loop that already stopped (after a fatal item or a logfile failure)
/// also ends the loop; the exit watcher decides the process status.
async fn pipe_lines<R: AsyncBufRead + Unpin>(logger: &Logger, reader: R) -> Result<()> {
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let (category, content) = classify(&line);
        match logger.log(category, content).await {
            Ok(()) if category.is_fatal() => break,
            Ok(()) => {}
            Err(Error::ChannelClosed) => break,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr so they never mix with console log lines
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "serverlog=warn".into()),
        )
        .init();

    let (config, startup) = Cli::parse().into_config()?;
    let (logger, handle) = Logger::start(config).context("Failed to start logger")?;
    let watcher = handle.exit_on_fatal();

    if let Some(message) = startup {
        logger.startup(message).await?;
    }

    pipe_lines(&logger, BufReader::new(tokio::io::stdin())).await?;

    // Dropping the last handle lets the writer drain the queue and return
    drop(logger);
    watcher.await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("warning: disk low"), (Category::Warning, "disk low"));
        assert_eq!(classify("fatal:boom"), (Category::Fatal, "boom"));
        assert_eq!(classify("plain line"), (Category::General, "plain line"));
        assert_eq!(classify("a warning: later"), (Category::General, "a warning: later"));
    }

    #[tokio::test]
    async fn test_pipe_stops_at_fatal_line() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("piped.log");
        let (logger, handle) =
            Logger::start(LoggerConfig::single_file(false, true, &path)).unwrap();

        let input: &[u8] = b"accepting connections\nfatal: out of file descriptors\nnever logged\n";
        pipe_lines(&logger, input).await.unwrap();
        assert_eq!(handle.wait().await.exit_code(), Some(1));

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("GENERAL: accepting connections"));
        assert!(lines[1].ends_with("FATAL:   out of file descriptors"));
    }

    #[tokio::test]
    async fn test_pipe_ends_quietly_when_writer_is_gone() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("piped.log");
        let (logger, handle) =
            Logger::start(LoggerConfig::single_file(false, true, &path)).unwrap();
        logger.fatal("already stopped").await.unwrap();
        handle.wait().await;

        let input: &[u8] = b"late line\n";
        pipe_lines(&logger, input).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "serverlog",
            "--config",
            "/nonexistent/serverlog.toml",
        ]);
        assert!(cli.into_config().is_err());

        let cli = Cli::try_parse_from(["serverlog", "--dir", "/a", "--file", "/b"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_directory_with_retention() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "console_enabled = true\n").unwrap();

        let cli = Cli::parse_from([
            "serverlog",
            "--config",
            config_path.to_str().unwrap(),
            "--quiet",
            "--dir",
            temp_dir.path().to_str().unwrap(),
            "--max-days=-1",
        ]);
        let (config, startup) = cli.into_config().unwrap();

        assert!(!config.console_enabled);
        assert!(config.file_enabled);
        assert!(startup.is_none());
        assert_eq!(
            config.destination,
            Destination::Directory {
                path: temp_dir.path().to_path_buf(),
                max_retained_days: -1,
            }
        );
    }
}
