//! Logger handles
//!
//! [`Logger::start`] validates the configuration and spawns the writer loop and,
//! for directory output, the rotation overseer. It returns a cloneable [`Logger`]
//! used by producers and a [`LoggerHandle`] that reports how the writer loop ended.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::{Destination, LoggerConfig};
use crate::error::{Error, Result};
use crate::logging::{
    daily_log_path, Category, Clock, ConsoleSink, LogItem, Overseer, SystemClock, Writer,
    WriterChannels, WriterExit,
};

/// Capacity of the channel carrying new logfile paths
const ROTATION_CHANNEL_BUFFER: usize = 2;

struct Shared {
    enabled: AtomicBool,
    shutdown: watch::Sender<bool>,
    /// Stamps items; shared with the rotation overseer so both agree on the day
    clock: Arc<dyn Clock>,
}

/// Producer handle; clone it freely across tasks and threads
#[derive(Clone)]
pub struct Logger {
    items: mpsc::Sender<LogItem>,
    shared: Arc<Shared>,
}

/// Handle to the background tasks
pub struct LoggerHandle {
    writer: JoinHandle<WriterExit>,
    overseer: Option<JoinHandle<()>>,
}

impl Logger {
    /// Start logging to stdout and the configured files
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: LoggerConfig) -> Result<(Logger, LoggerHandle)> {
        Self::start_with(config, Box::new(std::io::stdout()), SystemClock)
    }

    /// Start with an explicit console sink and clock
    pub fn start_with<C: Clock>(
        config: LoggerConfig,
        console: ConsoleSink,
        clock: C,
    ) -> Result<(Logger, LoggerHandle)> {
        config.validate()?;
        let clock = Arc::new(clock);

        let (item_tx, items) = mpsc::channel(config.queue_capacity);
        let (rotation_tx, rotations) = mpsc::channel(ROTATION_CHANNEL_BUFFER);
        let (shutdown_tx, shutdown) = watch::channel(false);

        let (active_path, rotating_dir): (Option<PathBuf>, Option<(PathBuf, i64)>) =
            match (config.file_enabled, config.destination) {
                (false, _) => (None, None),
                (true, Destination::File { path }) => (Some(path), None),
                (true, Destination::Directory {
                    path,
                    max_retained_days,
                }) => (
                    Some(daily_log_path(&path, clock.now().date_naive())),
                    Some((path, max_retained_days)),
                ),
            };

        if let Some(path) = &active_path {
            debug!("Logging to {}", path.display());
        }

        let overseer = rotating_dir.map(|(dir, max_retained_days)| {
            let overseer = Overseer::new(
                dir,
                max_retained_days,
                Arc::clone(&clock),
                item_tx.clone(),
                rotation_tx,
                shutdown.clone(),
            );
            tokio::spawn(overseer.run())
        });

        let writer = Writer::new(config.console_enabled.then_some(console), active_path);
        let writer = tokio::spawn(writer.run(WriterChannels {
            items,
            rotations,
            shutdown,
        }));

        let logger = Logger {
            items: item_tx,
            shared: Arc::new(Shared {
                enabled: AtomicBool::new(true),
                shutdown: shutdown_tx,
                clock,
            }),
        };

        Ok((logger, LoggerHandle { writer, overseer }))
    }

    /// Check if log calls are still accepted
    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }

    /// Queue an item, waiting while the queue is full
    ///
    /// After [`Logger::kill`] this does nothing.
    pub async fn log(&self, category: Category, content: impl Into<String>) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        self.items
            .send(self.item(category, content))
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    /// Queue an item from a thread outside the async runtime
    ///
    /// Panics when called from within an async context, like
    /// [`mpsc::Sender::blocking_send`].
    pub fn blocking_log(&self, category: Category, content: impl Into<String>) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        self.items
            .blocking_send(self.item(category, content))
            .map_err(|_| Error::ChannelClosed)
    }

    fn item(&self, category: Category, content: impl Into<String>) -> LogItem {
        LogItem::at(category, content, self.shared.clock.now())
    }

    /// Log a startup message, stamped with the full date
    pub async fn startup(&self, content: impl Into<String>) -> Result<()> {
        self.log(Category::Startup, content).await
    }

    /// Log a message after which the writer stops and the process should exit
    pub async fn fatal(&self, content: impl Into<String>) -> Result<()> {
        self.log(Category::Fatal, content).await
    }

    pub async fn general(&self, content: impl Into<String>) -> Result<()> {
        self.log(Category::General, content).await
    }

    pub async fn warning(&self, content: impl Into<String>) -> Result<()> {
        self.log(Category::Warning, content).await
    }

    /// Stop both background tasks and refuse further log calls
    ///
    /// Items still in the queue are not drained.
    pub fn kill(&self) {
        self.shared.enabled.store(false, Ordering::Release);
        self.shared.shutdown.send_replace(true);
    }
}

impl LoggerHandle {
    /// Wait for the writer loop to finish
    ///
    /// Once every [`Logger`] clone is dropped the writer drains the queue and
    /// returns [`WriterExit::Closed`]. The rotation overseer is aborted once the
    /// writer is gone.
    pub async fn wait(self) -> WriterExit {
        let exit = match self.writer.await {
            Ok(exit) => exit,
            Err(err) => WriterExit::Failed(Error::Task(err)),
        };
        if let Some(overseer) = self.overseer {
            overseer.abort();
        }
        exit
    }

    /// Terminate the process once the writer loop reports a fatal item or failure
    pub fn exit_on_fatal(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let exit = self.wait().await;
            if let WriterExit::Failed(err) = &exit {
                eprintln!("serverlog: {}", err);
            }
            if let Some(code) = exit.exit_code() {
                std::process::exit(code);
            }
        })
    }
}

/// Log values joined by single spaces as a startup message
///
/// ```ignore
/// serverlog::startup!(logger, "listening on port", 8080).await?;
/// ```
#[macro_export]
macro_rules! startup {
    ($logger:expr $(, $value:expr)* $(,)?) => {
        {
            // Join before the call so no `&dyn Display` temporary outlives this block
            let content = $crate::logging::join_values(&[$(&$value as &dyn ::std::fmt::Display),*]);
            $logger.startup(content)
        }
    };
}

/// Log values joined by single spaces as a fatal message
#[macro_export]
macro_rules! fatal {
    ($logger:expr $(, $value:expr)* $(,)?) => {
        {
            let content = $crate::logging::join_values(&[$(&$value as &dyn ::std::fmt::Display),*]);
            $logger.fatal(content)
        }
    };
}

/// Log values joined by single spaces as a general message
#[macro_export]
macro_rules! general {
    ($logger:expr $(, $value:expr)* $(,)?) => {
        {
            let content = $crate::logging::join_values(&[$(&$value as &dyn ::std::fmt::Display),*]);
            $logger.general(content)
        }
    };
}

/// Log values joined by single spaces as a warning
#[macro_export]
macro_rules! warning {
    ($logger:expr $(, $value:expr)* $(,)?) => {
        {
            let content = $crate::logging::join_values(&[$(&$value as &dyn ::std::fmt::Display),*]);
            $logger.warning(content)
        }
    };
}

/// Log a `format!` template as a startup message
#[macro_export]
macro_rules! startupf {
    ($logger:expr, $($arg:tt)+) => {
        $logger.startup(::std::format!($($arg)+))
    };
}

/// Log a `format!` template as a fatal message
#[macro_export]
macro_rules! fatalf {
    ($logger:expr, $($arg:tt)+) => {
        $logger.fatal(::std::format!($($arg)+))
    };
}

/// Log a `format!` template as a general message
#[macro_export]
macro_rules! generalf {
    ($logger:expr, $($arg:tt)+) => {
        $logger.general(::std::format!($($arg)+))
    };
}

/// Log a `format!` template as a warning
#[macro_export]
macro_rules! warningf {
    ($logger:expr, $($arg:tt)+) => {
        $logger.warning(::std::format!($($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::parse_line;
    use chrono::Local;
    use tempfile::TempDir;

    fn quiet_directory_config(dir: &std::path::Path) -> LoggerConfig {
        LoggerConfig::directory(false, true, 0, dir)
    }

    fn today_file(dir: &std::path::Path) -> PathBuf {
        daily_log_path(dir, Local::now().date_naive())
    }

    #[tokio::test]
    async fn test_start_rejects_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let config = quiet_directory_config(&temp_dir.path().join("missing"));
        assert!(matches!(
            Logger::start(config),
            Err(Error::DirectoryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_items_reach_todays_file() {
        let temp_dir = TempDir::new().unwrap();
        let (logger, handle) = Logger::start(quiet_directory_config(temp_dir.path())).unwrap();

        crate::general!(logger, "listening on", 8080).await.unwrap();
        crate::warningf!(logger, "{} of {} workers idle", 3, 4)
            .await
            .unwrap();
        crate::fatal!(logger, "stopping").await.unwrap();

        let exit = handle.wait().await;
        assert_eq!(exit.exit_code(), Some(1));

        let content = std::fs::read_to_string(today_file(temp_dir.path())).unwrap();
        let parsed: Vec<_> = content.lines().map(|l| parse_line(l).unwrap()).collect();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].category, Category::General);
        assert_eq!(parsed[0].content, "listening on 8080");
        assert_eq!(parsed[1].category, Category::Warning);
        assert_eq!(parsed[1].content, "3 of 4 workers idle");
        assert_eq!(parsed[2].category, Category::Fatal);
    }

    #[tokio::test]
    async fn test_value_macros_from_spawned_tasks() {
        let temp_dir = TempDir::new().unwrap();
        let (logger, handle) = Logger::start(quiet_directory_config(temp_dir.path())).unwrap();

        let producer = logger.clone();
        tokio::spawn(async move {
            let worker = 7;
            crate::startup!(producer, "worker", worker, "started").await.unwrap();
            crate::general!(producer, "worker", worker, "busy").await.unwrap();
            crate::warning!(producer, "worker", worker, "slow").await.unwrap();
        })
        .await
        .unwrap();
        tokio::spawn(async move {
            crate::fatal!(logger, "worker", 7, "crashed").await.unwrap();
        })
        .await
        .unwrap();
        handle.wait().await;

        let content = std::fs::read_to_string(today_file(temp_dir.path())).unwrap();
        let parsed: Vec<_> = content.lines().map(|l| parse_line(l).unwrap()).collect();
        let contents: Vec<_> = parsed.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(
            contents,
            [
                "worker 7 started",
                "worker 7 busy",
                "worker 7 slow",
                "worker 7 crashed"
            ]
        );
        assert_eq!(parsed[3].category, Category::Fatal);
    }

    #[tokio::test]
    async fn test_single_file_mode() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("server.log");
        let (logger, handle) =
            Logger::start(LoggerConfig::single_file(false, true, &path)).unwrap();

        crate::startupf!(logger, "server v{}", "1.2").await.unwrap();
        logger.fatal("done").await.unwrap();
        handle.wait().await;

        let content = std::fs::read_to_string(&path).unwrap();
        let first = parse_line(content.lines().next().unwrap()).unwrap();
        assert_eq!(first.category, Category::Startup);
        assert!(first.timestamp.contains('/'));
        assert_eq!(first.content, "server v1.2");
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_kill_stops_and_disables() {
        let temp_dir = TempDir::new().unwrap();
        let (logger, handle) = Logger::start(quiet_directory_config(temp_dir.path())).unwrap();

        logger.kill();
        assert!(!logger.is_enabled());
        assert!(matches!(handle.wait().await, WriterExit::Shutdown));

        // Disabled calls succeed without touching the closed queue
        logger.general("ignored").await.unwrap();
        assert!(!today_file(temp_dir.path()).exists());
    }

    #[tokio::test]
    async fn test_dropping_logger_drains_queue() {
        let temp_dir = TempDir::new().unwrap();
        let (logger, handle) = Logger::start(quiet_directory_config(temp_dir.path())).unwrap();

        for i in 0..20 {
            crate::general!(logger, "line", i).await.unwrap();
        }
        drop(logger);

        assert!(matches!(handle.wait().await, WriterExit::Closed));
        let content = std::fs::read_to_string(today_file(temp_dir.path())).unwrap();
        assert_eq!(content.lines().count(), 20);
        assert!(content.lines().last().unwrap().ends_with("line 19"));
    }

    #[tokio::test]
    async fn test_send_after_writer_exit_fails() {
        let config = LoggerConfig {
            console_enabled: false,
            ..LoggerConfig::default().with_queue_capacity(4)
        };
        let (logger, handle) = Logger::start(config).unwrap();

        logger.fatal("bye").await.unwrap();
        handle.wait().await;

        assert!(matches!(
            logger.general("too late").await,
            Err(Error::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_blocking_log_from_thread() {
        let temp_dir = TempDir::new().unwrap();
        let (logger, handle) = Logger::start(quiet_directory_config(temp_dir.path())).unwrap();

        let producer = logger.clone();
        tokio::task::spawn_blocking(move || {
            producer
                .blocking_log(Category::General, "from a plain thread")
                .unwrap();
        })
        .await
        .unwrap();
        logger.fatal("done").await.unwrap();
        handle.wait().await;

        let content = std::fs::read_to_string(today_file(temp_dir.path())).unwrap();
        assert!(content.lines().next().unwrap().ends_with("from a plain thread"));
    }
}
