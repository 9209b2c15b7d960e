//! Error types for the logger

use std::io;
use std::path::PathBuf;

/// Result type for logger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while starting or running the logger
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configured log directory does not exist
    #[error("log directory {} does not exist", .0.display())]
    DirectoryNotFound(PathBuf),

    /// The configured log directory path points at something else
    #[error("log path {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// The process cannot read and write the log directory
    #[error("read and write permissions are required on {}", .0.display())]
    AccessDenied(PathBuf),

    /// Queue capacity must hold at least one item
    #[error("queue capacity must be at least 1")]
    ZeroCapacity,

    /// Opening or writing a logfile failed
    #[error("failed to write logfile {}: {source}", path.display())]
    Write {
        /// The logfile being written
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// I/O error outside of the write path
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The writer loop is gone
    #[error("failed to send log item: channel closed")]
    ChannelClosed,

    /// A background task panicked or was cancelled
    #[error("logger task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
