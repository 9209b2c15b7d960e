//! Configuration management for serverlog
//!
//! The configuration is built once at startup, validated, and handed to the
//! background tasks. There is no reload.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default capacity of the dispatch queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Where logfiles go
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Destination {
    /// One file per day inside `path`, rotated at local midnight
    Directory {
        path: PathBuf,
        /// Maximum number of daily files kept; zero or less keeps everything
        #[serde(default)]
        max_retained_days: i64,
    },
    /// A single fixed file, never rotated
    File { path: PathBuf },
}

impl Default for Destination {
    fn default() -> Self {
        Destination::Directory {
            path: logs_dir(),
            max_retained_days: 0,
        }
    }
}

/// Logger configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Write colorized lines to stdout
    #[serde(default = "default_console_enabled")]
    pub console_enabled: bool,

    /// Append plain lines to logfiles
    #[serde(default)]
    pub file_enabled: bool,

    /// Items the queue holds before producers block (default: 1024)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default)]
    pub destination: Destination,
}

fn default_console_enabled() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            console_enabled: default_console_enabled(),
            file_enabled: false,
            queue_capacity: default_queue_capacity(),
            destination: Destination::default(),
        }
    }
}

impl LoggerConfig {
    /// Daily-rotating configuration writing into `log_dir`
    pub fn directory(
        console_enabled: bool,
        file_enabled: bool,
        max_retained_days: i64,
        log_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            console_enabled,
            file_enabled,
            destination: Destination::Directory {
                path: log_dir.into(),
                max_retained_days,
            },
            queue_capacity: default_queue_capacity(),
        }
    }

    /// Configuration appending to one fixed file
    pub fn single_file(
        console_enabled: bool,
        file_enabled: bool,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            console_enabled,
            file_enabled,
            destination: Destination::File {
                path: file_path.into(),
            },
            queue_capacity: default_queue_capacity(),
        }
    }

    /// Set the dispatch queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Load configuration from the default file, or return default if not found
    pub fn load() -> anyhow::Result<Self> {
        let path = config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Directory that must be accessible when file output is enabled
    pub fn log_directory(&self) -> PathBuf {
        match &self.destination {
            Destination::Directory { path, .. } => path.clone(),
            Destination::File { path } => match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            },
        }
    }

    /// Check the configuration before any background task starts
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::ZeroCapacity);
        }
        if self.file_enabled {
            check_directory(&self.log_directory())?;
        }
        Ok(())
    }
}

/// Ensure `dir` exists, is a directory, and is readable and writable
pub fn check_directory(dir: &Path) -> Result<()> {
    let metadata = match std::fs::metadata(dir) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::DirectoryNotFound(dir.to_path_buf()));
        }
        Err(e) => return Err(Error::Io(e)),
    };

    if !metadata.is_dir() {
        return Err(Error::NotADirectory(dir.to_path_buf()));
    }

    if !has_read_write_access(dir, &metadata) {
        return Err(Error::AccessDenied(dir.to_path_buf()));
    }

    Ok(())
}

#[cfg(unix)]
fn has_read_write_access(dir: &Path, _metadata: &std::fs::Metadata) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(dir.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: c_path is a valid NUL-terminated string that outlives the call
    unsafe { libc::access(c_path.as_ptr(), libc::R_OK | libc::W_OK) == 0 }
}

#[cfg(not(unix))]
fn has_read_write_access(_dir: &Path, metadata: &std::fs::Metadata) -> bool {
    !metadata.permissions().readonly()
}

/// Get the base configuration directory (~/.serverlog)
/// Falls back to ./.serverlog if home directory cannot be determined
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".serverlog"))
        .unwrap_or_else(|| PathBuf::from(".serverlog"))
}

/// Get the path to the config file
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the default logs directory
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}
