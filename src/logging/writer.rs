//! Single-consumer writer loop
//!
//! The writer is the only task that touches the console stream and the logfile.
//! It drains the dispatch queue in arrival order, follows path changes sent by the
//! rotation overseer, and stops on shutdown, on a fatal item, or on a logfile
//! failure. Items still queued from before a rotation land in the previous file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::format::{console_line, file_line};
use super::item::LogItem;
use super::rotation::Rotation;
use crate::error::{Error, Result};

/// Sink for console output
pub type ConsoleSink = Box<dyn Write + Send>;

/// Why the writer loop returned
#[derive(Debug)]
pub enum WriterExit {
    /// The shutdown signal fired
    Shutdown,
    /// Every producer handle was dropped and the queue is empty
    Closed,
    /// A fatal item was written to every enabled sink
    Fatal(LogItem),
    /// Opening or writing the logfile failed
    Failed(Error),
}

impl WriterExit {
    /// Get the status the process should exit with, if it must exit
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            WriterExit::Fatal(_) | WriterExit::Failed(_) => Some(1),
            WriterExit::Shutdown | WriterExit::Closed => None,
        }
    }
}

/// Receiving ends the writer loop listens on
pub struct WriterChannels {
    pub items: mpsc::Receiver<LogItem>,
    pub rotations: mpsc::Receiver<Rotation>,
    pub shutdown: watch::Receiver<bool>,
}

/// Owner of the console and logfile sinks
pub struct Writer {
    console: Option<ConsoleSink>,
    active_path: Option<PathBuf>,
    /// File that was active before the last rotation
    previous_path: Option<PathBuf>,
    /// Items created before this instant belong to `previous_path`
    active_since: Option<DateTime<Local>>,
}

impl Writer {
    /// Create a writer
    ///
    /// `console` is `None` when console output is disabled, `active_path` is `None`
    /// when file output is disabled.
    pub fn new(console: Option<ConsoleSink>, active_path: Option<PathBuf>) -> Self {
        Self {
            console,
            active_path,
            previous_path: None,
            active_since: None,
        }
    }

    /// Get the logfile currently written to
    pub fn active_path(&self) -> Option<&Path> {
        self.active_path.as_deref()
    }

    /// Switch file writes for items created from `rotation.boundary` on to
    /// `rotation.path`
    ///
    /// Ignored when file output is disabled.
    pub fn rotate_to(&mut self, rotation: Rotation) {
        let Some(active) = self.active_path.as_mut() else {
            return;
        };
        debug!("Switching logfile to {}", rotation.path.display());
        self.previous_path = Some(std::mem::replace(active, rotation.path));
        self.active_since = Some(rotation.boundary);
    }

    /// Pick the logfile an item belongs to, by its creation time
    fn path_for(&self, item: &LogItem) -> Option<&Path> {
        match (self.active_since, self.previous_path.as_deref()) {
            (Some(since), Some(previous)) if item.created_at() < since => Some(previous),
            _ => self.active_path.as_deref(),
        }
    }

    /// Write one item to every enabled sink
    ///
    /// Console failures are reported through `tracing` and otherwise ignored;
    /// only a logfile failure is an error.
    pub fn write(&mut self, item: &LogItem) -> Result<()> {
        if let Some(console) = self.console.as_mut() {
            if let Err(err) = console
                .write_all(console_line(item).as_bytes())
                .and_then(|_| console.flush())
            {
                warn!("Failed to write to console: {}", err);
            }
        }

        if let Some(path) = self.path_for(item) {
            append_line(path, &file_line(item), item.category().is_fatal()).map_err(|source| {
                Error::Write {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
        }

        Ok(())
    }

    /// Run until shutdown, a fatal item, a write failure, or queue closure
    pub async fn run(mut self, mut channels: WriterChannels) -> WriterExit {
        let mut shutdown_open = true;

        loop {
            tokio::select! {
                biased;

                changed = channels.shutdown.changed(), if shutdown_open => {
                    match changed {
                        Ok(()) if *channels.shutdown.borrow() => {
                            info!("Writer loop shutting down");
                            return WriterExit::Shutdown;
                        }
                        Ok(()) => {}
                        Err(_) => shutdown_open = false,
                    }
                }
                Some(rotation) = channels.rotations.recv() => self.rotate_to(rotation),
                item = channels.items.recv() => {
                    let Some(item) = item else {
                        debug!("Log queue closed");
                        return WriterExit::Closed;
                    };
                    if let Err(err) = self.write(&item) {
                        return WriterExit::Failed(err);
                    }
                    if item.category().is_fatal() {
                        return WriterExit::Fatal(item);
                    }
                }
            }
        }
    }
}

/// Append a line, holding the file handle only for the duration of the write
fn append_line(path: &Path, line: &str, sync: bool) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    if sync {
        file.sync_all()?;
    }
    Ok(())
}
