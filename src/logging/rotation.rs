//! Daily logfile rotation and retention
//!
//! The rotation overseer sleeps until the next local midnight, creates that day's
//! logfile, tells the writer loop to switch to it and prunes the oldest logfiles
//! beyond the retention cap. Failures here never stop logging; they are reported
//! as warning items through the normal queue.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::category::Category;
use super::item::LogItem;

/// Literal that marks a file in the log directory as ours
pub const FILE_MARKER: &str = "serverlog";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Source of the current local time
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Local>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Local> {
        (**self).now()
    }
}

/// Notice sent to the writer when a new day's logfile takes over
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rotation {
    /// First instant belonging to the new file
    pub boundary: DateTime<Local>,
    pub path: PathBuf,
}

/// Build the logfile path for a given day: `<dir>/<YYYY-MM-DD>-serverlog.log`
pub fn daily_log_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}-{}.log", date.format(DATE_FORMAT), FILE_MARKER))
}

/// Check if a file name was produced by [`daily_log_path`]
pub fn is_daily_log_name(name: &str) -> bool {
    let Some(date) = name.strip_suffix(&format!("-{}.log", FILE_MARKER)) else {
        return false;
    };
    date.len() == 10 && NaiveDate::parse_from_str(date, DATE_FORMAT).is_ok()
}

/// Compute the first instant of the day after `now`, in `now`'s time zone
///
/// Uses calendar arithmetic so month and year ends roll over correctly. When local
/// midnight does not exist (a DST gap), the first valid hour of that day is used.
pub fn next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tomorrow = now.date_naive().succ_opt()?;
    let midnight = tomorrow.and_hms_opt(0, 0, 0)?;
    let tz = now.timezone();

    (0..24).find_map(|hour| {
        tz.from_local_datetime(&(midnight + Duration::hours(hour)))
            .earliest()
    })
}

/// Outcome of a retention pass
#[derive(Debug, Default)]
pub struct PruneReport {
    /// Files that were removed, oldest first
    pub deleted: Vec<PathBuf>,
    /// Files that could not be removed
    pub failed: Vec<(PathBuf, io::Error)>,
}

/// Remove the oldest daily logfiles so that at most `max_retained` remain
///
/// Every entry whose name matches [`is_daily_log_name`] counts. Names sort
/// chronologically because the date is zero-padded. A failed removal is recorded
/// and the pass moves on to the next candidate.
pub fn prune_old_logs(dir: &Path, max_retained: usize) -> io::Result<PruneReport> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if is_daily_log_name(name) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();

    let excess = names.len().saturating_sub(max_retained);
    let mut report = PruneReport::default();
    for name in &names[..excess] {
        let path = dir.join(name);
        match fs::remove_file(&path) {
            Ok(()) => report.deleted.push(path),
            Err(err) => report.failed.push((path, err)),
        }
    }

    Ok(report)
}

/// Background task keeping the active logfile aligned with calendar days
pub struct Overseer<C: Clock = SystemClock> {
    dir: PathBuf,
    max_retained_days: i64,
    clock: C,
    items: mpsc::Sender<LogItem>,
    rotations: mpsc::Sender<Rotation>,
    shutdown: watch::Receiver<bool>,
}

impl<C: Clock> Overseer<C> {
    /// Create an overseer for `dir`
    ///
    /// `max_retained_days <= 0` disables pruning.
    pub fn new(
        dir: PathBuf,
        max_retained_days: i64,
        clock: C,
        items: mpsc::Sender<LogItem>,
        rotations: mpsc::Sender<Rotation>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            dir,
            max_retained_days,
            clock,
            items,
            rotations,
            shutdown,
        }
    }

    /// Wait for day boundaries and rotate until shutdown
    pub async fn run(mut self) {
        let mut last_boundary: Option<DateTime<Local>> = None;

        loop {
            let now = self.clock.now();
            // Never compute a boundary earlier than the one already handled
            let from = match last_boundary {
                Some(boundary) if boundary > now => boundary,
                _ => now,
            };
            let Some(boundary) = next_midnight(&from) else {
                self.warn(format!("serverlog cannot compute the day after {}", from))
                    .await;
                return;
            };
            let wait = (boundary - now).to_std().unwrap_or_default();
            debug!("Next logfile rotation in {:?}", wait);

            tokio::select! {
                biased;

                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        info!("Rotation overseer shutting down");
                        return;
                    }
                }
                _ = tokio::time::sleep(wait) => {
                    last_boundary = Some(boundary);
                    if !self.rotate(boundary).await {
                        debug!("Writer loop gone, stopping rotation overseer");
                        return;
                    }
                }
            }
        }
    }

    /// Create the logfile for the day starting at `boundary`, hand it to the
    /// writer and prune old files
    ///
    /// Returns `false` once the writer loop no longer listens for new paths.
    pub async fn rotate(&self, boundary: DateTime<Local>) -> bool {
        let path = daily_log_path(&self.dir, boundary.date_naive());

        if let Err(err) = OpenOptions::new().create(true).append(true).open(&path) {
            self.warn(format!(
                "serverlog failed to create new logfile: {} : {}",
                path.display(),
                err
            ))
            .await;
            return true;
        }

        info!("Rotating logfile to {}", path.display());
        if self
            .rotations
            .send(Rotation { boundary, path })
            .await
            .is_err()
        {
            return false;
        }

        if self.max_retained_days > 0 {
            self.enforce_retention().await;
        }

        true
    }

    async fn enforce_retention(&self) {
        let max_retained = usize::try_from(self.max_retained_days).unwrap_or(usize::MAX);
        match prune_old_logs(&self.dir, max_retained) {
            Ok(report) => {
                if !report.deleted.is_empty() {
                    info!("Pruned {} old logfiles", report.deleted.len());
                }
                for (path, err) in report.failed {
                    self.warn(format!(
                        "serverlog failed to delete logfile: {} : {}",
                        path.display(),
                        err
                    ))
                    .await;
                }
            }
            Err(err) => {
                self.warn(format!(
                    "serverlog failed to read from log directory: {}",
                    err
                ))
                .await;
            }
        }
    }

    async fn warn(&self, content: String) {
        warn!("{}", content);
        // A closed queue means the writer is gone; nothing is left to report to
        let _ = self
            .items
            .send(LogItem::new(Category::Warning, content))
            .await;
    }
}
