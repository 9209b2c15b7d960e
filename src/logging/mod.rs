//! Logging pipeline
//!
//! Log items flow from any number of producers through a bounded queue into a
//! single writer loop. A rotation overseer switches the writer to a new logfile at
//! every local midnight and enforces the retention cap.

mod category;
mod format;
mod item;
mod rotation;
mod writer;

pub use category::{Category, TimestampMode, LABEL_WIDTH};
pub use format::{console_line, file_line, format_timestamp, join_values, parse_line, ParsedLine};
pub use item::LogItem;
pub use rotation::{
    daily_log_path, is_daily_log_name, next_midnight, prune_old_logs, Clock, Overseer,
    PruneReport, Rotation, SystemClock, FILE_MARKER,
};
pub use writer::{ConsoleSink, Writer, WriterChannels, WriterExit};
