//! Line formatting
//!
//! Joins loggable values into content strings, renders timestamps and builds the
//! console and file forms of a line. Also parses plain file lines back into their
//! parts.

use std::fmt::Display;

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime};

use super::category::{Category, TimestampMode, LABEL_WIDTH};
use super::item::LogItem;

const SHORT_FORMAT: &str = "%H:%M:%S";
const LONG_FORMAT: &str = "%Y/%B/%d %H:%M:%S";

/// Join values with single spaces using their `Display` form
pub fn join_values(values: &[&dyn Display]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a capture time in the given mode
pub fn format_timestamp(time: &DateTime<Local>, mode: TimestampMode) -> String {
    match mode {
        TimestampMode::Short => time.format(SHORT_FORMAT).to_string(),
        TimestampMode::Long => time.format(LONG_FORMAT).to_string(),
    }
}

/// Render the plain, newline-terminated line written to logfiles
pub fn file_line(item: &LogItem) -> String {
    format!(
        "{} {} {}\n",
        item.timestamp(),
        item.category().padded_label(),
        item.content()
    )
}

/// Render the newline-terminated console line with a colorized label
pub fn console_line(item: &LogItem) -> String {
    format!(
        "{} {} {}\n",
        item.timestamp(),
        item.category().colorize(&item.category().padded_label()),
        item.content()
    )
}

/// A plain logfile line split back into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    /// Timestamp text as written (short or long form)
    pub timestamp: String,
    pub category: Category,
    pub content: String,
}

/// Parse a plain logfile line
///
/// Returns `None` when the timestamp is malformed or the label is unknown.
pub fn parse_line(line: &str) -> Option<ParsedLine> {
    let line = line.trim_end_matches(['\n', '\r']);

    // Long timestamps carry a date token before the time token
    let (first, rest) = line.split_once(' ')?;
    let (timestamp, rest) = if first.contains('/') {
        let (time, rest) = rest.split_once(' ')?;
        let timestamp = format!("{} {}", first, time);
        NaiveDateTime::parse_from_str(&timestamp, LONG_FORMAT).ok()?;
        (timestamp, rest)
    } else {
        NaiveTime::parse_from_str(first, SHORT_FORMAT).ok()?;
        (first.to_string(), rest)
    };

    // The label column is always LABEL_WIDTH wide, followed by one space
    let category = Category::from_label(rest.get(..LABEL_WIDTH)?)?;
    let content = rest.get(LABEL_WIDTH..)?.strip_prefix(' ')?.to_string();

    Some(ParsedLine {
        timestamp,
        category,
        content,
    })
}
