use chrono::{DateTime, Local};

use super::category::Category;
use super::format::format_timestamp;

/// A single log event on its way to the writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogItem {
    category: Category,
    content: String,
    created_at: DateTime<Local>,
}

impl LogItem {
    /// Create an item captured now
    pub fn new(category: Category, content: impl Into<String>) -> Self {
        Self::at(category, content, Local::now())
    }

    /// Create an item with an explicit capture time
    pub fn at(category: Category, content: impl Into<String>, created_at: DateTime<Local>) -> Self {
        Self {
            category,
            content: content.into(),
            created_at,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    /// Capture time rendered in the category's timestamp mode
    pub fn timestamp(&self) -> String {
        format_timestamp(&self.created_at, self.category.timestamp_mode())
    }
}
