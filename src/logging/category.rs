//! Log categories and their console colors

use crossterm::style::Stylize;

/// Width every label is padded to so that content columns line up
pub const LABEL_WIDTH: usize = 8;

/// How much of the capture time a line shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampMode {
    /// `HH:MM:SS`
    Short,
    /// `YYYY/Month/DD HH:MM:SS`
    Long,
}

/// The four fixed log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Process startup banner, logged with the full date
    Startup,
    /// Log-and-die: the writer stops and the process exits after this line
    Fatal,
    General,
    Warning,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Startup,
        Category::Fatal,
        Category::General,
        Category::Warning,
    ];

    /// Get the label written in front of the content
    pub fn label(&self) -> &'static str {
        match self {
            Category::Startup => "STARTUP:",
            Category::Fatal => "FATAL:",
            Category::General => "GENERAL:",
            Category::Warning => "WARNING:",
        }
    }

    /// Get the label padded to [`LABEL_WIDTH`]
    pub fn padded_label(&self) -> String {
        format!("{:<width$}", self.label(), width = LABEL_WIDTH)
    }

    /// Look up a category from its label, ignoring padding
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|c| c.label() == label)
    }

    pub fn timestamp_mode(&self) -> TimestampMode {
        match self {
            Category::Startup => TimestampMode::Long,
            Category::Fatal | Category::General | Category::Warning => TimestampMode::Short,
        }
    }

    /// Check if the process must terminate once this item is written
    pub fn is_fatal(&self) -> bool {
        matches!(self, Category::Fatal)
    }

    /// Wrap `text` in this category's ANSI color for console display
    ///
    /// Only the console sink calls this; logfiles stay plain text.
    pub fn colorize(&self, text: &str) -> String {
        let styled = match self {
            Category::Startup => text.green().bold(),
            Category::Fatal => text.red().bold(),
            Category::General => text.blue().bold(),
            Category::Warning => text.yellow().bold(),
        };
        styled.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_fit_width() {
        for category in Category::ALL {
            assert!(category.label().len() <= LABEL_WIDTH);
            assert_eq!(category.padded_label().len(), LABEL_WIDTH);
        }
        assert_eq!(Category::Fatal.padded_label(), "FATAL:  ");
    }

    #[test]
    fn test_from_label() {
        assert_eq!(Category::from_label("GENERAL:"), Some(Category::General));
        assert_eq!(Category::from_label("FATAL:  "), Some(Category::Fatal));
        assert_eq!(Category::from_label("INFO:"), None);
    }

    #[test]
    fn test_only_startup_uses_long_timestamp() {
        assert_eq!(Category::Startup.timestamp_mode(), TimestampMode::Long);
        assert_eq!(Category::General.timestamp_mode(), TimestampMode::Short);
        assert_eq!(Category::Warning.timestamp_mode(), TimestampMode::Short);
        assert_eq!(Category::Fatal.timestamp_mode(), TimestampMode::Short);
    }

    #[test]
    fn test_only_fatal_is_fatal() {
        let fatal: Vec<_> = Category::ALL.into_iter().filter(|c| c.is_fatal()).collect();
        assert_eq!(fatal, vec![Category::Fatal]);
    }

    #[test]
    fn test_colorize_wraps_label() {
        for category in Category::ALL {
            let colored = category.colorize(category.label());
            assert!(colored.contains('\x1b'));
            assert!(colored.contains(category.label()));
            assert_ne!(colored, category.label());
        }
    }
}
