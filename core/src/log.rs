use std::collections::VecDeque;
use std::fmt;

use chrono::DateTime;
use chrono::Local;
use chrono::TimeZone;

pub const DEFAULT_LOG_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Command,
    System,
    Error,
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogCategory::Command => "COMMAND",
            LogCategory::System => "SYSTEM",
            LogCategory::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// One console line. Locally created lines are formatted once, at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    text: String,
    category: Option<LogCategory>,
}

impl LogEntry {
    /// A line received from the server, stored verbatim.
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: None,
        }
    }

    pub fn tagged(category: LogCategory, message: &str) -> Self {
        Self::tagged_at(&Local::now(), category, message)
    }

    pub fn tagged_at<Tz>(at: &DateTime<Tz>, category: LogCategory, message: &str) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        Self {
            text: format!("[{}] [{category}]: {message}", at.format("%H:%M:%S")),
            category: Some(category),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn category(&self) -> Option<LogCategory> {
        self.category
    }
}

/// Insertion-ordered console lines; the oldest go first once full.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl LogBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY)),
            capacity,
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &LogEntry> + ExactSizeIterator {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }
}
