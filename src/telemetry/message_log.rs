//! Bounded, time-ordered history of classified messages.

use chrono::{Local, NaiveTime};
use std::collections::VecDeque;
use std::fmt;

/// Number of entries kept when no capacity is configured.
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Closed set of entry categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    Hazard,
    Reroute,
    Alternative,
    Autonomous,
    Status,
    ScreenCommand,
    Other,
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            LogKind::Hazard => "HAZARD",
            LogKind::Reroute => "REROUTE",
            LogKind::Alternative => "ALTERNATIVE",
            LogKind::Autonomous => "AUTONOMOUS",
            LogKind::Status => "STATUS",
            LogKind::ScreenCommand => "SCREEN_COMMAND",
            LogKind::Other => "OTHER",
        };
        write!(f, "{}", name)
    }
}

/// One immutable line of the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    kind: LogKind,
    title: String,
    description: String,
    received_at: NaiveTime,
}

impl LogEntry {
    /// Stamps the entry with the current local wall-clock time.
    pub fn new(kind: LogKind, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::at(kind, title, description, Local::now().time())
    }

    pub fn at(
        kind: LogKind,
        title: impl Into<String>,
        description: impl Into<String>,
        received_at: NaiveTime,
    ) -> Self {
        LogEntry {
            kind,
            title: title.into(),
            description: description.into(),
            received_at,
        }
    }

    pub fn kind(&self) -> LogKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn received_at(&self) -> NaiveTime {
        self.received_at
    }

    /// Ingestion time as `HH:MM:SS`.
    pub fn timestamp(&self) -> String {
        self.received_at.format("%H:%M:%S").to_string()
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.description.is_empty() {
            write!(f, "[{}] {} {}", self.timestamp(), self.kind, self.title)
        } else {
            write!(
                f,
                "[{}] {} {}: {}",
                self.timestamp(),
                self.kind,
                self.title,
                self.description
            )
        }
    }
}

/// Sliding window over the most recent entries, oldest evicted first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    appended: u64,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl MessageLog {
    /// A capacity of zero is raised to one so the newest entry is always visible.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        MessageLog {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            appended: 0,
        }
    }

    pub fn append(&mut self, entry: LogEntry) {
        self.entries.push_back(entry);
        self.appended += 1;
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of entries ever appended, evicted ones included.
    pub fn total_appended(&self) -> u64 {
        self.appended
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    /// Entries appended after the caller had seen `seen` of them in total.
    ///
    /// Entries that were already evicted are skipped.
    pub fn since(&self, seen: u64) -> impl Iterator<Item = &LogEntry> {
        let fresh = self.appended.saturating_sub(seen).min(self.entries.len() as u64) as usize;
        self.entries.iter().skip(self.entries.len() - fresh)
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> LogEntry {
        LogEntry::new(LogKind::Other, format!("entry {}", n), "")
    }

    #[test]
    fn keeps_the_most_recent_hundred() {
        let mut log = MessageLog::default();
        for n in 1..=101 {
            log.append(entry(n));
        }

        assert_eq!(log.len(), 100);
        let titles: Vec<_> = log.iter().map(|e| e.title().to_string()).collect();
        let expected: Vec<_> = (2..=101).map(|n| format!("entry {}", n)).collect();
        assert_eq!(titles, expected);
        assert_eq!(log.total_appended(), 101);
    }

    #[test]
    fn below_capacity_nothing_is_evicted() {
        let mut log = MessageLog::with_capacity(5);
        for n in 0..3 {
            log.append(entry(n));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.iter().next().map(|e| e.title()), Some("entry 0"));
    }

    #[test]
    fn since_reports_only_unseen_entries() {
        let mut log = MessageLog::with_capacity(3);
        for n in 0..2 {
            log.append(entry(n));
        }
        let seen = log.total_appended();
        for n in 2..7 {
            log.append(entry(n));
        }

        // five new entries, but only three are still in the window
        let fresh: Vec<_> = log.since(seen).map(|e| e.title().to_string()).collect();
        assert_eq!(fresh, vec!["entry 4", "entry 5", "entry 6"]);
        assert_eq!(log.since(log.total_appended()).count(), 0);
    }

    #[test]
    fn timestamp_is_hours_minutes_seconds() {
        let at = NaiveTime::from_hms_opt(9, 5, 7).unwrap();
        let e = LogEntry::at(LogKind::Hazard, "Ice", "slippery", at);
        assert_eq!(e.timestamp(), "09:05:07");
        assert_eq!(e.to_string(), "[09:05:07] HAZARD Ice: slippery");
    }

    #[test]
    fn zero_capacity_still_keeps_latest() {
        let mut log = MessageLog::with_capacity(0);
        log.append(entry(1));
        log.append(entry(2));
        assert_eq!(log.len(), 1);
        assert_eq!(log.latest().map(|e| e.title()), Some("entry 2"));
    }
}
