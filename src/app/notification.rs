// ABOUTME: Transient notices shown in the status bar, plus a timestamped log of all of them
// Raised for gateway confirmations, gateway errors and transport failures, each with an expiry

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use tokio::time::{Duration, Instant};

pub const NOTICE_DURATION: Duration = Duration::from_secs(5);
const MAX_NOTICES: usize = 8;
/// Entries kept in the log panel
pub const LOG_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub level: NoticeLevel,
    pub created_at: Instant,
    pub duration: Duration,
}

impl Notice {
    pub fn new(message: impl Into<String>, level: NoticeLevel) -> Self {
        Self {
            message: message.into(),
            level,
            created_at: Instant::now(),
            duration: NOTICE_DURATION,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, NoticeLevel::Success)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, NoticeLevel::Info)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, NoticeLevel::Warning)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, NoticeLevel::Error)
    }

    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.duration
    }
}

/// A notice as recorded in the log panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub at: DateTime<Local>,
    pub level: NoticeLevel,
    pub message: String,
}

impl LogEntry {
    /// `[HH:MM:SS] message`
    pub fn line(&self) -> String {
        format!("[{}] {}", self.at.format("%H:%M:%S"), self.message)
    }
}

/// Bounded queue of live notices, newest last, and the log they leave behind
#[derive(Debug, Default)]
pub struct Notices {
    queue: VecDeque<Notice>,
    log: VecDeque<LogEntry>,
}

impl Notices {
    pub fn push(&mut self, notice: Notice) {
        self.log.push_back(LogEntry {
            at: Local::now(),
            level: notice.level,
            message: notice.message.clone(),
        });
        while self.log.len() > LOG_CAPACITY {
            self.log.pop_front();
        }

        self.queue.push_back(notice);
        while self.queue.len() > MAX_NOTICES {
            self.queue.pop_front();
        }
    }

    /// Logged notices, oldest first. Expiry does not remove them.
    pub fn log(&self) -> impl DoubleEndedIterator<Item = &LogEntry> + ExactSizeIterator {
        self.log.iter()
    }

    /// Drop expired notices
    pub fn prune(&mut self) {
        self.queue.retain(|notice| !notice.is_expired());
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.queue.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn notices_expire_after_their_duration() {
        let mut notices = Notices::default();
        notices.push(Notice::error("boom"));
        tokio::time::advance(Duration::from_secs(3)).await;
        notices.push(Notice::success("connected"));

        tokio::time::advance(Duration::from_millis(2500)).await;
        notices.prune();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices.latest().map(|n| n.level), Some(NoticeLevel::Success));
    }

    #[test]
    fn queue_is_bounded() {
        let mut notices = Notices::default();
        for n in 0..20 {
            notices.push(Notice::info(n.to_string()));
        }
        assert_eq!(notices.len(), MAX_NOTICES);
        assert_eq!(notices.latest().map(|n| n.message.as_str()), Some("19"));
    }

    #[tokio::test(start_paused = true)]
    async fn log_outlives_expiry_and_keeps_the_newest() {
        let mut notices = Notices::default();
        for n in 0..(LOG_CAPACITY + 5) {
            notices.push(Notice::warning(format!("event {n}")));
        }
        tokio::time::advance(Duration::from_secs(10)).await;
        notices.prune();

        assert!(notices.is_empty());
        assert_eq!(notices.log().len(), LOG_CAPACITY);
        assert_eq!(notices.log().next().map(|e| e.message.as_str()), Some("event 5"));

        let newest = notices.log().next_back().unwrap();
        assert_eq!(newest.level, NoticeLevel::Warning);
        assert!(newest.line().starts_with('['));
        assert!(newest.line().ends_with("] event 104"));
    }
}
