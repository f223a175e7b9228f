//! User-facing notices (the banners of the interactive session)

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A single banner shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Notice {
    #[must_use]
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

/// Most notices a board retains before dropping the oldest
pub const DEFAULT_NOTICE_CAPACITY: usize = 256;

#[derive(Debug)]
struct NoticeLog {
    notices: VecDeque<Notice>,
    capacity: usize,
    // Total ever pushed, including dropped ones
    recorded: usize,
}

/// Shared, bounded log of notices for one session
///
/// Clones share the same underlying list, so the remover running on a
/// worker thread and the session front-end see the same banners. Positions
/// passed to [`NoticeBoard::since`] count every notice ever recorded, so they
/// stay valid after old notices are dropped.
#[derive(Debug, Clone)]
pub struct NoticeBoard {
    log: Arc<Mutex<NoticeLog>>,
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_NOTICE_CAPACITY)
    }
}

impl NoticeBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            log: Arc::new(Mutex::new(NoticeLog {
                notices: VecDeque::with_capacity(capacity.min(DEFAULT_NOTICE_CAPACITY)),
                capacity,
                recorded: 0,
            })),
        }
    }

    // Pushes are single operations, so a poisoned log is still consistent
    fn lock(&self) -> MutexGuard<'_, NoticeLog> {
        self.log
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn push(&self, level: NoticeLevel, message: impl Into<String>) {
        let notice = Notice::new(level, message);
        tracing::debug!(level = %notice.level, notice = %notice.message, "Notice recorded");
        let mut log = self.lock();
        if log.notices.len() == log.capacity {
            log.notices.pop_front();
        }
        log.notices.push_back(notice);
        log.recorded += 1;
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Error, message);
    }

    /// Copy of every retained notice, oldest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<Notice> {
        self.lock().notices.iter().cloned().collect()
    }

    /// Number of retained notices at `level`
    #[must_use]
    pub fn count(&self, level: NoticeLevel) -> usize {
        self.lock().notices.iter().filter(|n| n.level == level).count()
    }

    /// Number of retained notices
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().notices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().notices.is_empty()
    }

    /// Notices recorded after position `mark`, with the position to resume from
    ///
    /// Notices dropped before they were read are skipped.
    #[must_use]
    pub fn since(&self, mark: usize) -> (Vec<Notice>, usize) {
        let log = self.lock();
        let first_retained = log.recorded - log.notices.len();
        let skip = mark.saturating_sub(first_retained);
        (log.notices.iter().skip(skip).cloned().collect(), log.recorded)
    }
}
