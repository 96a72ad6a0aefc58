use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// A non-blocking, user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Queue of notices shared by the controllers of one session. The host drains
/// it and shows the notices however it likes.
#[derive(Clone, Default)]
pub struct NoticeBoard {
    queue: Arc<Mutex<VecDeque<Notice>>>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, level: NoticeLevel, title: impl Into<String>, description: impl Into<String>) {
        let notice = Notice {
            level,
            title: title.into(),
            description: description.into(),
            created_at: Utc::now(),
        };
        match self.queue.lock() {
            Ok(mut queue) => queue.push_back(notice),
            Err(poisoned) => {
                warn!("Notice queue lock was poisoned, recovering");
                poisoned.into_inner().push_back(notice);
            }
        }
    }

    pub fn success(&self, title: impl Into<String>, description: impl Into<String>) {
        self.push(NoticeLevel::Success, title, description);
    }

    pub fn warning(&self, title: impl Into<String>, description: impl Into<String>) {
        self.push(NoticeLevel::Warning, title, description);
    }

    pub fn error(&self, title: impl Into<String>, description: impl Into<String>) {
        self.push(NoticeLevel::Error, title, description);
    }

    /// Take every queued notice, oldest first.
    pub fn drain(&self) -> Vec<Notice> {
        match self.queue.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self.queue.lock() {
            Ok(queue) => queue.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_returns_in_order_and_empties() {
        let board = NoticeBoard::new();
        board.warning("No file", "pick a file first");
        board.error("Failed", "gateway down");

        let notices = board.drain();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
        assert_eq!(notices[1].title, "Failed");
        assert!(board.is_empty());
    }

    #[test]
    fn test_clones_share_queue() {
        let board = NoticeBoard::new();
        let other = board.clone();
        other.success("Uploaded", "analysing");
        assert_eq!(board.len(), 1);
    }
}
