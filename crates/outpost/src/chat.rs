//! In-memory chat history shown by the `chat` command.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Local};

/// Oldest lines are dropped past this many.
const DEFAULT_CAPACITY: usize = 500;

/// One cached chat line.
#[derive(Debug, Clone)]
pub struct ChatLine {
    pub at: DateTime<Local>,
    pub sender: String,
    pub text: String,
}

impl fmt::Display for ChatLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] │ Chat - [{}] {}",
            self.at.format("%Y-%m-%d %H:%M:%S"),
            self.sender,
            self.text
        )
    }
}

/// Bounded chat history.
#[derive(Debug)]
pub struct ChatCache {
    lines: VecDeque<ChatLine>,
    capacity: usize,
}

impl Default for ChatCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ChatCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, sender: &str, text: &str) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(ChatLine {
            at: Local::now(),
            sender: sender.to_string(),
            text: text.to_string(),
        });
    }

    pub fn lines(&self) -> impl Iterator<Item = &ChatLine> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
