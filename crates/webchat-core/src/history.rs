//! Bounded history of recent chat messages.

use std::collections::VecDeque;
use std::sync::Arc;
use webchat_protocol::Message;

/// Default number of messages kept.
pub const DEFAULT_HISTORY_SIZE: usize = 5;

/// FIFO window over the last `capacity` chat messages.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<Arc<Message>>,
    capacity: usize,
}

impl History {
    /// Create a history with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_SIZE)
    }

    /// Create a history keeping at most `capacity` messages.
    ///
    /// A capacity of zero disables history.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a message, evicting the oldest when over capacity.
    pub fn push(&mut self, message: Arc<Message>) {
        if self.capacity == 0 {
            return;
        }
        self.entries.push_back(message);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Message>> {
        self.entries.iter()
    }

    /// Copy the current contents, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Message>> {
        self.entries.iter().cloned().collect()
    }

    /// Number of messages held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of messages held.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(n: usize) -> Arc<Message> {
        Arc::new(Message::chat("tester", format!("m{n}")))
    }

    #[test]
    fn test_history_keeps_last_five() {
        let mut history = History::new();
        for n in 1..=8 {
            history.push(chat(n));
            assert!(history.len() <= DEFAULT_HISTORY_SIZE);
        }

        let texts: Vec<_> = history.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["m4", "m5", "m6", "m7", "m8"]);
    }

    #[test]
    fn test_history_under_capacity() {
        let mut history = History::with_capacity(3);
        history.push(chat(1));
        history.push(chat(2));

        assert_eq!(history.len(), 2);
        assert_eq!(history.snapshot()[0].text, "m1");
    }

    #[test]
    fn test_history_disabled() {
        let mut history = History::with_capacity(0);
        history.push(chat(1));
        assert!(history.is_empty());
    }
}
