//! Operator-facing event ledger.
//!
//! Human-readable status lines, newest first. Entries are never edited or
//! removed one by one; the ledger only grows or is cleared as a whole.

use std::collections::VecDeque;

/// Newest-first, unbounded list of log lines.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventLog {
    entries: VecDeque<String>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a line; it becomes index 0.
    pub fn push(&mut self, line: impl Into<String>) {
        self.entries.push_front(line.into());
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Lines from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn latest(&self) -> Option<&str> {
        self.get(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if any line equals `line` exactly.
    pub fn contains(&self, line: &str) -> bool {
        self.iter().any(|l| l == line)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    /// Lines added after the ledger held `seen` entries, oldest first.
    /// `seen` is only a count: after a clear, nothing is returned until the
    /// ledger grows past it again.
    pub fn added_since(&self, seen: usize) -> Vec<String> {
        let fresh = self.len().saturating_sub(seen);
        self.entries.range(..fresh).rev().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_entry_is_first() {
        let mut log = EventLog::new();
        log.push("one");
        log.push("two");
        log.push("three");
        assert_eq!(log.to_vec(), ["three", "two", "one"]);
        assert_eq!(log.latest(), Some("three"));
        assert_eq!(log.get(2), Some("one"));
        assert_eq!(log.get(3), None);
    }

    #[test]
    fn clear_then_push_starts_at_zero() {
        let mut log = EventLog::new();
        log.push("old");
        log.clear();
        assert!(log.is_empty());
        log.push("fresh");
        assert_eq!(log.len(), 1);
        assert_eq!(log.get(0), Some("fresh"));
        assert!(!log.contains("old"));
    }

    #[test]
    fn added_since_returns_only_new_lines_in_order() {
        let mut log = EventLog::new();
        log.push("one");
        log.push("two");
        let seen = log.len();
        log.push("three");
        log.push("four");
        assert_eq!(log.added_since(seen), ["three", "four"]);
        assert!(log.added_since(log.len()).is_empty());

        log.clear();
        log.push("five");
        assert!(log.added_since(seen).is_empty());
        assert_eq!(log.added_since(0), ["five"]);
    }
}
