//! Command history and keystroke lossage.

use keyweave_stroke::Stroke;
use std::collections::VecDeque;

/// Full-command history, oldest first, without duplicates.
#[derive(Debug, Clone, Default)]
pub struct CommandHistory {
    entries: Vec<String>,
    cursor: Option<usize>,
}

impl CommandHistory {
    /// Creates a history from existing entries, oldest first.
    pub fn with_entries(entries: impl IntoIterator<Item = String>) -> Self {
        let mut history = Self::default();
        for entry in entries {
            history.add(&entry);
        }
        history
    }

    /// Moves `command` to the most recent position.
    pub fn add(&mut self, command: &str) {
        self.entries.retain(|e| e != command);
        self.entries.push(command.to_string());
        self.cursor = None;
    }

    /// Steps toward older entries. Stops at the oldest.
    pub fn backward(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let index = match self.cursor {
            None => self.entries.len() - 1,
            Some(i) => i.saturating_sub(1),
        };
        self.cursor = Some(index);
        self.entries.get(index).map(String::as_str)
    }

    /// Steps toward newer entries. Past the newest, returns `None` and
    /// leaves the cursor unset.
    pub fn forward(&mut self) -> Option<&str> {
        match self.cursor {
            Some(i) if i + 1 < self.entries.len() => {
                self.cursor = Some(i + 1);
                self.entries.get(i + 1).map(String::as_str)
            }
            _ => {
                self.cursor = None;
                None
            }
        }
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = None;
    }

    /// Most recent entry.
    pub fn last(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

/// The most recent keystrokes, newest first.
#[derive(Debug, Clone)]
pub struct Lossage {
    limit: usize,
    strokes: VecDeque<Stroke>,
}

impl Lossage {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            strokes: VecDeque::with_capacity(limit),
        }
    }

    pub fn push(&mut self, stroke: Stroke) {
        if self.limit == 0 {
            return;
        }
        self.strokes.push_front(stroke);
        self.strokes.truncate(self.limit);
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
        self.strokes.truncate(limit);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stroke> {
        self.strokes.iter()
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_moves_to_end() {
        let mut history = CommandHistory::with_entries(["a", "b", "c"].map(String::from));
        history.add("a");
        assert_eq!(history.entries(), ["b", "c", "a"]);
        assert_eq!(history.last(), Some("a"));
    }

    #[test]
    fn test_navigation() {
        let mut history = CommandHistory::with_entries(["old", "mid", "new"].map(String::from));
        assert_eq!(history.backward(), Some("new"));
        assert_eq!(history.backward(), Some("mid"));
        assert_eq!(history.backward(), Some("old"));
        assert_eq!(history.backward(), Some("old"));
        assert_eq!(history.forward(), Some("mid"));
        assert_eq!(history.forward(), Some("new"));
        assert_eq!(history.forward(), None);
        assert_eq!(history.backward(), Some("new"));
    }

    #[test]
    fn test_empty_history() {
        let mut history = CommandHistory::default();
        assert_eq!(history.backward(), None);
        assert_eq!(history.forward(), None);
    }

    #[test]
    fn test_lossage_keeps_newest() {
        let mut lossage = Lossage::new(2);
        for spec in ["a", "b", "c"] {
            lossage.push(Stroke::parse(spec).unwrap());
        }
        let seen: Vec<&str> = lossage.iter().map(Stroke::as_str).collect();
        assert_eq!(seen, vec!["c", "b"]);
    }
}
