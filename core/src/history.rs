/// Previously submitted commands with an up/down recall cursor.
///
/// The cursor lives in `[0, len]`; `len` is the "new entry" position.
#[derive(Debug, Clone, Default)]
pub struct CommandHistory {
    entries: Vec<String>,
    cursor: usize,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a submitted command. Blank commands are not stored.
    pub fn push(&mut self, command: impl Into<String>) {
        let command = command.into();
        if !command.trim().is_empty() {
            self.entries.push(command);
        }
        self.reset_cursor();
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = self.entries.len();
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Step towards older entries, stopping at the oldest.
    pub fn recall_older(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        self.cursor = self.cursor.saturating_sub(1);
        self.entries.get(self.cursor).map(String::as_str)
    }

    /// Step towards newer entries. Past the newest entry this yields the
    /// empty string.
    pub fn recall_newer(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        self.cursor = (self.cursor + 1).min(self.entries.len());
        Some(
            self.entries
                .get(self.cursor)
                .map(String::as_str)
                .unwrap_or(""),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn walk_clamps_at_both_ends() {
        let mut history = CommandHistory::new();
        for cmd in ["a", "b", "c"] {
            history.push(cmd);
        }

        let ups: Vec<_> = (0..4)
            .map(|_| history.recall_older().map(str::to_string))
            .collect();
        assert_eq!(
            ups,
            vec![
                Some("c".to_string()),
                Some("b".to_string()),
                Some("a".to_string()),
                Some("a".to_string()),
            ]
        );

        let downs: Vec<_> = (0..4)
            .map(|_| history.recall_newer().map(str::to_string))
            .collect();
        assert_eq!(
            downs,
            vec![
                Some("b".to_string()),
                Some("c".to_string()),
                Some(String::new()),
                Some(String::new()),
            ]
        );
    }

    #[test]
    fn blank_commands_are_skipped_but_reset_the_cursor() {
        let mut history = CommandHistory::new();
        history.push("list");
        history.recall_older();
        assert_eq!(history.cursor(), 0);
        history.push("   ");
        assert_eq!(history.len(), 1);
        assert_eq!(history.cursor(), 1);
    }

    #[test]
    fn empty_history_recalls_nothing() {
        let mut history = CommandHistory::new();
        assert_eq!(history.recall_older(), None);
        assert_eq!(history.recall_newer(), None);
    }

    #[test]
    fn duplicates_are_kept_in_order() {
        let mut history = CommandHistory::new();
        history.push("say hi");
        history.push("say hi");
        assert_eq!(history.entries(), ["say hi", "say hi"]);
    }
}
