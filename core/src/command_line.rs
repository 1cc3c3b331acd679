//! Console input line: text buffer, autocomplete dropdown and history recall.

use std::time::Duration;
use std::time::Instant;

use crate::history::CommandHistory;
use crate::suggest::SuggestionEngine;
use crate::suggest::accept_suggestion;
use crate::suggest::command_token;

/// Time between losing focus and closing the dropdown, long enough for a
/// pointer click on a candidate to land first.
const BLUR_GRACE: Duration = Duration::from_millis(200);

/// Front-end independent key vocabulary understood by [`CommandLine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKey {
    Char(char),
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
    Up,
    Down,
    Enter,
    Tab,
    Escape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The key was handled (or deliberately swallowed) by the input line.
    Consumed,
    /// Enter on a complete command; the buffer has already been cleared.
    Submit(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Idle,
    Suggesting,
}

#[derive(Debug, Clone)]
pub struct CommandLine {
    engine: SuggestionEngine,
    text: String,
    /// Byte offset into `text`, always on a char boundary.
    cursor: usize,
    suggestions: Vec<String>,
    dropdown_open: bool,
    highlighted: Option<usize>,
    close_at: Option<Instant>,
}

impl CommandLine {
    pub fn new(engine: SuggestionEngine) -> Self {
        let suggestions = engine.suggest("");
        Self {
            engine,
            text: String::new(),
            cursor: 0,
            suggestions,
            dropdown_open: false,
            highlighted: None,
            close_at: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    pub fn mode(&self) -> InputMode {
        if self.dropdown_open && !self.suggestions.is_empty() {
            InputMode::Suggesting
        } else {
            InputMode::Idle
        }
    }

    /// Replace the buffer without opening the dropdown.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.cursor = self.text.len();
        self.refresh_suggestions();
        self.close_dropdown();
    }

    pub fn handle_key(&mut self, key: InputKey, history: &mut CommandHistory) -> KeyOutcome {
        match key {
            InputKey::Char(ch) => {
                self.text.insert(self.cursor, ch);
                self.cursor += ch.len_utf8();
                self.on_edit();
            }
            InputKey::Backspace => {
                if let Some(prev) = self.prev_boundary() {
                    self.text.replace_range(prev..self.cursor, "");
                    self.cursor = prev;
                    self.on_edit();
                }
            }
            InputKey::Delete => {
                if let Some(next) = self.next_boundary() {
                    self.text.replace_range(self.cursor..next, "");
                    self.on_edit();
                }
            }
            InputKey::Left => {
                if let Some(prev) = self.prev_boundary() {
                    self.cursor = prev;
                }
            }
            InputKey::Right => {
                if let Some(next) = self.next_boundary() {
                    self.cursor = next;
                }
            }
            InputKey::Home => self.cursor = 0,
            InputKey::End => self.cursor = self.text.len(),
            InputKey::Up => {
                if self.mode() == InputMode::Suggesting {
                    self.highlight_previous();
                } else if let Some(entry) = history.recall_older() {
                    let entry = entry.to_string();
                    self.set_text(entry);
                }
            }
            InputKey::Down => {
                if self.mode() == InputMode::Suggesting {
                    self.highlight_next();
                } else if let Some(entry) = history.recall_newer() {
                    let entry = entry.to_string();
                    self.set_text(entry);
                }
            }
            InputKey::Tab => {
                if let Some(candidate) = self.highlighted_candidate() {
                    let candidate = candidate.to_string();
                    self.accept(&candidate);
                }
            }
            InputKey::Enter => return self.on_enter(),
            InputKey::Escape => self.close_dropdown(),
        }
        KeyOutcome::Consumed
    }

    fn on_enter(&mut self) -> KeyOutcome {
        let token = command_token(&self.text).to_lowercase();
        let pending = self
            .highlighted_candidate()
            .filter(|candidate| candidate.to_lowercase() != token)
            .map(str::to_string);
        if let Some(candidate) = pending {
            self.accept(&candidate);
            return KeyOutcome::Consumed;
        }
        if self.engine.is_exact_match(&token) {
            let submitted = std::mem::take(&mut self.text);
            self.cursor = 0;
            self.close_dropdown();
            self.refresh_suggestions();
            return KeyOutcome::Submit(submitted);
        }
        KeyOutcome::Consumed
    }

    /// Pointer selection of a dropdown entry.
    pub fn click_suggestion(&mut self, index: usize) -> bool {
        match self.suggestions.get(index) {
            Some(candidate) => {
                let candidate = candidate.clone();
                self.accept(&candidate);
                true
            }
            None => false,
        }
    }

    /// Hover over a dropdown entry.
    pub fn hover_suggestion(&mut self, index: usize) {
        if index < self.suggestions.len() {
            self.highlighted = Some(index);
        }
    }

    pub fn focus(&mut self) {
        self.close_at = None;
        self.dropdown_open = true;
    }

    /// Schedule the dropdown to close once the grace period has elapsed.
    pub fn blur(&mut self, now: Instant) {
        self.close_at = Some(now + BLUR_GRACE);
    }

    /// Apply a pending blur close. Returns true when the dropdown closed.
    pub fn flush_blur(&mut self, now: Instant) -> bool {
        match self.close_at {
            Some(deadline) if now >= deadline => {
                self.close_at = None;
                self.dropdown_open = false;
                true
            }
            _ => false,
        }
    }

    pub fn recommended_blur_delay() -> Duration {
        BLUR_GRACE
    }

    fn on_edit(&mut self) {
        self.refresh_suggestions();
        self.dropdown_open = true;
    }

    fn refresh_suggestions(&mut self) {
        self.suggestions = self.engine.suggest(&self.text);
        self.highlighted = None;
    }

    fn accept(&mut self, candidate: &str) {
        self.text = accept_suggestion(&self.text, candidate);
        self.cursor = self.text.len();
        self.refresh_suggestions();
        self.close_dropdown();
    }

    fn close_dropdown(&mut self) {
        self.dropdown_open = false;
        self.highlighted = None;
    }

    fn highlighted_candidate(&self) -> Option<&str> {
        if !self.dropdown_open {
            return None;
        }
        self.highlighted
            .and_then(|idx| self.suggestions.get(idx))
            .map(String::as_str)
    }

    fn highlight_next(&mut self) {
        let len = self.suggestions.len();
        self.highlighted = Some(match self.highlighted {
            Some(idx) if idx + 1 < len => idx + 1,
            _ => 0,
        });
    }

    fn highlight_previous(&mut self) {
        let len = self.suggestions.len();
        self.highlighted = Some(match self.highlighted {
            Some(idx) if idx > 0 => idx - 1,
            _ => len - 1,
        });
    }

    fn prev_boundary(&self) -> Option<usize> {
        self.text[..self.cursor]
            .char_indices()
            .next_back()
            .map(|(idx, _)| idx)
    }

    fn next_boundary(&self) -> Option<usize> {
        self.text[self.cursor..]
            .chars()
            .next()
            .map(|ch| self.cursor + ch.len_utf8())
    }
}
