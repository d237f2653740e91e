//! Sent-command history with up/down navigation

/// Default number of commands remembered
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

/// Commands sent by the user, oldest first
#[derive(Debug, Clone)]
pub struct CommandHistory {
    entries: Vec<String>,
    /// Navigation position; `entries.len()` means "new input"
    cursor: usize,
    limit: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl CommandHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            limit: limit.max(1),
        }
    }

    /// Record a sent command and reset navigation to the end
    ///
    /// Empty commands and repeats of the most recent command are not stored.
    pub fn push(&mut self, command: &str) {
        if !command.is_empty() && self.entries.last().map(String::as_str) != Some(command) {
            self.entries.push(command.to_string());
            if self.entries.len() > self.limit {
                let excess = self.entries.len() - self.limit;
                self.entries.drain(..excess);
            }
        }
        self.cursor = self.entries.len();
    }

    /// Step back; stays on the oldest entry once reached
    pub fn previous(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        self.cursor = self.cursor.saturating_sub(1);
        self.entries.get(self.cursor).map(String::as_str)
    }

    /// Step forward; `None` once past the newest entry (empty input)
    pub fn next(&mut self) -> Option<&str> {
        if self.cursor < self.entries.len() {
            self.cursor += 1;
        }
        self.entries.get(self.cursor).map(String::as_str)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
