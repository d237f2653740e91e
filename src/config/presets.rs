//! Command preset files
//!
//! A preset file stores the quick-send command list and the labels shown next
//! to each value slot. Two formats are accepted:
//!
//! - `.json`: `{ "commands": [...], "labels": [...] }`
//! - `.txt`: one entry per line, the first [`PRESET_COMMANDS`] lines are
//!   commands and the following [`PRESET_LABELS`] lines are labels
//!
//! Presets are always saved as pretty-printed JSON.

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Number of quick-send command entries
pub const PRESET_COMMANDS: usize = 33;

/// Number of value slot labels
pub const PRESET_LABELS: usize = 60;

/// Quick-send commands and value slot labels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPresets {
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl CommandPresets {
    /// Load presets, choosing the format by file extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let presets = match ext.as_deref() {
            Some("json") => {
                let content = read(path)?;
                serde_json::from_str(&content).map_err(|e| {
                    MonitorError::Config(format!("Failed to parse preset file {:?}: {}", path, e))
                })?
            }
            Some("txt") => Self::from_text(&read(path)?),
            other => {
                return Err(MonitorError::Config(format!(
                    "Unsupported file type: {}",
                    other.unwrap_or("(none)")
                )))
            }
        };

        tracing::info!(
            "Loaded {} commands and {} labels from {:?}",
            presets.commands.len(),
            presets.labels.len(),
            path
        );
        Ok(presets)
    }

    /// Parse the line-per-entry text format
    pub fn from_text(content: &str) -> Self {
        let lines: Vec<String> = content.lines().map(|l| l.trim().to_string()).collect();
        let commands = lines.iter().take(PRESET_COMMANDS).cloned().collect();
        let labels = lines
            .iter()
            .skip(PRESET_COMMANDS)
            .take(PRESET_LABELS)
            .cloned()
            .collect();
        Self { commands, labels }
    }

    /// Save presets as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)
            .map_err(|e| MonitorError::Config(format!("Failed to write preset file: {}", e)))
    }

    /// Command at a quick-send slot, if set and non-empty
    pub fn command(&self, slot: usize) -> Option<&str> {
        self.commands
            .get(slot)
            .map(String::as_str)
            .filter(|c| !c.trim().is_empty())
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        MonitorError::Config(format!("Failed to read preset file {:?}: {}", path, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_format_split() {
        let mut content = String::new();
        for i in 0..PRESET_COMMANDS {
            content.push_str(&format!("cmd{}\n", i));
        }
        for i in 0..(PRESET_LABELS + 5) {
            content.push_str(&format!(" label{} \n", i));
        }

        let presets = CommandPresets::from_text(&content);
        assert_eq!(presets.commands.len(), PRESET_COMMANDS);
        assert_eq!(presets.labels.len(), PRESET_LABELS);
        assert_eq!(presets.commands[32], "cmd32");
        assert_eq!(presets.labels[0], "label0");
    }

    #[test]
    fn test_short_text_file() {
        let presets = CommandPresets::from_text("a\nb\n");
        assert_eq!(presets.commands, vec!["a", "b"]);
        assert!(presets.labels.is_empty());
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("init_load_cmd.json");
        let presets = CommandPresets {
            commands: vec!["PI?".to_string(), String::new()],
            labels: vec!["Voltage".to_string()],
        };
        presets.save(&path).unwrap();
        let loaded = CommandPresets::load(&path).unwrap();
        assert_eq!(loaded, presets);
        assert_eq!(loaded.command(0), Some("PI?"));
        assert_eq!(loaded.command(1), None);
        assert_eq!(loaded.command(40), None);
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.csv");
        std::fs::write(&path, "x").unwrap();
        let err = CommandPresets::load(&path).unwrap_err();
        assert!(err.to_string().contains("Unsupported file type: csv"));
    }
}
