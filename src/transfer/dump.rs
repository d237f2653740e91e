//! Transfer dump files
//!
//! Read results are saved in one of two formats, chosen by file extension:
//!
//! - `.json`: `{ "eeprom_data": { "0": "A", "1": "B" } }`
//! - anything else: one `address=value` line per entry, sorted by address
//!
//! Write jobs take their lines from a `.json` file (`eeprom_data` as a list
//! of lines, or as an address map which becomes `address=value` lines) or a
//! `.txt` file (trimmed, non-empty lines).

use crate::error::{MonitorError, Result, ResultExt};
use crate::protocol::parse_memory_response;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// On-disk format of a dump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpFormat {
    Json,
    Text,
}

impl DumpFormat {
    /// Choose the format from a path's extension
    pub fn from_path(path: &Path) -> Self {
        match extension(path).as_deref() {
            Some("json") => DumpFormat::Json,
            _ => DumpFormat::Text,
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Memory contents collected by a read transfer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDump {
    pub eeprom_data: BTreeMap<u32, String>,
}

impl TransferDump {
    pub fn new(eeprom_data: BTreeMap<u32, String>) -> Self {
        Self { eeprom_data }
    }

    /// Render as `address=value` lines sorted by address
    pub fn to_text(&self) -> String {
        self.eeprom_data
            .iter()
            .map(|(address, value)| format!("{}={}", address, value))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parse `address=value` lines, skipping anything malformed
    pub fn from_text(content: &str) -> Self {
        let mut eeprom_data = BTreeMap::new();
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match parse_memory_response(line) {
                Some(cell) => {
                    eeprom_data.insert(cell.address, cell.value);
                }
                None => tracing::warn!("Skipping malformed dump line: {}", line),
            }
        }
        Self { eeprom_data }
    }

    /// Save in the format implied by the path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = match DumpFormat::from_path(path) {
            DumpFormat::Json => serde_json::to_string_pretty(self)?,
            DumpFormat::Text => self.to_text(),
        };
        std::fs::write(path, content).with_context(|| format!("Writing dump {:?}", path))?;
        tracing::info!("Saved {} entries to {:?}", self.eeprom_data.len(), path);
        Ok(())
    }

    /// Load a dump saved by [`TransferDump::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Reading dump {:?}", path))?;
        match DumpFormat::from_path(path) {
            DumpFormat::Json => Ok(serde_json::from_str(&content)?),
            DumpFormat::Text => Ok(Self::from_text(&content)),
        }
    }

    /// Lines for a write job that restores this dump
    pub fn to_write_lines(&self) -> Vec<String> {
        self.eeprom_data
            .iter()
            .map(|(address, value)| format!("{}={}", address, value))
            .collect()
    }
}

/// Load the lines of a write job from a `.json` or `.txt` file
pub fn load_write_lines(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let ext = extension(path);
    let lines = match ext.as_deref() {
        Some("json") => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Reading write file {:?}", path))?;
            let value: serde_json::Value = serde_json::from_str(&content)?;
            lines_from_json(&value)?
        }
        Some("txt") => std::fs::read_to_string(path)
            .with_context(|| format!("Reading write file {:?}", path))?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
        other => {
            return Err(MonitorError::Config(format!(
                "Unsupported file type: {}",
                other.unwrap_or("(none)")
            )))
        }
    };

    tracing::info!("Loaded {} write lines from {:?}", lines.len(), path);
    Ok(lines)
}

fn lines_from_json(value: &serde_json::Value) -> Result<Vec<String>> {
    use serde_json::Value;

    match value.get("eeprom_data") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.iter().map(json_text).collect()),
        Some(Value::Object(map)) => {
            let mut entries = Vec::with_capacity(map.len());
            for (key, item) in map {
                let address = key.trim().parse::<u32>().map_err(|_| {
                    MonitorError::Config(format!("Invalid address key in eeprom_data: {}", key))
                })?;
                entries.push((address, json_text(item)));
            }
            entries.sort_by_key(|(address, _)| *address);
            Ok(entries
                .into_iter()
                .map(|(address, value)| format!("{}={}", address, value))
                .collect())
        }
        Some(_) => Err(MonitorError::Config(
            "eeprom_data must be a list or an object".to_string(),
        )),
    }
}

fn json_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TransferDump {
        TransferDump::new(
            [(10, "0A"), (2, "FF"), (3, "")]
                .into_iter()
                .map(|(k, v)| (k, v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_text_is_sorted() {
        assert_eq!(sample().to_text(), "2=FF\n3=\n10=0A");
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["eeprom_data"]["10"], "0A");
    }

    #[test]
    fn test_save_load_both_formats() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["dump.json", "dump.txt", "dump"] {
            let path = dir.path().join(name);
            sample().save(&path).unwrap();
            assert_eq!(TransferDump::load(&path).unwrap(), sample(), "{}", name);
        }
    }

    #[test]
    fn test_write_lines_from_json_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rom.json");
        std::fs::write(&path, r#"{"eeprom_data": ["0=1", "1=2", 3]}"#).unwrap();
        assert_eq!(load_write_lines(&path).unwrap(), vec!["0=1", "1=2", "3"]);
    }

    #[test]
    fn test_write_lines_from_saved_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.json");
        sample().save(&path).unwrap();
        assert_eq!(
            load_write_lines(&path).unwrap(),
            sample().to_write_lines()
        );
        assert_eq!(sample().to_write_lines(), vec!["2=FF", "3=", "10=0A"]);
    }

    #[test]
    fn test_write_lines_from_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rom.txt");
        std::fs::write(&path, "  0=1 \n\n1=2\n   \n").unwrap();
        assert_eq!(load_write_lines(&path).unwrap(), vec!["0=1", "1=2"]);
    }

    #[test]
    fn test_write_lines_missing_key_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rom.json");
        std::fs::write(&path, r#"{"other": 1}"#).unwrap();
        assert!(load_write_lines(&path).unwrap().is_empty());
    }

    #[test]
    fn test_write_lines_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rom.bin");
        std::fs::write(&path, "x").unwrap();
        assert!(load_write_lines(&path)
            .unwrap_err()
            .to_string()
            .contains("Unsupported file type"));
    }
}
