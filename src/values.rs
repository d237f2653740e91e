//! Indexed value slots fed by `PI` records

use crate::types::DEFAULT_VALUE_SLOTS;

/// Latest raw reading and label for each value slot
#[derive(Debug, Clone)]
pub struct ValueTable {
    values: Vec<String>,
    labels: Vec<String>,
}

impl Default for ValueTable {
    fn default() -> Self {
        Self::new(DEFAULT_VALUE_SLOTS)
    }
}

impl ValueTable {
    /// Create a table with empty values and `Value N` labels
    pub fn new(slots: usize) -> Self {
        Self {
            values: vec![String::new(); slots],
            labels: (0..slots).map(|i| format!("Value {}", i)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Store a reading; returns false when the index has no slot
    pub fn update(&mut self, index: usize, raw_value: &str) -> bool {
        match self.values.get_mut(index) {
            Some(slot) => {
                slot.clear();
                slot.push_str(raw_value);
                true
            }
            None => false,
        }
    }

    pub fn value(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Replace labels from a preset list; missing entries keep their label
    pub fn set_labels<S: AsRef<str>>(&mut self, labels: &[S]) {
        for (slot, label) in self.labels.iter_mut().zip(labels) {
            *slot = label.as_ref().to_string();
        }
    }

    /// Slots shown in the compact view: the last quarter of the table
    pub fn right_column(&self) -> std::ops::Range<usize> {
        let len = self.values.len();
        (len - len / 4)..len
    }

    /// Iterate `(label, value)` pairs for a range of slots
    pub fn entries(
        &self,
        range: std::ops::Range<usize>,
    ) -> impl Iterator<Item = (&str, &str)> + '_ {
        let range = range.start.min(self.len())..range.end.min(self.len());
        range.map(move |i| (self.labels[i].as_str(), self.values[i].as_str()))
    }

    /// Forget every reading, keeping labels
    pub fn clear_values(&mut self) {
        self.values.iter_mut().for_each(String::clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_in_range() {
        let mut table = ValueTable::default();
        assert!(table.update(59, "3.3"));
        assert_eq!(table.value(59), Some("3.3"));
        assert!(!table.update(60, "x"));
    }

    #[test]
    fn test_right_column_is_last_fifteen() {
        let table = ValueTable::default();
        assert_eq!(table.right_column(), 45..60);
        assert_eq!(table.entries(table.right_column()).count(), 15);
    }

    #[test]
    fn test_labels_from_presets() {
        let mut table = ValueTable::new(3);
        table.set_labels(&["Voltage", "Current"]);
        assert_eq!(table.labels(), &["Voltage", "Current", "Value 2"]);
    }

    #[test]
    fn test_entries_clamped() {
        let mut table = ValueTable::new(2);
        table.update(1, "b");
        let entries: Vec<_> = table.entries(0..10).collect();
        assert_eq!(entries, vec![("Value 0", ""), ("Value 1", "b")]);
        table.clear_values();
        assert_eq!(table.value(1), Some(""));
    }
}
