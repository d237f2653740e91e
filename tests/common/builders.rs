//! Builders for scripted device traffic

use serialmon_rs::types::DEFAULT_BUFFER_CAPACITY;
use serialmon_rs::Channel;

/// Builder for a sequence of device lines
pub struct CaptureBuilder {
    lines: Vec<String>,
    capacity: usize,
}

impl Default for CaptureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBuilder {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    /// Buffer capacity used for end-of-stream markers
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn value(mut self, index: usize, raw_value: &str) -> Self {
        self.lines.push(format!("PI,{},{}", index, raw_value));
        self
    }

    /// A full buffer stream: one sample per value, then the end marker
    pub fn stream(mut self, channel: Channel, samples: &[f64]) -> Self {
        for (address, value) in samples.iter().enumerate() {
            self.lines
                .push(format!("{},{},{}", channel.tag(), address, value));
        }
        self.lines
            .push(format!("{},{},0", channel.tag(), self.capacity));
        self
    }

    pub fn memory(mut self, address: u32, value: &str) -> Self {
        self.lines.push(format!("{}={}", address, value));
        self
    }

    pub fn line(mut self, text: &str) -> Self {
        self.lines.push(text.to_string());
        self
    }

    pub fn build(self) -> Vec<String> {
        self.lines
    }

    /// Raw bytes as the device would send them
    pub fn to_bytes(&self) -> Vec<u8> {
        self.lines
            .iter()
            .flat_map(|line| format!("{}\r\n", line).into_bytes())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_builder() {
        let lines = CaptureBuilder::new()
            .capacity(4)
            .value(1, "2.5")
            .stream(Channel::Primary, &[1.0, 2.0])
            .build();

        assert_eq!(lines, vec!["PI,1,2.5", "MB,0,1", "MB,1,2", "MB,4,0"]);
    }
}
