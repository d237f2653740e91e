//! Byte-stream framing for the serial line
//!
//! Outgoing commands are terminated with a carriage return. Inbound bytes are
//! split on line feeds, decoded as UTF-8 (lossily, so a corrupted byte never
//! stalls the stream), trimmed, and empty lines are dropped.

/// Terminator appended to every outgoing command
pub const LINE_TERMINATOR: &str = "\r";

/// Longest partial line kept while waiting for a line feed
pub const MAX_PENDING_BYTES: usize = 64 * 1024;

/// Encode a command for the wire
pub fn frame_outgoing(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() + LINE_TERMINATOR.len());
    bytes.extend_from_slice(text.as_bytes());
    bytes.extend_from_slice(LINE_TERMINATOR.as_bytes());
    bytes
}

/// Accumulates inbound bytes and yields complete lines
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
}

impl LineFramer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed received bytes, returning every completed non-empty line
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            if byte == b'\n' {
                let raw = std::mem::take(&mut self.pending);
                push_trimmed(&mut lines, &raw);
            } else {
                self.pending.push(byte);
            }
        }

        if self.pending.len() > MAX_PENDING_BYTES {
            tracing::warn!(
                "Discarding {} bytes received without a line feed",
                self.pending.len()
            );
            self.pending.clear();
        }

        lines
    }

    /// Return the trailing partial line, if any, and reset
    pub fn flush(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.pending);
        let mut lines = Vec::with_capacity(1);
        push_trimmed(&mut lines, &raw);
        lines.pop()
    }

    /// Number of buffered bytes not yet terminated
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn push_trimmed(lines: &mut Vec<String>, raw: &[u8]) {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        lines.push(trimmed.to_string());
    }
}
