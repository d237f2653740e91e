//! Device line protocol
//!
//! - [`LineDecoder`] - classifies received lines into [`Record`](crate::types::Record)s
//! - [`LineFramer`] / [`frame_outgoing`] - byte-level line framing
//! - [`parse_memory_response`] - parses `address=value` replies to `:mem?`

pub mod decoder;
pub mod framing;

pub use decoder::LineDecoder;
pub use framing::{frame_outgoing, LineFramer, LINE_TERMINATOR};

/// A parsed reply to a memory read command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryCell {
    pub address: u32,
    pub value: String,
}

/// Parse a `<address>=<value>` memory reply
///
/// The line must contain exactly one `=`. The address is trimmed and must be
/// a non-negative integer; the value is trimmed and may be empty.
pub fn parse_memory_response(text: &str) -> Option<MemoryCell> {
    let (address, value) = text.split_once('=')?;
    if value.contains('=') {
        return None;
    }
    let address = address.trim().parse::<u32>().ok()?;
    Some(MemoryCell {
        address,
        value: value.trim().to_string(),
    })
}
