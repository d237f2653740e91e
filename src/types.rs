//! Core data types for serialmon-rs
//!
//! This module contains the fundamental data structures passed between the
//! decoder, the transfer sequencer, the session dispatcher and the backend.
//!
//! # Main Types
//!
//! - [`Record`] - One classified line received from the device
//! - [`Channel`] - Which of the two numeric buffers a sample belongs to
//! - [`DecodeIssue`] - Why a line could not be classified
//! - [`OutgoingCommand`] - A command line to be written to the transport
//! - [`ConnectionStatus`] - Transport connection state
//!
//! # Wire Tags
//!
//! The device prefixes typed records with a two-character tag:
//!
//! - `PI` - indexed scalar reading (`PI,<index>,<raw value>`)
//! - `MB` - primary buffer sample (`MB,<address>,<float>`)
//! - `BK` - secondary buffer sample (`BK,<address>,<float>`)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default capacity of each numeric buffer
pub const DEFAULT_BUFFER_CAPACITY: usize = 5000;

/// Default number of indexed value slots
pub const DEFAULT_VALUE_SLOTS: usize = 60;

/// One of the two independent numeric buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Fed by `MB` records
    Primary,
    /// Fed by `BK` records
    Secondary,
}

impl Channel {
    /// All channels, in display order
    pub const ALL: [Channel; 2] = [Channel::Primary, Channel::Secondary];

    /// Wire tag used by the device for this channel
    pub fn tag(&self) -> &'static str {
        match self {
            Channel::Primary => "MB",
            Channel::Secondary => "BK",
        }
    }

    /// Index into per-channel arrays
    pub fn index(&self) -> usize {
        match self {
            Channel::Primary => 0,
            Channel::Secondary => 1,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Primary => write!(f, "Primary"),
            Channel::Secondary => write!(f, "Secondary"),
        }
    }
}

/// Why a line was not turned into a typed record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeIssue {
    /// Unknown tag or too few fields
    Unclassified,
    /// An index or address field was not a non-negative integer
    InvalidInteger { field: String, message: String },
    /// A sample value field was not a float
    InvalidFloat { field: String, message: String },
}

impl fmt::Display for DecodeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeIssue::Unclassified => write!(f, "unclassified"),
            DecodeIssue::InvalidInteger { field, message } => {
                write!(f, "invalid integer '{}': {}", field, message)
            }
            DecodeIssue::InvalidFloat { field, message } => {
                write!(f, "invalid float '{}': {}", field, message)
            }
        }
    }
}

/// A classified line received from the device
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Named scalar reading for a value slot
    ValueUpdate { index: usize, raw_value: String },
    /// One sample destined for a numeric buffer
    BufferSample {
        channel: Channel,
        address: usize,
        value: f64,
    },
    /// The device finished streaming a buffer
    BufferEnd { channel: Channel },
    /// Anything that did not match a known shape
    Unrecognized { text: String, reason: DecodeIssue },
}

impl Record {
    /// Build an unclassified record for a line
    pub fn unclassified(text: impl Into<String>) -> Self {
        Record::Unrecognized {
            text: text.into(),
            reason: DecodeIssue::Unclassified,
        }
    }

    /// Returns true for [`Record::Unrecognized`]
    pub fn is_unrecognized(&self) -> bool {
        matches!(self, Record::Unrecognized { .. })
    }

    /// Short name of the variant, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Record::ValueUpdate { .. } => "value",
            Record::BufferSample { .. } => "sample",
            Record::BufferEnd { .. } => "buffer-end",
            Record::Unrecognized { .. } => "unrecognized",
        }
    }
}

/// A command line to be written to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingCommand {
    /// Read one memory cell: `:mem? <address>`
    ReadMemory { address: u32 },
    /// Write one memory line: `:mem <line>`
    WriteMemory { line: String },
    /// Free-form user command, sent verbatim
    Raw(String),
}

impl OutgoingCommand {
    /// The literal wire text, without the line terminator
    pub fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for OutgoingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutgoingCommand::ReadMemory { address } => write!(f, ":mem? {}", address),
            OutgoingCommand::WriteMemory { line } => write!(f, ":mem {}", line),
            OutgoingCommand::Raw(text) => write!(f, "{}", text),
        }
    }
}

/// Connection status of the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// Port closed
    #[default]
    Disconnected,
    /// Port open
    Connected,
    /// Last open attempt or I/O failed
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::Connected => write!(f, "Connected"),
            ConnectionStatus::Error => write!(f, "Error"),
        }
    }
}

/// What the monitor is busy with, highest priority first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activity {
    /// A read transfer owns inbound lines
    TransferReading,
    /// A write transfer is sending lines
    TransferWriting,
    /// A periodic command is being sent
    AutoRun,
    #[default]
    Idle,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::TransferReading => write!(f, "EEPROM Reading..."),
            Activity::TransferWriting => write!(f, "EEPROM Writing..."),
            Activity::AutoRun => write!(f, "Auto Run Active"),
            Activity::Idle => write!(f, "Idle"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outgoing_command_wire_format() {
        assert_eq!(OutgoingCommand::ReadMemory { address: 5 }.to_wire(), ":mem? 5");
        assert_eq!(
            OutgoingCommand::WriteMemory {
                line: "12=AB".to_string()
            }
            .to_wire(),
            ":mem 12=AB"
        );
        assert_eq!(OutgoingCommand::Raw("*IDN?".to_string()).to_wire(), "*IDN?");
    }

    #[test]
    fn test_unclassified_reason_display() {
        assert_eq!(DecodeIssue::Unclassified.to_string(), "unclassified");
        let rec = Record::unclassified("hello");
        assert!(rec.is_unrecognized());
        assert_eq!(rec.kind(), "unrecognized");
    }

    #[test]
    fn test_channel_tags() {
        assert_eq!(Channel::Primary.tag(), "MB");
        assert_eq!(Channel::Secondary.tag(), "BK");
        assert_eq!(Channel::ALL.map(|c| c.index()), [0, 1]);
    }
}
