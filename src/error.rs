//! Error handling for serialmon-rs
//!
//! This module defines custom error types and a Result alias for use
//! throughout the crate. Decoding problems are not errors here: a line that
//! fails to parse becomes [`Record::Unrecognized`](crate::types::Record)
//! data and never escapes the decoder.

use thiserror::Error;

/// Reasons a transfer job cannot be started
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Start address is greater than end address
    #[error("Invalid address range: start {start} is greater than end {end}")]
    InvalidRange { start: u32, end: u32 },

    /// Write job has no lines
    #[error("Write job has no lines to send")]
    EmptyJob,

    /// Another job is reading, writing or finishing
    #[error("A transfer is already in progress")]
    AlreadyActive,

    /// The previous job failed and has not been acknowledged yet
    #[error("Previous transfer failed and must be reset before starting a new one")]
    FailedJobPending,
}

/// Main error type for serialmon-rs operations
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Errors reported by the transport collaborator
    #[error("Transport error: {0}")]
    Transport(String),

    /// Transfer jobs rejected at start
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Errors related to configuration and data files
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<MonitorError>,
    },
}

impl MonitorError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        MonitorError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        MonitorError::Serialization(err.to_string())
    }
}

/// Result type alias for serialmon-rs operations
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| MonitorError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| MonitorError::from(e).with_context(f()))
    }
}
