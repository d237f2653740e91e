//! Transport trait for the serial line
//!
//! The physical port is provided by an external collaborator. The monitor only
//! needs to open and close it, write command lines and collect whatever lines
//! have arrived since the last poll. Implementations must be `Send` so the
//! backend worker thread can own them.
//!
//! [`SimulatedTransport`] implements the trait with an in-memory device for
//! tests and for replaying captures without hardware.

pub mod simulated;

pub use simulated::{SimulatedTransport, SimulatorHandle};

use crate::config::SerialConfig;
use crate::error::Result;

/// Unified interface for the serial line
///
/// # Example
///
/// ```ignore
/// fn send_all(transport: &mut dyn Transport, commands: &[String]) -> Result<()> {
///     for command in commands {
///         transport.send(command)?;
///     }
///     Ok(())
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send {
    /// Open the port with the given parameters
    fn open(&mut self, config: &SerialConfig) -> Result<()>;

    /// Close the port; closing a closed port is a no-op
    fn close(&mut self);

    /// Check if the port is open
    fn is_open(&self) -> bool;

    /// Write one command line; the implementation adds the line terminator
    fn send(&mut self, line: &str) -> Result<()>;

    /// Collect complete lines received since the last call, without blocking
    fn poll_lines(&mut self) -> Result<Vec<String>>;

    /// Human-readable port name
    fn port_name(&self) -> String {
        String::from("serial")
    }
}
