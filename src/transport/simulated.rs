//! Simulated device transport for testing
//!
//! This module provides a [`Transport`] that behaves like the instrument
//! without real hardware. Outgoing commands are framed exactly as they would
//! be on the wire and answered by a small device model:
//!
//! - `:mem? <address>` → `<address>=<value>` from the simulated EEPROM image
//!   (unanswered if the cell is blank or listed as silent)
//! - `:mem <address>=<value>` → stores the value in the image
//! - anything else → no reply
//!
//! Extra inbound traffic (value updates, buffer streams) can be scripted as
//! lines or raw bytes through a [`SimulatorHandle`], which stays usable after
//! the transport has been moved into the backend thread.
//!
//! # Example
//!
//! ```ignore
//! use serialmon_rs::transport::SimulatedTransport;
//!
//! let transport = SimulatedTransport::new().with_memory([(0, "A"), (1, "B")]);
//! let handle = transport.handle();
//! handle.push_line("PI,3,1.25");
//! ```

use super::Transport;
use crate::config::SerialConfig;
use crate::error::{MonitorError, Result};
use crate::protocol::{frame_outgoing, parse_memory_response, LineFramer};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct DeviceState {
    open: bool,
    memory: BTreeMap<u32, String>,
    silent: HashSet<u32>,
    inbound: VecDeque<String>,
    framer: LineFramer,
    written: Vec<u8>,
    sent: Vec<String>,
    fail_sends: Option<String>,
    fail_open: Option<String>,
}

impl DeviceState {
    fn respond(&mut self, line: &str) {
        if let Some(rest) = line.strip_prefix(":mem? ") {
            if let Ok(address) = rest.trim().parse::<u32>() {
                if self.silent.contains(&address) {
                    return;
                }
                if let Some(value) = self.memory.get(&address) {
                    self.inbound.push_back(format!("{}={}", address, value));
                }
            }
        } else if let Some(rest) = line.strip_prefix(":mem ") {
            if let Some(cell) = parse_memory_response(rest) {
                self.memory.insert(cell.address, cell.value);
            }
        }
    }
}

/// Shared view of a [`SimulatedTransport`]'s device state
#[derive(Debug, Clone)]
pub struct SimulatorHandle {
    state: Arc<Mutex<DeviceState>>,
}

impl SimulatorHandle {
    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a complete inbound line
    pub fn push_line(&self, line: impl Into<String>) {
        self.lock().inbound.push_back(line.into());
    }

    /// Queue raw inbound bytes, split into lines on `\n`
    pub fn push_bytes(&self, bytes: &[u8]) {
        let mut state = self.lock();
        let lines = state.framer.push(bytes);
        state.inbound.extend(lines);
    }

    /// Commands written so far, without terminators
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    /// Raw bytes written so far, including terminators
    pub fn written_bytes(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Current EEPROM image
    pub fn memory(&self) -> BTreeMap<u32, String> {
        self.lock().memory.clone()
    }

    /// Make every subsequent send fail with the given message
    pub fn fail_sends(&self, message: impl Into<String>) {
        self.lock().fail_sends = Some(message.into());
    }

    /// Make subsequent opens fail with the given message
    pub fn fail_open(&self, message: impl Into<String>) {
        self.lock().fail_open = Some(message.into());
    }
}

/// In-memory device implementing [`Transport`]
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    handle: SimulatorHandle,
    port: String,
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self {
            handle: SimulatorHandle {
                state: Arc::new(Mutex::new(DeviceState::default())),
            },
            port: "SIM".to_string(),
        }
    }

    /// Preload the EEPROM image
    pub fn with_memory<S: Into<String>>(self, cells: impl IntoIterator<Item = (u32, S)>) -> Self {
        {
            let mut state = self.handle.lock();
            state
                .memory
                .extend(cells.into_iter().map(|(k, v)| (k, v.into())));
        }
        self
    }

    /// Addresses the device never answers
    pub fn with_silent_addresses(self, addresses: impl IntoIterator<Item = u32>) -> Self {
        self.handle.lock().silent.extend(addresses);
        self
    }

    /// Handle for scripting and inspecting the device
    pub fn handle(&self) -> SimulatorHandle {
        self.handle.clone()
    }
}

impl Transport for SimulatedTransport {
    fn open(&mut self, config: &SerialConfig) -> Result<()> {
        let mut state = self.handle.lock();
        if state.open {
            return Err(MonitorError::Transport("A port is already open.".to_string()));
        }
        if let Some(message) = state.fail_open.clone() {
            return Err(MonitorError::Transport(format!(
                "Error opening port: {}",
                message
            )));
        }
        if !config.port.is_empty() {
            self.port = config.port.clone();
        }
        state.open = true;
        tracing::debug!(
            "Simulated port {} opened at {} baud, parity {}",
            self.port,
            config.baud_rate,
            config.parity
        );
        Ok(())
    }

    fn close(&mut self) {
        self.handle.lock().open = false;
    }

    fn is_open(&self) -> bool {
        self.handle.lock().open
    }

    fn send(&mut self, line: &str) -> Result<()> {
        let mut state = self.handle.lock();
        if !state.open {
            return Err(MonitorError::Transport("Port is not open.".to_string()));
        }
        if let Some(message) = state.fail_sends.clone() {
            return Err(MonitorError::Transport(format!(
                "Error sending data: {}",
                message
            )));
        }

        state.written.extend(frame_outgoing(line));
        state.sent.push(line.to_string());
        state.respond(line);
        Ok(())
    }

    fn poll_lines(&mut self) -> Result<Vec<String>> {
        let mut state = self.handle.lock();
        if !state.open {
            return Ok(Vec::new());
        }
        Ok(state.inbound.drain(..).collect())
    }

    fn port_name(&self) -> String {
        self.port.clone()
    }
}
