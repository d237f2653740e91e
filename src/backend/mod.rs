//! Backend module for the serial monitor
//!
//! This module runs all transport I/O and transfer sequencing in a separate
//! thread so the frontend never blocks on the port. It uses crossbeam channels
//! for thread-safe communication with the frontend.
//!
//! # Architecture
//!
//! - [`MonitorCommand`] - Messages sent from the frontend to the backend
//! - [`MonitorMessage`] - Messages sent from the backend to the frontend
//! - [`FrontendHandle`] - Frontend-side handle for sending commands and receiving messages
//! - [`MonitorBackend`] - Entry point that owns the transport until the worker runs
//! - [`BackendWorker`] - The loop that polls the transport, ticks the session and
//!   repeats the auto-run command
//!
//! # Example
//!
//! ```ignore
//! use serialmon_rs::backend::{MonitorBackend, MonitorMessage};
//! use serialmon_rs::config::AppConfig;
//! use serialmon_rs::transport::SimulatedTransport;
//!
//! let config = AppConfig::default();
//! let (backend, frontend) = MonitorBackend::new(config.clone(), Box::new(SimulatedTransport::new()));
//!
//! std::thread::spawn(move || backend.run());
//!
//! frontend.open(config.serial.clone());
//! frontend.start_read(0, 1023);
//!
//! for msg in frontend.drain() {
//!     if let MonitorMessage::TransferFinished(outcome) = msg {
//!         println!("{} entries", outcome.collected.len());
//!     }
//! }
//! ```

pub mod worker;

pub use worker::BackendWorker;

use crate::buffers::SegmentScale;
use crate::config::{AppConfig, SerialConfig};
use crate::session::SessionStats;
use crate::transfer::{TransferOutcome, TransferProgress};
use crate::transport::Transport;
use crate::types::{Activity, Channel, ConnectionStatus};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Message sent from the frontend to the backend
#[derive(Debug, Clone)]
pub enum MonitorCommand {
    /// Open the transport
    Open(SerialConfig),
    /// Close the transport
    Close,
    /// Send a user command line
    Send(String),
    /// Read an address range from device memory
    StartRead { start: u32, end: u32 },
    /// Write lines to device memory
    StartWrite(Vec<String>),
    /// Cancel the running transfer
    CancelTransfer,
    /// Repeat a command at a fixed interval
    StartAutoRun { command: String, interval: Duration },
    /// Stop the repeated command
    StopAutoRun,
    /// Zero a channel's buffers
    ClearBuffer(Channel),
    /// Replace the value slot labels
    SetLabels(Vec<String>),
    /// Request the scaled baseline of a channel
    RequestScaled {
        channel: Channel,
        scales: Vec<SegmentScale>,
    },
    /// Request current statistics
    RequestStats,
    /// Shutdown the backend
    Shutdown,
}

/// Message sent from the backend to the frontend
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorMessage {
    /// Connection status changed
    ConnectionStatus(ConnectionStatus),
    /// Transport failure or rejected request
    Error(String),
    /// A line arrived
    LineReceived { timestamp: String, text: String },
    /// A line was written
    LineSent { timestamp: String, text: String },
    /// A value slot changed
    ValueUpdated { index: usize, raw_value: String },
    /// A buffer stream completed; `data` is the live buffer
    BufferReady {
        channel: Channel,
        samples: usize,
        data: Vec<f64>,
    },
    /// Scaled baseline (response to RequestScaled)
    ScaledBuffer { channel: Channel, data: Vec<f64> },
    /// A line that could not be used
    Unrecognized { text: String, reason: String },
    /// A read transfer stored a reply
    TransferCollected { address: u32, value: String },
    /// A read transfer rejected a reply
    TransferRejected { text: String },
    /// A transfer command was issued
    TransferProgress(TransferProgress),
    /// A transfer ended
    TransferFinished(TransferOutcome),
    /// Current activity changed
    Activity(Activity),
    /// Statistics update
    Stats(SessionStats),
    /// Backend is shutting down
    Shutdown,
}

/// Frontend handle for backend messages
pub struct FrontendHandle {
    /// Receiver for backend messages
    pub receiver: Receiver<MonitorMessage>,
    /// Sender for commands to the backend
    pub command_sender: Sender<MonitorCommand>,
}

impl FrontendHandle {
    /// Try to receive a message without blocking
    pub fn try_recv(&self) -> Option<MonitorMessage> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for the next message
    pub fn recv_timeout(&self, timeout: Duration) -> Option<MonitorMessage> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Receive all pending messages
    pub fn drain(&self) -> Vec<MonitorMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.receiver.try_recv() {
            messages.push(msg);
        }
        messages
    }

    /// Send a command to the backend
    pub fn send_command(&self, cmd: MonitorCommand) -> bool {
        self.command_sender.send(cmd).is_ok()
    }

    pub fn open(&self, config: SerialConfig) {
        let _ = self.command_sender.send(MonitorCommand::Open(config));
    }

    pub fn close(&self) {
        let _ = self.command_sender.send(MonitorCommand::Close);
    }

    /// Send a user command line
    pub fn send_line(&self, line: impl Into<String>) {
        let _ = self.command_sender.send(MonitorCommand::Send(line.into()));
    }

    pub fn start_read(&self, start: u32, end: u32) {
        let _ = self
            .command_sender
            .send(MonitorCommand::StartRead { start, end });
    }

    pub fn start_write(&self, lines: Vec<String>) {
        let _ = self.command_sender.send(MonitorCommand::StartWrite(lines));
    }

    pub fn cancel_transfer(&self) {
        let _ = self.command_sender.send(MonitorCommand::CancelTransfer);
    }

    pub fn start_auto_run(&self, command: impl Into<String>, interval: Duration) {
        let _ = self.command_sender.send(MonitorCommand::StartAutoRun {
            command: command.into(),
            interval,
        });
    }

    pub fn stop_auto_run(&self) {
        let _ = self.command_sender.send(MonitorCommand::StopAutoRun);
    }

    /// Request shutdown
    pub fn shutdown(&self) {
        let _ = self.command_sender.send(MonitorCommand::Shutdown);
    }
}

/// The monitor backend that runs in a separate thread
pub struct MonitorBackend {
    /// Configuration
    config: AppConfig,
    /// Transport owned by the worker once running
    transport: Box<dyn Transport>,
    /// Receiver for commands from the frontend
    command_receiver: Receiver<MonitorCommand>,
    /// Sender for messages to the frontend
    message_sender: Sender<MonitorMessage>,
    /// Running flag
    running: Arc<AtomicBool>,
}

impl MonitorBackend {
    /// Create a new backend with communication channels
    pub fn new(config: AppConfig, transport: Box<dyn Transport>) -> (Self, FrontendHandle) {
        let (cmd_tx, cmd_rx) = bounded(256);
        // Bounded for backpressure; buffer streams can produce thousands of lines per second
        let (msg_tx, msg_rx) = bounded(10_000);

        let backend = Self {
            config,
            transport,
            command_receiver: cmd_rx,
            message_sender: msg_tx,
            running: Arc::new(AtomicBool::new(true)),
        };

        let frontend = FrontendHandle {
            receiver: msg_rx,
            command_sender: cmd_tx,
        };

        (backend, frontend)
    }

    /// Run the backend loop
    pub fn run(self) {
        let mut worker = BackendWorker::new(
            self.config,
            self.transport,
            self.command_receiver,
            self.message_sender,
            self.running,
        );
        worker.run();
    }

    /// Get a handle to stop the backend
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SimulatedTransport;
    use std::sync::atomic::Ordering;

    fn backend() -> (MonitorBackend, FrontendHandle) {
        MonitorBackend::new(AppConfig::default(), Box::new(SimulatedTransport::new()))
    }

    #[test]
    fn test_backend_creation() {
        let (backend, frontend) = backend();
        assert!(backend.stop_handle().load(Ordering::SeqCst));
        assert!(frontend.try_recv().is_none());
    }

    #[test]
    fn test_frontend_commands_queue() {
        let (backend, frontend) = backend();
        frontend.send_line("*IDN?");
        frontend.start_read(0, 3);
        frontend.shutdown();

        let queued: Vec<_> = backend.command_receiver.try_iter().collect();
        assert_eq!(queued.len(), 3);
        assert!(matches!(queued[0], MonitorCommand::Send(ref s) if s == "*IDN?"));
        assert!(matches!(
            queued[1],
            MonitorCommand::StartRead { start: 0, end: 3 }
        ));
        assert!(matches!(queued[2], MonitorCommand::Shutdown));
    }

    #[test]
    fn test_send_fails_after_backend_dropped() {
        let (backend, frontend) = backend();
        drop(backend);
        assert!(!frontend.send_command(MonitorCommand::Close));
    }

    #[test]
    fn test_stop_handle_shared() {
        let (backend, _frontend) = backend();
        let handle = backend.stop_handle();
        handle.store(false, Ordering::SeqCst);
        assert!(!backend.running.load(Ordering::SeqCst));
    }
}
