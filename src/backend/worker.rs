//! Backend Worker Thread Implementation
//!
//! This module contains the main worker loop that runs in a separate thread
//! and owns the transport and the [`MonitorSession`]. It communicates with the
//! frontend through crossbeam channels.
//!
//! # Responsibilities
//!
//! - **Command processing**: open/close, user commands, transfer control
//! - **Line polling**: drains received lines into the session every loop
//! - **Transfer pacing**: ticks the session at the configured interval and
//!   writes whatever command it produces
//! - **Auto run**: repeats the user's periodic command
//! - **Error handling**: a failed write ends the running transfer and the
//!   auto run, and is reported to the frontend
//!
//! # Rate Limiting
//!
//! The loop runs at [`POLL_INTERVAL`]; ticks and auto-run commands are
//! issued when their own intervals have elapsed, so a slow tick setting
//! never delays line handling.

use crate::backend::{MonitorCommand, MonitorMessage};
use crate::config::{AppConfig, SerialConfig};
use crate::error::{MonitorError, Result};
use crate::session::{MonitorSession, SessionEvent};
use crate::transport::Transport;
use crate::types::{Activity, ConnectionStatus, OutgoingCommand};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Interval of the worker loop
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Timestamp prefix used for logged lines
pub fn timestamp() -> String {
    chrono::Local::now().format("[%H:%M:%S%.3f]").to_string()
}

fn require_open(transport: &dyn Transport) -> Result<()> {
    if transport.is_open() {
        Ok(())
    } else {
        Err(MonitorError::Transport("Port is not open.".to_string()))
    }
}

/// Write one command to an open transport
fn write_command(transport: &mut dyn Transport, command: &OutgoingCommand) -> Result<()> {
    require_open(transport)?;
    transport.send(&command.to_wire())
}

/// The backend worker that runs the monitor loop
pub struct BackendWorker {
    /// Application configuration
    config: AppConfig,
    /// Command receiver from the frontend
    command_rx: Receiver<MonitorCommand>,
    /// Message sender to the frontend
    message_tx: Sender<MonitorMessage>,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Serial line
    transport: Box<dyn Transport>,
    /// Decoding, buffers and transfers
    session: MonitorSession,
    /// Current connection status
    connection_status: ConnectionStatus,
    /// Last activity reported to the frontend
    activity: Activity,
    /// Interval between transfer ticks
    tick_interval: Duration,
    /// Last transfer tick
    last_tick: Instant,
    /// Last auto-run send
    last_auto_run: Instant,
    /// Last loop iteration for rate limiting
    last_poll_time: Instant,
    /// Messages dropped because the frontend queue was full
    dropped_messages: u64,
}

impl BackendWorker {
    /// Create a new backend worker
    pub fn new(
        config: AppConfig,
        transport: Box<dyn Transport>,
        command_rx: Receiver<MonitorCommand>,
        message_tx: Sender<MonitorMessage>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let session = MonitorSession::new(&config);
        let tick_interval = config.transfer.tick_interval();

        Self {
            config,
            command_rx,
            message_tx,
            running,
            transport,
            session,
            connection_status: ConnectionStatus::Disconnected,
            activity: Activity::Idle,
            tick_interval,
            last_tick: Instant::now(),
            last_auto_run: Instant::now(),
            last_poll_time: Instant::now(),
            dropped_messages: 0,
        }
    }

    /// Run the main worker loop
    pub fn run(&mut self) {
        tracing::info!("Backend worker started");

        while self.running.load(Ordering::SeqCst) {
            self.process_commands();

            if self.connection_status == ConnectionStatus::Connected {
                self.poll_transport();

                if self.last_tick.elapsed() >= self.tick_interval {
                    self.last_tick = Instant::now();
                    self.tick();
                }

                self.run_auto();
            }

            self.publish_activity();
            self.rate_limit();
        }

        // Cleanup
        self.transport.close();

        let _ = self.message_tx.send(MonitorMessage::Shutdown);
        tracing::info!("Backend worker stopped");
    }

    /// Process pending commands from the frontend
    fn process_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(cmd) => self.handle_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    /// Handle a single command
    fn handle_command(&mut self, cmd: MonitorCommand) {
        match cmd {
            MonitorCommand::Open(serial) => self.handle_open(&serial),
            MonitorCommand::Close => self.handle_close(),
            MonitorCommand::Send(line) => {
                if let Some(command) = self.session.submit_command(&line) {
                    if let Err(e) = self.send(&command) {
                        self.report_error(e);
                    }
                }
            }
            MonitorCommand::StartRead { start, end } => {
                if let Err(e) = self.require_open() {
                    self.report_error(e);
                } else if let Err(e) = self.session.start_read(start, end) {
                    self.report_error(e.into());
                } else {
                    self.last_tick = Instant::now();
                }
            }
            MonitorCommand::StartWrite(lines) => {
                if let Err(e) = self.require_open() {
                    self.report_error(e);
                } else if let Err(e) = self.session.start_write(lines) {
                    self.report_error(e.into());
                } else {
                    self.last_tick = Instant::now();
                }
            }
            MonitorCommand::CancelTransfer => {
                if let Some(event) = self.session.cancel_transfer() {
                    self.forward_event(event);
                }
            }
            MonitorCommand::StartAutoRun { command, interval } => {
                let result = self
                    .require_open()
                    .and_then(|()| self.session.start_auto_run(&command, interval));
                match result {
                    // First send happens one interval after starting
                    Ok(()) => self.last_auto_run = Instant::now(),
                    Err(e) => self.report_error(e),
                }
            }
            MonitorCommand::StopAutoRun => self.session.stop_auto_run(),
            MonitorCommand::ClearBuffer(channel) => self.session.clear_buffer(channel),
            MonitorCommand::SetLabels(labels) => {
                let presets = crate::config::CommandPresets {
                    commands: Vec::new(),
                    labels,
                };
                self.session.apply_presets(&presets);
            }
            MonitorCommand::RequestScaled { channel, scales } => {
                let segments = scales.len().min(self.config.buffers.display_segments);
                let data = self.session.scaled_buffer(
                    channel,
                    &scales[..segments],
                    self.config.buffers.points_per_segment,
                );
                self.try_send_message(MonitorMessage::ScaledBuffer { channel, data });
            }
            MonitorCommand::RequestStats => {
                self.try_send_message(MonitorMessage::Stats(self.session.stats()));
            }
            MonitorCommand::Shutdown => {
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Handle open command
    fn handle_open(&mut self, serial: &SerialConfig) {
        // The open port keeps serving the running transfer and auto run
        if self.transport.is_open() {
            tracing::warn!("Open requested while {} is open", self.transport.port_name());
            let _ = self
                .message_tx
                .send(MonitorMessage::Error("A port is already open.".to_string()));
            return;
        }

        match self.transport.open(serial) {
            Ok(()) => {
                tracing::info!(
                    "Connected to {} at {} baud",
                    self.transport.port_name(),
                    serial.baud_rate
                );
                self.update_connection_status(ConnectionStatus::Connected);
            }
            Err(e) => {
                tracing::error!("Failed to open port: {}", e);
                self.update_connection_status(ConnectionStatus::Error);
                let _ = self.message_tx.send(MonitorMessage::Error(e.to_string()));
            }
        }
    }

    /// Handle close command
    fn handle_close(&mut self) {
        if let Some(event) = self.session.fail_transfer("Port closed") {
            self.forward_event(event);
        }
        self.session.stop_auto_run();
        self.transport.close();
        self.update_connection_status(ConnectionStatus::Disconnected);
        tracing::info!("Port closed");
    }

    fn require_open(&self) -> Result<()> {
        require_open(self.transport.as_ref())
    }

    /// Write one command and echo it to the frontend
    fn send(&mut self, command: &OutgoingCommand) -> Result<()> {
        write_command(self.transport.as_mut(), command)?;
        self.echo_sent(command);
        Ok(())
    }

    fn echo_sent(&mut self, command: &OutgoingCommand) {
        let text = command.to_wire();
        tracing::debug!("TX {}", text);
        self.try_send_message(MonitorMessage::LineSent {
            timestamp: timestamp(),
            text,
        });
    }

    /// Drain received lines into the session
    fn poll_transport(&mut self) {
        match self.transport.poll_lines() {
            Ok(lines) => {
                for line in lines {
                    for event in self.session.handle_line(&line) {
                        self.forward_event(event);
                    }
                }
            }
            Err(e) => {
                tracing::error!("Error reading from port: {}", e);
                self.report_error(e);
                self.session.stop_auto_run();
                self.transport.close();
                self.update_connection_status(ConnectionStatus::Error);
            }
        }
    }

    /// Advance the transfer and write its command
    fn tick(&mut self) {
        let transport = &mut self.transport;
        let (output, sent) = self
            .session
            .tick_with(|command| write_command(transport.as_mut(), command));
        match sent {
            Ok(()) => {
                if let Some(command) = &output.command {
                    self.echo_sent(command);
                }
            }
            Err(e) => self.report_error(e),
        }
        for event in output.events {
            self.forward_event(event);
        }
    }

    /// Send the auto-run command when its interval has elapsed
    fn run_auto(&mut self) {
        let Some(auto) = self.session.auto_run() else {
            return;
        };
        if self.last_auto_run.elapsed() < auto.interval {
            return;
        }
        let command = OutgoingCommand::Raw(auto.command.clone());
        self.last_auto_run = Instant::now();
        if let Err(e) = self.send(&command) {
            self.report_error(e);
        }
    }

    /// Report a failure and end any running transfer and auto run
    fn report_error(&mut self, error: MonitorError) {
        let reason = error.to_string();
        tracing::warn!("{}", reason);
        if matches!(error, MonitorError::Transport(_)) {
            if let Some(event) = self.session.fail_transfer(&reason) {
                self.forward_event(event);
            }
            self.session.stop_auto_run();
        }
        let _ = self.message_tx.send(MonitorMessage::Error(reason));
    }

    /// Translate a session event into a frontend message
    fn forward_event(&mut self, event: SessionEvent) {
        let msg = match event {
            SessionEvent::LineLogged(text) => MonitorMessage::LineReceived {
                timestamp: timestamp(),
                text,
            },
            SessionEvent::ValueUpdated { index, raw_value } => {
                MonitorMessage::ValueUpdated { index, raw_value }
            }
            SessionEvent::BufferReady { channel, samples } => MonitorMessage::BufferReady {
                channel,
                samples,
                data: self.session.buffers(channel).live().as_slice().to_vec(),
            },
            SessionEvent::Unrecognized { text, reason } => {
                MonitorMessage::Unrecognized { text, reason }
            }
            SessionEvent::TransferCollected { address, value } => {
                MonitorMessage::TransferCollected { address, value }
            }
            SessionEvent::TransferRejected { text } => MonitorMessage::TransferRejected { text },
            SessionEvent::TransferProgress(progress) => MonitorMessage::TransferProgress(progress),
            SessionEvent::TransferFinished(outcome) => {
                // Outcomes must not be lost to backpressure
                let _ = self
                    .message_tx
                    .send(MonitorMessage::TransferFinished(outcome));
                return;
            }
        };
        self.try_send_message(msg);
    }

    fn publish_activity(&mut self) {
        let activity = self.session.activity();
        if activity != self.activity {
            self.activity = activity;
            tracing::debug!("Activity: {}", activity);
            self.try_send_message(MonitorMessage::Activity(activity));
        }
    }

    /// Rate limit the loop
    fn rate_limit(&mut self) {
        let elapsed = self.last_poll_time.elapsed();
        if elapsed < POLL_INTERVAL {
            std::thread::sleep(POLL_INTERVAL - elapsed);
        }
        self.last_poll_time = Instant::now();
    }

    /// Update connection status and notify the frontend
    fn update_connection_status(&mut self, status: ConnectionStatus) {
        self.connection_status = status;
        let _ = self
            .message_tx
            .send(MonitorMessage::ConnectionStatus(status));
    }

    /// Try to send a message, tracking dropped messages if the queue is full
    fn try_send_message(&mut self, msg: MonitorMessage) {
        if self.message_tx.try_send(msg).is_err() {
            self.dropped_messages += 1;
            if self.dropped_messages.is_power_of_two() {
                tracing::warn!("Frontend queue full, {} messages dropped", self.dropped_messages);
            }
        }
    }
}
