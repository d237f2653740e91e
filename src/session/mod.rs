//! Monitor session: the single owner of decoding, buffers and transfers
//!
//! A [`MonitorSession`] receives every inbound line and every tick on one
//! logical thread. It decodes lines, routes records to the value table, the
//! channel buffers or the running read transfer, and reports what happened
//! as [`SessionEvent`]s. It never touches the transport: commands to send are
//! returned to the caller.
//!
//! # Routing
//!
//! ```text
//! line ─▶ LineDecoder ─▶ Record
//!                          │ read transfer running?
//!                          ├─ yes ─▶ TransferSequencer::on_record ─┬─ reply stored / rejected
//!                          │                                       └─ Ignored(record) ─┐
//!                          └─ no ──────────────────────────────────────────────────────┤
//!                                                                                      ▼
//!                            ValueUpdate ─▶ ValueTable     BufferSample ─▶ ChannelBuffers
//!                            BufferEnd ─▶ BufferReady      Unrecognized ─▶ event
//! ```

pub mod history;

pub use history::CommandHistory;

use crate::buffers::{ChannelBuffers, SegmentScale};
use crate::config::{AppConfig, CommandPresets};
use crate::error::{MonitorError, Result, TransferError};
use crate::protocol::LineDecoder;
use crate::transfer::{
    SequencerEffect, TransferOutcome, TransferPhase, TransferProgress, TransferSequencer,
};
use crate::types::{Activity, Channel, OutgoingCommand, Record};
use crate::values::ValueTable;
use std::time::Duration;

/// Something the frontend should know about
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A non-empty line was received
    LineLogged(String),
    /// A value slot changed
    ValueUpdated { index: usize, raw_value: String },
    /// A buffer stream completed and should be redrawn
    BufferReady { channel: Channel, samples: usize },
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
}

/// Result of one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutput {
    pub command: Option<OutgoingCommand>,
    pub events: Vec<SessionEvent>,
}

/// A periodically repeated user command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoRun {
    pub command: String,
    pub interval: Duration,
}

/// Counters for the status line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub lines_received: u64,
    pub unrecognized: u64,
    pub values_updated: u64,
    pub samples_stored: u64,
}

/// Single-owner dispatcher for inbound lines and ticks
#[derive(Debug, Clone)]
pub struct MonitorSession {
    decoder: LineDecoder,
    values: ValueTable,
    buffers: [ChannelBuffers; 2],
    sequencer: TransferSequencer,
    history: CommandHistory,
    auto_run: Option<AutoRun>,
    stats: SessionStats,
}

impl Default for MonitorSession {
    fn default() -> Self {
        Self::new(&AppConfig::default())
    }
}

impl MonitorSession {
    /// Create a session sized from the config
    pub fn new(config: &AppConfig) -> Self {
        Self {
            decoder: LineDecoder::from_config(&config.buffers),
            values: ValueTable::new(config.buffers.value_slots),
            buffers: ChannelBuffers::pair_from_config(&config.buffers),
            sequencer: TransferSequencer::new(config.transfer.settle_ticks),
            history: CommandHistory::default(),
            auto_run: None,
            stats: SessionStats::default(),
        }
    }

    // ==================== Inbound ====================

    /// Process one received line
    pub fn handle_line(&mut self, line: &str) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let Some(record) = self.decoder.decode(line) else {
            return events;
        };

        let line = line.trim();
        self.stats.lines_received += 1;
        tracing::debug!("RX [{}] {}", record.kind(), line);
        events.push(SessionEvent::LineLogged(line.to_string()));

        let record = if self.sequencer.is_reading() {
            match self.sequencer.on_record(record) {
                SequencerEffect::Collected { address, value } => {
                    events.push(SessionEvent::TransferCollected { address, value });
                    return events;
                }
                SequencerEffect::OutOfRange { text, .. } | SequencerEffect::Malformed { text } => {
                    events.push(SessionEvent::TransferRejected { text });
                    return events;
                }
                SequencerEffect::Ignored(record) => record,
            }
        } else {
            record
        };

        self.dispatch(line, record, &mut events);
        events
    }

    fn dispatch(&mut self, line: &str, record: Record, events: &mut Vec<SessionEvent>) {
        match record {
            Record::ValueUpdate { index, raw_value } => {
                if self.values.update(index, &raw_value) {
                    self.stats.values_updated += 1;
                    events.push(SessionEvent::ValueUpdated { index, raw_value });
                } else {
                    self.note_unrecognized(
                        line,
                        format!("value index {} has no slot", index),
                        events,
                    );
                }
            }
            Record::BufferSample {
                channel,
                address,
                value,
            } => {
                if self.buffers[channel.index()].apply_sample(address, value) {
                    self.stats.samples_stored += 1;
                }
            }
            Record::BufferEnd { channel } => {
                let samples = self.buffers[channel.index()].finish_stream();
                tracing::debug!("{} buffer complete ({} samples)", channel, samples);
                events.push(SessionEvent::BufferReady { channel, samples });
            }
            Record::Unrecognized { text, reason } => {
                self.note_unrecognized(&text, reason.to_string(), events);
            }
        }
    }

    fn note_unrecognized(&mut self, text: &str, reason: String, events: &mut Vec<SessionEvent>) {
        self.stats.unrecognized += 1;
        tracing::debug!("Unrecognized line {:?}: {}", text, reason);
        events.push(SessionEvent::Unrecognized {
            text: text.to_string(),
            reason,
        });
    }

    // ==================== Ticks ====================

    /// Advance the running transfer by one step
    pub fn tick(&mut self) -> TickOutput {
        let (output, _) = self.tick_with(|_| Ok(()));
        output
    }

    /// Advance the running transfer and hand its command to `send`
    ///
    /// When `send` fails the step is rolled back and the transfer ends as
    /// failed: the output then carries no command and no progress, and the
    /// send error is returned alongside it.
    pub fn tick_with<F>(&mut self, send: F) -> (TickOutput, Result<()>)
    where
        F: FnOnce(&OutgoingCommand) -> Result<()>,
    {
        let mut command = self.sequencer.on_tick();
        let mut sent = Ok(());
        if let Some(pending) = &command {
            if let Err(e) = send(pending) {
                self.sequencer.fail_unsent(e.to_string());
                command = None;
                sent = Err(e);
            }
        }

        let mut output = TickOutput {
            command,
            events: Vec::new(),
        };

        let finished = if self.sequencer.phase() == TransferPhase::Done {
            self.sequencer.take_outcome()
        } else {
            None
        };

        if output.command.is_some() {
            // The last write completes the job on the tick that sends it
            let progress = self.sequencer.progress().or_else(|| {
                finished.as_ref().map(|outcome| TransferProgress {
                    done: outcome.commands_sent as u64,
                    total: outcome.commands_sent as u64,
                })
            });
            if let Some(progress) = progress {
                output.events.push(SessionEvent::TransferProgress(progress));
            }
        }

        if let Some(outcome) = finished {
            output.events.push(SessionEvent::TransferFinished(outcome));
        }

        (output, sent)
    }

    // ==================== Transfers ====================

    /// Begin reading `[start, end]` from device memory
    pub fn start_read(&mut self, start: u32, end: u32) -> std::result::Result<(), TransferError> {
        self.sequencer.start_read(start, end)
    }

    /// Begin writing lines to device memory
    pub fn start_write(&mut self, lines: Vec<String>) -> std::result::Result<(), TransferError> {
        self.sequencer.start_write(lines)
    }

    /// Cancel the running transfer, if any
    pub fn cancel_transfer(&mut self) -> Option<SessionEvent> {
        self.sequencer.cancel().map(SessionEvent::TransferFinished)
    }

    /// End the running transfer because the transport failed
    pub fn fail_transfer(&mut self, reason: &str) -> Option<SessionEvent> {
        if !self.sequencer.fail(reason) {
            return None;
        }
        self.sequencer
            .take_outcome()
            .map(SessionEvent::TransferFinished)
    }

    pub fn sequencer(&self) -> &TransferSequencer {
        &self.sequencer
    }

    // ==================== User commands ====================

    /// Record a user command in the history and wrap it for sending
    pub fn submit_command(&mut self, text: &str) -> Option<OutgoingCommand> {
        self.history.push(text);
        if text.is_empty() {
            None
        } else {
            Some(OutgoingCommand::Raw(text.to_string()))
        }
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut CommandHistory {
        &mut self.history
    }

    /// Start sending `command` every `interval`
    pub fn start_auto_run(&mut self, command: &str, interval: Duration) -> Result<()> {
        if command.trim().is_empty() {
            return Err(MonitorError::Config("Auto run command is empty".to_string()));
        }
        if interval.is_zero() {
            return Err(MonitorError::Config(
                "Invalid interval. Please enter a number.".to_string(),
            ));
        }
        tracing::info!("Auto run started: {:?} every {:?}", command, interval);
        self.auto_run = Some(AutoRun {
            command: command.to_string(),
            interval,
        });
        Ok(())
    }

    pub fn stop_auto_run(&mut self) {
        if self.auto_run.take().is_some() {
            tracing::info!("Auto run stopped");
        }
    }

    pub fn auto_run(&self) -> Option<&AutoRun> {
        self.auto_run.as_ref()
    }

    // ==================== State ====================

    /// Current activity, highest priority first
    pub fn activity(&self) -> Activity {
        match self.sequencer.phase() {
            TransferPhase::Reading | TransferPhase::Finishing => Activity::TransferReading,
            TransferPhase::Writing => Activity::TransferWriting,
            _ if self.auto_run.is_some() => Activity::AutoRun,
            _ => Activity::Idle,
        }
    }

    pub fn values(&self) -> &ValueTable {
        &self.values
    }

    pub fn buffers(&self, channel: Channel) -> &ChannelBuffers {
        &self.buffers[channel.index()]
    }

    /// Display copy of a channel's baseline with per-segment scaling
    pub fn scaled_buffer(
        &self,
        channel: Channel,
        scales: &[SegmentScale],
        points_per_segment: usize,
    ) -> Vec<f64> {
        self.buffers(channel).transformed(scales, points_per_segment)
    }

    pub fn clear_buffer(&mut self, channel: Channel) {
        self.buffers[channel.index()].clear();
    }

    /// Apply labels from a preset file
    pub fn apply_presets(&mut self, presets: &CommandPresets) {
        self.values.set_labels(&presets.labels);
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }
}
