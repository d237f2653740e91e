//! Stepwise EEPROM transfer sequencer
//!
//! A [`TransferSequencer`] walks an address range (read) or a list of lines
//! (write) one step per tick. It never performs I/O itself: each tick may
//! return one [`OutgoingCommand`] for the caller to send, and replies are fed
//! back through [`TransferSequencer::on_record`].
//!
//! # States
//!
//! ```text
//!            start_read             tick (past end)          settle ticks
//!   Idle ───────────────▶ Reading ─────────────────▶ Finishing ───────────▶ Done
//!     │      start_write                      tick (last line)                │
//!     └────────────────▶ Writing ─────────────────────────────────────────────┤
//!                                                                 take_outcome│
//!   Idle ◀────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `cancel()` returns to `Idle` from any state. `fail()` ends a running job
//! in `Done` with a `Failed` status that must be acknowledged before the
//! next job can start. `fail_unsent()` does the same after rolling back the
//! command the last tick produced, for callers whose write of it failed.
//!
//! # Pacing
//!
//! Exactly one command per tick, addresses strictly ascending, no requests
//! in flight concurrently. A read waits `settle_ticks` after its last command
//! so the final reply can arrive before the result is published. There is no
//! reply timeout: an address that never answers is simply missing from the
//! collected data.

pub mod dump;

pub use dump::{load_write_lines, DumpFormat, TransferDump};

use crate::error::TransferError;
use crate::protocol::parse_memory_response;
use crate::types::{OutgoingCommand, Record};
use std::collections::BTreeMap;

/// Kind of transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Device memory to host (`:mem? <address>`)
    ReadRange,
    /// Host lines to device memory (`:mem <line>`)
    WriteLines,
}

impl std::fmt::Display for TransferMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferMode::ReadRange => write!(f, "ROM to File"),
            TransferMode::WriteLines => write!(f, "File to ROM"),
        }
    }
}

/// Status of the current or most recent job
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransferStatus {
    #[default]
    NotStarted,
    Running,
    Finished,
    Cancelled,
    Failed(String),
}

impl TransferStatus {
    /// Returns true for finished, cancelled and failed jobs
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Finished | TransferStatus::Cancelled | TransferStatus::Failed(_)
        )
    }
}

/// Coarse state of the sequencer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Idle,
    Reading,
    Writing,
    Finishing,
    Done,
}

/// Result handed to the caller when a job ends
#[derive(Debug, Clone, PartialEq)]
pub struct TransferOutcome {
    pub mode: TransferMode,
    pub status: TransferStatus,
    /// Replies gathered by a read job, keyed by address
    pub collected: BTreeMap<u32, String>,
    /// Number of commands emitted
    pub commands_sent: usize,
}

/// What the sequencer did with an inbound record
#[derive(Debug, Clone, PartialEq)]
pub enum SequencerEffect {
    /// An `address=value` reply was stored
    Collected { address: u32, value: String },
    /// A reply for an address outside the job's range; not stored
    OutOfRange { address: u32, text: String },
    /// Text that is not an `address=value` reply; not stored
    Malformed { text: String },
    /// Not a reply; the caller should route the record normally
    Ignored(Record),
}

/// Steps completed out of the total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub done: u64,
    pub total: u64,
}

impl TransferProgress {
    /// Completion as a fraction in `[0, 1]`
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.done as f64 / self.total as f64
        }
    }
}

/// State of a read job
#[derive(Debug, Clone, PartialEq)]
pub struct ReadJob {
    pub start_address: u32,
    pub end_address: u32,
    /// Next address to request; one past `end_address` once all are sent
    pub current_address: u64,
    pub collected: BTreeMap<u32, String>,
}

impl ReadJob {
    fn contains(&self, address: u32) -> bool {
        (self.start_address..=self.end_address).contains(&address)
    }

    fn total(&self) -> u64 {
        u64::from(self.end_address - self.start_address) + 1
    }

    fn sent(&self) -> u64 {
        self.current_address - u64::from(self.start_address)
    }
}

/// State of a write job
#[derive(Debug, Clone, PartialEq)]
pub struct WriteJob {
    pub lines: Vec<String>,
    pub current_index: usize,
}

/// The job owned by the sequencer, one variant per state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TransferJob {
    #[default]
    Idle,
    Reading(ReadJob),
    Writing(WriteJob),
    Finishing { job: ReadJob, ticks_left: u32 },
    Done(TransferOutcome),
}

/// Tick-driven controller for read and write transfers
#[derive(Debug, Clone)]
pub struct TransferSequencer {
    job: TransferJob,
    status: TransferStatus,
    settle_ticks: u32,
}

impl Default for TransferSequencer {
    fn default() -> Self {
        Self::new(1)
    }
}

impl TransferSequencer {
    /// Create a sequencer that waits `settle_ticks` (at least one) after the
    /// last read command before finalizing
    pub fn new(settle_ticks: u32) -> Self {
        Self {
            job: TransferJob::Idle,
            status: TransferStatus::NotStarted,
            settle_ticks: settle_ticks.max(1),
        }
    }

    /// Begin reading `[start, end]`
    pub fn start_read(&mut self, start: u32, end: u32) -> Result<(), TransferError> {
        self.check_can_start()?;
        if start > end {
            return Err(TransferError::InvalidRange { start, end });
        }

        tracing::info!("Starting read transfer from {} to {}", start, end);
        self.job = TransferJob::Reading(ReadJob {
            start_address: start,
            end_address: end,
            current_address: u64::from(start),
            collected: BTreeMap::new(),
        });
        self.status = TransferStatus::Running;
        Ok(())
    }

    /// Begin writing `lines`, one per tick
    pub fn start_write(&mut self, lines: Vec<String>) -> Result<(), TransferError> {
        self.check_can_start()?;
        if lines.is_empty() {
            return Err(TransferError::EmptyJob);
        }

        tracing::info!("Starting write transfer of {} lines", lines.len());
        self.job = TransferJob::Writing(WriteJob {
            lines,
            current_index: 0,
        });
        self.status = TransferStatus::Running;
        Ok(())
    }

    fn check_can_start(&self) -> Result<(), TransferError> {
        match &self.job {
            TransferJob::Reading(_) | TransferJob::Writing(_) | TransferJob::Finishing { .. } => {
                Err(TransferError::AlreadyActive)
            }
            TransferJob::Done(outcome) if matches!(outcome.status, TransferStatus::Failed(_)) => {
                Err(TransferError::FailedJobPending)
            }
            TransferJob::Idle | TransferJob::Done(_) => Ok(()),
        }
    }

    /// Abandon the current job, discarding collected data
    ///
    /// Returns the cancelled outcome, or `None` if there was nothing to cancel.
    pub fn cancel(&mut self) -> Option<TransferOutcome> {
        let mode = self.mode()?;
        let commands_sent = self.commands_sent();
        self.job = TransferJob::Idle;
        self.status = TransferStatus::Cancelled;
        tracing::info!("{} transfer cancelled after {} commands", mode, commands_sent);
        Some(TransferOutcome {
            mode,
            status: TransferStatus::Cancelled,
            collected: BTreeMap::new(),
            commands_sent,
        })
    }

    /// End a running job because the transport failed
    ///
    /// Partial data is kept in the outcome. Returns false if no job was running.
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        if !self.is_active() {
            return false;
        }
        let reason = reason.into();
        let commands_sent = self.commands_sent();
        let (mode, collected) = match std::mem::take(&mut self.job) {
            TransferJob::Reading(job) | TransferJob::Finishing { job, .. } => {
                (TransferMode::ReadRange, job.collected)
            }
            _ => (TransferMode::WriteLines, BTreeMap::new()),
        };

        tracing::error!("{} transfer failed: {}", mode, reason);
        self.status = TransferStatus::Failed(reason.clone());
        self.job = TransferJob::Done(TransferOutcome {
            mode,
            status: TransferStatus::Failed(reason),
            collected,
            commands_sent,
        });
        true
    }

    /// End the job because the command from the last `on_tick` never reached
    /// the device
    ///
    /// The step is rolled back first, so `commands_sent` only counts commands
    /// that were actually written. This also covers a write job whose final
    /// line completed it. Returns false if there was no step to roll back.
    pub fn fail_unsent(&mut self, reason: impl Into<String>) -> bool {
        match &mut self.job {
            TransferJob::Reading(job) | TransferJob::Finishing { job, .. } => {
                job.current_address = job.current_address.saturating_sub(1);
            }
            TransferJob::Writing(job) => {
                job.current_index = job.current_index.saturating_sub(1);
            }
            TransferJob::Done(outcome)
                if outcome.mode == TransferMode::WriteLines
                    && outcome.status == TransferStatus::Finished =>
            {
                let reason = reason.into();
                outcome.commands_sent = outcome.commands_sent.saturating_sub(1);
                outcome.status = TransferStatus::Failed(reason.clone());
                tracing::error!("{} transfer failed: {}", outcome.mode, reason);
                self.status = TransferStatus::Failed(reason);
                return true;
            }
            _ => return false,
        }
        self.fail(reason)
    }

    /// Advance one step, returning the command to send if any
    pub fn on_tick(&mut self) -> Option<OutgoingCommand> {
        let (next, command) = match std::mem::take(&mut self.job) {
            TransferJob::Reading(mut job) => {
                // current_address <= end_address while Reading
                let address = job.current_address as u32;
                job.current_address += 1;
                let next = if job.current_address > u64::from(job.end_address) {
                    tracing::debug!("Read commands complete, waiting for final replies");
                    TransferJob::Finishing {
                        job,
                        ticks_left: self.settle_ticks,
                    }
                } else {
                    TransferJob::Reading(job)
                };
                (next, Some(OutgoingCommand::ReadMemory { address }))
            }
            TransferJob::Finishing { job, ticks_left } if ticks_left > 1 => (
                TransferJob::Finishing {
                    job,
                    ticks_left: ticks_left - 1,
                },
                None,
            ),
            TransferJob::Finishing { job, .. } => {
                let commands_sent = job.sent() as usize;
                tracing::info!(
                    "Read transfer finished: {} of {} addresses answered",
                    job.collected.len(),
                    job.total()
                );
                self.status = TransferStatus::Finished;
                let outcome = TransferOutcome {
                    mode: TransferMode::ReadRange,
                    status: TransferStatus::Finished,
                    collected: job.collected,
                    commands_sent,
                };
                (TransferJob::Done(outcome), None)
            }
            TransferJob::Writing(mut job) => {
                let line = std::mem::take(&mut job.lines[job.current_index]);
                job.current_index += 1;
                let next = if job.current_index == job.lines.len() {
                    tracing::info!("Write transfer finished: {} lines sent", job.current_index);
                    self.status = TransferStatus::Finished;
                    TransferJob::Done(TransferOutcome {
                        mode: TransferMode::WriteLines,
                        status: TransferStatus::Finished,
                        collected: BTreeMap::new(),
                        commands_sent: job.current_index,
                    })
                } else {
                    TransferJob::Writing(job)
                };
                (next, Some(OutgoingCommand::WriteMemory { line }))
            }
            idle_or_done => (idle_or_done, None),
        };

        self.job = next;
        command
    }

    /// Offer an inbound record to the running read job
    pub fn on_record(&mut self, record: Record) -> SequencerEffect {
        let job = match &mut self.job {
            TransferJob::Reading(job) | TransferJob::Finishing { job, .. } => job,
            _ => return SequencerEffect::Ignored(record),
        };

        let text = match record {
            Record::Unrecognized { text, .. } => text,
            other => return SequencerEffect::Ignored(other),
        };

        match parse_memory_response(&text) {
            Some(cell) if job.contains(cell.address) => {
                tracing::debug!("Collected {}={}", cell.address, cell.value);
                job.collected.insert(cell.address, cell.value.clone());
                SequencerEffect::Collected {
                    address: cell.address,
                    value: cell.value,
                }
            }
            Some(cell) => {
                tracing::warn!("Reply for address {} outside transfer range", cell.address);
                SequencerEffect::OutOfRange {
                    address: cell.address,
                    text,
                }
            }
            None => {
                tracing::warn!("Unrecognized format: {}", text);
                SequencerEffect::Malformed { text }
            }
        }
    }

    /// Hand off a published outcome and return to `Idle`
    pub fn take_outcome(&mut self) -> Option<TransferOutcome> {
        match std::mem::take(&mut self.job) {
            TransferJob::Done(outcome) => Some(outcome),
            other => {
                self.job = other;
                None
            }
        }
    }

    /// Drop any job and published outcome
    pub fn reset(&mut self) {
        self.job = TransferJob::Idle;
        self.status = TransferStatus::NotStarted;
    }

    /// True while reading, writing or finishing
    pub fn is_active(&self) -> bool {
        matches!(
            self.job,
            TransferJob::Reading(_) | TransferJob::Writing(_) | TransferJob::Finishing { .. }
        )
    }

    /// True while inbound lines belong to a read job
    pub fn is_reading(&self) -> bool {
        matches!(
            self.job,
            TransferJob::Reading(_) | TransferJob::Finishing { .. }
        )
    }

    pub fn phase(&self) -> TransferPhase {
        match self.job {
            TransferJob::Idle => TransferPhase::Idle,
            TransferJob::Reading(_) => TransferPhase::Reading,
            TransferJob::Writing(_) => TransferPhase::Writing,
            TransferJob::Finishing { .. } => TransferPhase::Finishing,
            TransferJob::Done(_) => TransferPhase::Done,
        }
    }

    pub fn status(&self) -> &TransferStatus {
        &self.status
    }

    pub fn job(&self) -> &TransferJob {
        &self.job
    }

    /// Data collected so far by a read job
    pub fn collected(&self) -> Option<&BTreeMap<u32, String>> {
        match &self.job {
            TransferJob::Reading(job) | TransferJob::Finishing { job, .. } => Some(&job.collected),
            TransferJob::Done(outcome) => Some(&outcome.collected),
            _ => None,
        }
    }

    /// Progress of the running job
    pub fn progress(&self) -> Option<TransferProgress> {
        match &self.job {
            TransferJob::Reading(job) => Some(TransferProgress {
                done: job.sent(),
                total: job.total(),
            }),
            TransferJob::Finishing { job, .. } => Some(TransferProgress {
                done: job.total(),
                total: job.total(),
            }),
            TransferJob::Writing(job) => Some(TransferProgress {
                done: job.current_index as u64,
                total: job.lines.len() as u64,
            }),
            _ => None,
        }
    }

    fn mode(&self) -> Option<TransferMode> {
        match &self.job {
            TransferJob::Idle => None,
            TransferJob::Reading(_) | TransferJob::Finishing { .. } => {
                Some(TransferMode::ReadRange)
            }
            TransferJob::Writing(_) => Some(TransferMode::WriteLines),
            TransferJob::Done(outcome) => Some(outcome.mode),
        }
    }

    fn commands_sent(&self) -> usize {
        match &self.job {
            TransferJob::Reading(job) | TransferJob::Finishing { job, .. } => job.sent() as usize,
            TransferJob::Writing(job) => job.current_index,
            TransferJob::Done(outcome) => outcome.commands_sent,
            TransferJob::Idle => 0,
        }
    }
}
