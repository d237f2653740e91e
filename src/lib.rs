//! # serialmon-rs: Serial Instrument Monitor Core
//!
//! The non-visual core of a serial-line instrument monitor. A device streams
//! newline-terminated ASCII records; the monitor classifies each line, keeps
//! named values and two numeric sample buffers current, and runs paced EEPROM
//! read/write transfers over the same line.
//!
//! ## Architecture
//!
//! - **Protocol**: [`protocol::LineDecoder`] turns one line into one [`types::Record`];
//!   [`protocol::LineFramer`] splits raw bytes into lines
//! - **Session**: [`session::MonitorSession`] routes records to the value table,
//!   the channel buffers or the running transfer
//! - **Transfers**: [`transfer::TransferSequencer`] emits one memory command per tick
//!   and collects `address=value` replies
//! - **Backend**: [`backend::MonitorBackend`] owns the transport in a worker thread
//!   and talks to the frontend over crossbeam channels
//!
//! ## Configuration
//!
//! Settings are stored under the platform config directory as
//! `serialmon-rs/config.toml` (see [`config::AppConfig`]).
//!
//! ## Example
//!
//! ```ignore
//! use serialmon_rs::{AppConfig, MonitorBackend, SimulatedTransport};
//!
//! let config = AppConfig::load_or_default(AppConfig::default_path());
//! let (backend, frontend) = MonitorBackend::new(config.clone(), Box::new(SimulatedTransport::new()));
//! let worker = std::thread::spawn(move || backend.run());
//!
//! frontend.open(config.serial.clone());
//! frontend.send_line("PI?");
//! frontend.shutdown();
//! worker.join().ok();
//! ```

pub mod backend;
pub mod buffers;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transfer;
pub mod transport;
pub mod types;
pub mod values;

// Re-export commonly used types
pub use backend::{FrontendHandle, MonitorBackend, MonitorCommand, MonitorMessage};
pub use config::{AppConfig, CommandPresets};
pub use error::{MonitorError, Result, TransferError};
pub use protocol::LineDecoder;
pub use session::{MonitorSession, SessionEvent};
pub use transfer::{TransferDump, TransferOutcome, TransferSequencer, TransferStatus};
pub use transport::{SimulatedTransport, Transport};
pub use types::{Channel, OutgoingCommand, Record};
