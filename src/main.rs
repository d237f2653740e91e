//! Serial Monitor - Replay Entry Point
//!
//! Feeds a captured serial log through the monitor backend against a
//! simulated device and prints what the monitor made of it.
//!
//! ```text
//! serialmon-rs [--config PATH] [--read START END] [CAPTURE]
//! ```
//!
//! Without `CAPTURE` the capture is read from stdin. With `--read`,
//! `address=value` lines in the capture become the simulated EEPROM image
//! instead of being replayed, a read transfer is run over `[START, END]`,
//! and the result is saved to the configured dump file.

use anyhow::{bail, Context};
use clap::Parser;
use serialmon_rs::{
    config::LoggingConfig,
    protocol::parse_memory_response,
    transfer::{TransferMode, TransferStatus},
    AppConfig, Channel, MonitorBackend, MonitorMessage, SimulatedTransport, TransferDump,
};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,serialmon_rs=debug";

/// How long the replay waits for more traffic before finishing
const QUIET_PERIOD: Duration = Duration::from_millis(500);

#[derive(Debug, Parser)]
#[command(
    name = "serialmon-rs",
    version,
    about = "Replay a serial capture through the instrument monitor"
)]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Read device memory over [START, END] instead of replaying the capture
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    read: Option<Vec<u32>>,

    /// Capture file; stdin when omitted
    #[arg(value_name = "CAPTURE")]
    capture: Option<PathBuf>,
}

impl Args {
    fn read_range(&self) -> Option<(u32, u32)> {
        match self.read.as_deref() {
            Some(&[start, end]) => Some((start, end)),
            _ => None,
        }
    }
}

fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter.as_deref().unwrap_or(DEFAULT_FILTER)));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "serialmon-rs.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

fn read_capture(path: Option<&PathBuf>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read capture {:?}", path)),
        None => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("Failed to read capture from stdin")?;
            Ok(content)
        }
    }
}

#[derive(Debug, Default)]
struct Summary {
    lines: usize,
    values: BTreeMap<usize, String>,
    buffers: BTreeMap<Channel, usize>,
    unrecognized: usize,
    errors: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let read_range = args.read_range();
    let config = AppConfig::load_or_default(args.config.clone().or_else(AppConfig::default_path));
    let _guard = init_logging(&config.logging)?;

    tracing::info!("Starting serial monitor replay");

    let capture = read_capture(args.capture.as_ref())?;
    let mut transport = SimulatedTransport::new();
    let handle = transport.handle();
    for line in capture.lines() {
        match (read_range, parse_memory_response(line)) {
            (Some(_), Some(cell)) => transport = transport.with_memory([(cell.address, cell.value)]),
            _ => handle.push_line(line),
        }
    }

    let (backend, frontend) = MonitorBackend::new(config.clone(), Box::new(transport));
    let worker = std::thread::spawn(move || backend.run());

    frontend.open(config.serial.clone());
    if let Some((start, end)) = read_range {
        frontend.start_read(start, end);
    }

    let mut summary = Summary::default();
    let mut transfer_pending = read_range.is_some();
    let mut last_message = Instant::now();

    while transfer_pending || last_message.elapsed() < QUIET_PERIOD {
        let Some(msg) = frontend.recv_timeout(Duration::from_millis(50)) else {
            continue;
        };
        last_message = Instant::now();

        match msg {
            MonitorMessage::LineReceived { timestamp, text } => {
                summary.lines += 1;
                tracing::info!("{} {}", timestamp, text);
            }
            MonitorMessage::ValueUpdated { index, raw_value } => {
                summary.values.insert(index, raw_value);
            }
            MonitorMessage::BufferReady { channel, samples, .. } => {
                summary.buffers.insert(channel, samples);
            }
            MonitorMessage::Unrecognized { .. } => summary.unrecognized += 1,
            MonitorMessage::TransferFinished(outcome) => {
                transfer_pending = false;
                tracing::info!(
                    "{} transfer {:?}: {} entries",
                    outcome.mode,
                    outcome.status,
                    outcome.collected.len()
                );
                if outcome.mode == TransferMode::ReadRange
                    && outcome.status == TransferStatus::Finished
                {
                    TransferDump::new(outcome.collected).save(&config.transfer.dump_file)?;
                }
            }
            MonitorMessage::Error(error) => {
                tracing::error!("{}", error);
                summary.errors.push(error);
                transfer_pending = false;
            }
            MonitorMessage::Shutdown => break,
            _ => {}
        }
    }

    frontend.shutdown();
    if worker.join().is_err() {
        bail!("Backend thread panicked");
    }

    println!("Lines received: {}", summary.lines);
    println!("Unrecognized:   {}", summary.unrecognized);
    for (index, value) in &summary.values {
        println!("Value {:>2}: {}", index, value);
    }
    for (channel, samples) in &summary.buffers {
        println!("{} buffer: last stream carried {} samples", channel, samples);
    }
    if !summary.errors.is_empty() {
        bail!("{} errors during replay", summary.errors.len());
    }

    Ok(())
}
