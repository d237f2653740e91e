//! Integration tests for backend lifecycle
//!
//! These tests validate the complete backend workflow on a real thread:
//! - Opening and closing the simulated port
//! - Line routing to value and buffer messages
//! - Read and write transfers paced by the worker
//! - Auto run and shutdown

mod common;

use common::builders::CaptureBuilder;
use common::mock_helpers::{collect_until, fast_config, spawn_backend};
use common::{assert_float_eq, test_timeout};
use serial_test::serial;
use serialmon_rs::backend::{MonitorCommand, MonitorMessage};
use serialmon_rs::buffers::SegmentScale;
use serialmon_rs::transfer::{TransferMode, TransferStatus};
use serialmon_rs::transport::SimulatedTransport;
use serialmon_rs::types::{Activity, ConnectionStatus};
use serialmon_rs::Channel;
use std::thread;
use std::time::Duration;

fn is_finished(msg: &MonitorMessage) -> bool {
    matches!(msg, MonitorMessage::TransferFinished(_))
}

#[test]
#[serial]
fn test_backend_creation_and_shutdown() {
    let (frontend, handle) = spawn_backend(fast_config(), SimulatedTransport::new());

    thread::sleep(Duration::from_millis(20));
    frontend.shutdown();

    let result = handle.join();
    assert!(result.is_ok(), "Backend thread should exit cleanly");
    assert!(frontend.drain().contains(&MonitorMessage::Shutdown));
}

#[test]
#[serial]
fn test_backend_stops_when_frontend_dropped() {
    let (frontend, handle) = spawn_backend(fast_config(), SimulatedTransport::new());
    drop(frontend);
    assert!(handle.join().is_ok());
}

#[test]
#[serial]
fn test_open_and_close() {
    let config = fast_config();
    let (frontend, handle) = spawn_backend(config.clone(), SimulatedTransport::new());

    frontend.open(config.serial.clone());
    let messages = collect_until(&frontend, test_timeout(), |m| {
        matches!(m, MonitorMessage::ConnectionStatus(_))
    });
    assert_eq!(
        messages.last(),
        Some(&MonitorMessage::ConnectionStatus(ConnectionStatus::Connected))
    );

    frontend.close();
    let messages = collect_until(&frontend, test_timeout(), |m| {
        matches!(m, MonitorMessage::ConnectionStatus(_))
    });
    assert_eq!(
        messages.last(),
        Some(&MonitorMessage::ConnectionStatus(ConnectionStatus::Disconnected))
    );

    frontend.shutdown();
    handle.join().unwrap();
}

#[test]
#[serial]
fn test_open_failure_reported() {
    let transport = SimulatedTransport::new();
    transport.handle().fail_open("Access denied");
    let config = fast_config();
    let (frontend, handle) = spawn_backend(config.clone(), transport);

    frontend.open(config.serial.clone());
    let messages = collect_until(&frontend, test_timeout(), |m| {
        matches!(m, MonitorMessage::Error(_))
    });
    assert!(messages.contains(&MonitorMessage::ConnectionStatus(ConnectionStatus::Error)));

    frontend.shutdown();
    handle.join().unwrap();
}

#[test]
#[serial]
fn test_lines_routed_to_messages() {
    let transport = SimulatedTransport::new();
    let device = transport.handle();
    let config = fast_config();
    let (frontend, handle) = spawn_backend(config.clone(), transport);

    frontend.open(config.serial.clone());
    let capture = CaptureBuilder::new()
        .value(0, "3.30")
        .stream(Channel::Secondary, &[0.25, 0.5])
        .line("hello");
    device.push_bytes(&capture.to_bytes());

    let messages = collect_until(&frontend, test_timeout(), |m| {
        matches!(m, MonitorMessage::Unrecognized { .. })
    });

    assert!(messages.contains(&MonitorMessage::ValueUpdated {
        index: 0,
        raw_value: "3.30".to_string()
    }));
    let data = messages.iter().find_map(|m| match m {
        MonitorMessage::BufferReady {
            channel: Channel::Secondary,
            samples,
            data,
        } => Some((*samples, data.clone())),
        _ => None,
    });
    let (samples, data) = data.expect("buffer ready");
    assert_eq!(samples, 2);
    for (actual, expected) in data.iter().zip([0.25, 0.5, 0.0]) {
        assert_float_eq(*actual, expected, 1e-12);
    }
    assert!(messages.iter().any(|m| matches!(
        m,
        MonitorMessage::LineReceived { timestamp, text }
            if text == "hello" && timestamp.starts_with('[') && timestamp.ends_with(']')
    )));

    frontend.shutdown();
    handle.join().unwrap();
}

#[test]
#[serial]
fn test_read_transfer_on_thread() {
    let transport = SimulatedTransport::new().with_memory([(10, "AA"), (11, "BB"), (12, "CC")]);
    let device = transport.handle();
    let config = fast_config();
    let (frontend, handle) = spawn_backend(config.clone(), transport);

    frontend.open(config.serial.clone());
    frontend.start_read(10, 12);
    let messages = collect_until(&frontend, test_timeout(), is_finished);

    let outcome = messages
        .iter()
        .find_map(|m| match m {
            MonitorMessage::TransferFinished(outcome) => Some(outcome.clone()),
            _ => None,
        })
        .expect("transfer should finish");
    assert_eq!(outcome.mode, TransferMode::ReadRange);
    assert_eq!(outcome.status, TransferStatus::Finished);
    assert_eq!(outcome.collected.len(), 3);
    assert_eq!(device.sent(), vec![":mem? 10", ":mem? 11", ":mem? 12"]);
    assert!(messages.contains(&MonitorMessage::Activity(Activity::TransferReading)));

    frontend.shutdown();
    handle.join().unwrap();
}

#[test]
#[serial]
fn test_write_transfer_on_thread() {
    let transport = SimulatedTransport::new();
    let device = transport.handle();
    let config = fast_config();
    let (frontend, handle) = spawn_backend(config.clone(), transport);

    frontend.open(config.serial.clone());
    frontend.start_write(vec!["x".to_string(), "y".to_string()]);
    let messages = collect_until(&frontend, test_timeout(), is_finished);

    assert!(messages.iter().any(|m| matches!(
        m,
        MonitorMessage::TransferFinished(outcome)
            if outcome.mode == TransferMode::WriteLines && outcome.commands_sent == 2
    )));
    assert_eq!(device.sent(), vec![":mem x", ":mem y"]);
    assert_eq!(device.written_bytes(), b":mem x\r:mem y\r".to_vec());

    frontend.shutdown();
    handle.join().unwrap();
}

#[test]
#[serial]
fn test_send_failure_ends_transfer() {
    let transport = SimulatedTransport::new();
    let device = transport.handle();
    let mut config = fast_config();
    config.transfer.tick_interval_ms = 20;
    let (frontend, handle) = spawn_backend(config.clone(), transport);

    frontend.open(config.serial.clone());
    frontend.start_read(0, 100);
    collect_until(&frontend, test_timeout(), |m| {
        matches!(m, MonitorMessage::TransferProgress(_))
    });
    device.fail_sends("cable pulled");

    let messages = collect_until(&frontend, test_timeout(), is_finished);
    let outcome = messages
        .iter()
        .find_map(|m| match m {
            MonitorMessage::TransferFinished(outcome) => Some(outcome.clone()),
            _ => None,
        })
        .expect("transfer should finish");
    assert!(matches!(&outcome.status, TransferStatus::Failed(reason) if reason.contains("cable pulled")));
    assert_eq!(outcome.commands_sent, device.sent().len());

    frontend.shutdown();
    handle.join().unwrap();
}

#[test]
#[serial]
fn test_open_while_open_keeps_read_running() {
    let transport = SimulatedTransport::new().with_memory((0..8).map(|a| (a, "FF")));
    let mut config = fast_config();
    config.transfer.tick_interval_ms = 10;
    let (frontend, handle) = spawn_backend(config.clone(), transport);

    frontend.open(config.serial.clone());
    frontend.start_read(0, 7);
    collect_until(&frontend, test_timeout(), |m| {
        matches!(m, MonitorMessage::TransferProgress(_))
    });
    frontend.open(config.serial.clone());

    let messages = collect_until(&frontend, test_timeout(), is_finished);
    assert!(messages.contains(&MonitorMessage::Error("A port is already open.".to_string())));
    assert!(!messages
        .iter()
        .any(|m| matches!(m, MonitorMessage::ConnectionStatus(_))));
    assert!(messages.iter().any(|m| matches!(
        m,
        MonitorMessage::TransferFinished(outcome)
            if outcome.status == TransferStatus::Finished && outcome.collected.len() == 8
    )));

    frontend.shutdown();
    handle.join().unwrap();
}

#[test]
#[serial]
fn test_scaled_buffer_on_thread() {
    let transport = SimulatedTransport::new();
    let device = transport.handle();
    let config = fast_config();
    let points = config.buffers.points_per_segment;
    let (frontend, handle) = spawn_backend(config.clone(), transport);

    frontend.open(config.serial.clone());
    device.push_line("MB,0,1.5");
    device.push_line(format!("MB,{},2.0", points));
    device.push_line("MB,5000,0");
    collect_until(&frontend, test_timeout(), |m| {
        matches!(m, MonitorMessage::BufferReady { .. })
    });

    frontend.send_command(MonitorCommand::RequestScaled {
        channel: Channel::Primary,
        scales: vec![SegmentScale::new(0.1, 0.2), SegmentScale::new(3.3, -1.1)],
    });
    let messages = collect_until(&frontend, test_timeout(), |m| {
        matches!(m, MonitorMessage::ScaledBuffer { .. })
    });
    let data = messages
        .iter()
        .find_map(|m| match m {
            MonitorMessage::ScaledBuffer {
                channel: Channel::Primary,
                data,
            } => Some(data.clone()),
            _ => None,
        })
        .expect("scaled buffer");

    assert_float_eq(data[0], 0.35, 1e-9);
    assert_float_eq(data[1], 0.2, 1e-9);
    assert_float_eq(data[points], 5.5, 1e-9);
    assert_float_eq(data[points + 1], -1.1, 1e-9);
    assert_float_eq(data[2 * points], 0.0, 1e-9);

    frontend.shutdown();
    handle.join().unwrap();
}

#[test]
#[serial]
fn test_auto_run_repeats_command() {
    let transport = SimulatedTransport::new();
    let device = transport.handle();
    let config = fast_config();
    let (frontend, handle) = spawn_backend(config.clone(), transport);

    frontend.open(config.serial.clone());
    frontend.start_auto_run("PI?", Duration::from_millis(10));
    thread::sleep(Duration::from_millis(100));
    frontend.stop_auto_run();
    thread::sleep(Duration::from_millis(20));
    let sent = device.sent().len();

    assert!(sent >= 2, "expected repeated sends, got {}", sent);
    assert!(device.sent().iter().all(|line| line == "PI?"));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(device.sent().len(), sent);

    frontend.shutdown();
    handle.join().unwrap();
}
