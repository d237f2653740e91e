//! Backend construction helpers

use serialmon_rs::backend::{FrontendHandle, MonitorBackend, MonitorMessage};
use serialmon_rs::config::AppConfig;
use serialmon_rs::transport::Transport;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Config with short ticks so transfers finish quickly
pub fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.transfer.tick_interval_ms = 2;
    config.transfer.settle_ticks = 3;
    config
}

/// Spawn a backend thread over `transport`
pub fn spawn_backend(
    config: AppConfig,
    transport: impl Transport + 'static,
) -> (FrontendHandle, JoinHandle<()>) {
    let (backend, frontend) = MonitorBackend::new(config, Box::new(transport));
    let handle = std::thread::spawn(move || backend.run());
    (frontend, handle)
}

/// Collect messages until `done` matches one or `timeout` passes
pub fn collect_until(
    frontend: &FrontendHandle,
    timeout: Duration,
    mut done: impl FnMut(&MonitorMessage) -> bool,
) -> Vec<MonitorMessage> {
    let deadline = Instant::now() + timeout;
    let mut messages = Vec::new();
    while Instant::now() < deadline {
        if let Some(msg) = frontend.recv_timeout(Duration::from_millis(10)) {
            let finished = done(&msg);
            messages.push(msg);
            if finished {
                break;
            }
        }
    }
    messages
}
