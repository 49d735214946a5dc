//! Rondo host daemon
//!
//! Bridges the knob to the desktop: finds the device over USB serial,
//! then runs a polling session loop that dispatches device messages to
//! the audio and media seams and flushes replies back. Device loss at
//! any point drops back into discovery; Ctrl-C sends a graceful `Exit`
//! to the device before shutting down.

mod audio;
mod cache;
mod config;
mod controller;
mod discovery;
mod error;
mod media;
mod stream;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::{error, info, warn};

use rondo_protocol::{Message, SerialLink};

use crate::audio::NullAudio;
use crate::config::HostConfig;
use crate::controller::Controller;
use crate::error::HostError;
use crate::media::{MediaWorker, NullMedia};
use crate::stream::HostStream;

/// Session loop poll period
const TICK_MS: u64 = 20;
/// Grace period for the serial driver to flush a farewell message
const CLOSE_GRACE_MS: u64 = 250;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_file = config::config_path().unwrap_or_else(|| PathBuf::from("rondo.toml"));
    let config = HostConfig::load(&config_file)
        .with_context(|| format!("loading {}", config_file.display()))?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .context("installing shutdown handler")?;

    info!("Rondo host starting (port = {})", config.port);

    while running.load(Ordering::SeqCst) {
        match discovery::connect(&config) {
            Ok(stream) => {
                let name = stream.name().unwrap_or_else(|| "<unnamed>".into());
                info!("Session starting on {}", name);
                match run_session(stream, &running) {
                    Ok(()) => info!("Session closed"),
                    Err(e) => warn!("Session on {} failed: {}", name, e),
                }
            }
            Err(HostError::DeviceNotFound) => info!("No device found, waiting"),
            Err(e) => error!("Discovery failed: {}", e),
        }

        if running.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(config.reconnect_delay_ms));
        }
    }

    info!("Rondo host stopped");
    Ok(())
}

/// Drive one connected session until shutdown or a fatal link error.
///
/// On error the device is told to disconnect if the port will still take
/// a write, so it can fall back to its startup state instead of waiting
/// on a dead session.
fn run_session(stream: HostStream, running: &AtomicBool) -> Result<(), HostError> {
    let mut link = SerialLink::new(stream);
    let mut controller = Controller::new(NullAudio::default(), MediaWorker::spawn(NullMedia::default()));

    let result = session_loop(&mut link, &mut controller, running);

    let farewell = if running.load(Ordering::SeqCst) {
        Message::Disconnect
    } else {
        Message::Exit
    };
    let _ = link.send(&farewell);
    std::thread::sleep(Duration::from_millis(CLOSE_GRACE_MS));

    result
}

fn session_loop(
    link: &mut SerialLink<HostStream>,
    controller: &mut Controller<NullAudio>,
    running: &AtomicBool,
) -> Result<(), HostError> {
    while running.load(Ordering::SeqCst) {
        link.update(controller)?;

        controller.poll_media();
        for msg in controller.drain_outbox() {
            link.send(&msg)?;
        }

        std::thread::sleep(Duration::from_millis(TICK_MS));
    }
    Ok(())
}
