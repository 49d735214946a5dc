//! Device discovery
//!
//! Candidate ports are USB serial devices matching the knob's VID/PID.
//! The cached serial number gives a fast path: reopen the known device
//! directly, no handshake. Otherwise each candidate is opened in turn and
//! watched for the periodic `Identify` broadcast carrying the Rondo
//! device tag; the first match wins and refreshes the cache.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serialport::SerialPortType;

use rondo_protocol::{Message, SerialLink, DEVICE_TYPE_TAG, USB_PID, USB_VID};

use crate::cache::{cache_path, SerialCache};
use crate::config::HostConfig;
use crate::error::HostError;
use crate::stream::HostStream;

/// Poll interval while waiting for an `Identify` during probing
const PROBE_POLL_MS: u64 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub port_name: String,
    pub serial_number: Option<String>,
}

/// Enumerate ports whose USB ids match the knob hardware
pub fn candidates() -> Result<Vec<Candidate>, HostError> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .filter_map(|info| match info.port_type {
            SerialPortType::UsbPort(usb) if usb.vid == USB_VID && usb.pid == USB_PID => {
                Some(Candidate {
                    port_name: info.port_name,
                    serial_number: usb.serial_number,
                })
            }
            _ => None,
        })
        .collect())
}

/// Split candidates into the cached fast path and the probing order.
///
/// The fast-path candidate, if any, is the one whose USB serial number
/// matches the cache; it is opened without any Identify exchange. All
/// other candidates are probed in enumeration order.
pub fn plan<'a>(
    candidates: &'a [Candidate],
    cached_serial: Option<&str>,
) -> (Option<&'a Candidate>, Vec<&'a Candidate>) {
    let fast = cached_serial
        .and_then(|s| candidates.iter().find(|c| c.serial_number.as_deref() == Some(s)));
    let probe = candidates
        .iter()
        .filter(|c| fast.map_or(true, |f| !std::ptr::eq(*c, f)))
        .collect();
    (fast, probe)
}

/// Find and open the knob, per the host configuration
pub fn connect(config: &HostConfig) -> Result<HostStream, HostError> {
    if config.port != "auto" {
        info!("Opening configured port {}", config.port);
        return Ok(HostStream::open(&config.port)?);
    }

    let found = candidates()?;
    debug!("{} candidate port(s) by USB id", found.len());

    let cache_file = cache_path();
    let cached = cache_file
        .as_deref()
        .and_then(SerialCache::load)
        .map(|c| c.serial_number);
    let (fast, probe) = plan(&found, cached.as_deref());

    if let Some(candidate) = fast {
        match HostStream::open(&candidate.port_name) {
            Ok(stream) => {
                info!("Reconnected to cached device on {}", candidate.port_name);
                return Ok(stream);
            }
            Err(e) => {
                // Stale cache entry; fall back to probing everything
                warn!("Cached port {} failed to open: {}", candidate.port_name, e);
            }
        }
    }

    let timeout = Duration::from_millis(config.identify_timeout_ms);
    for candidate in probe.into_iter().chain(fast) {
        debug!("Probing {}", candidate.port_name);
        let stream = match HostStream::open(&candidate.port_name) {
            Ok(s) => s,
            Err(e) => {
                warn!("Cannot open {}: {}", candidate.port_name, e);
                continue;
            }
        };

        match await_identify(stream, timeout) {
            Some(stream) => {
                info!("Found knob on {}", candidate.port_name);
                if let (Some(path), Some(serial)) =
                    (cache_file.as_deref(), candidate.serial_number.as_deref())
                {
                    let cache = SerialCache {
                        serial_number: serial.to_string(),
                    };
                    if let Err(e) = cache.store(path) {
                        warn!("Failed to write device cache: {}", e);
                    }
                }
                return Ok(stream);
            }
            None => debug!("No Identify from {}", candidate.port_name),
        }
    }

    Err(HostError::DeviceNotFound)
}

/// Watch a freshly opened port for the device's `Identify` broadcast.
/// Returns the stream on a tag match, or `None` on timeout or any link
/// failure (a non-knob device may well emit garbage bytes).
fn await_identify(stream: HostStream, timeout: Duration) -> Option<HostStream> {
    let mut link = SerialLink::new(stream);
    let deadline = Instant::now() + timeout;
    let mut seen = false;

    while Instant::now() < deadline {
        let result = link.update(&mut |msg: Message| {
            if let Message::Identify { device_type } = msg {
                if device_type == DEVICE_TYPE_TAG {
                    seen = true;
                }
            }
        });
        if result.is_err() {
            return None;
        }
        if seen {
            return Some(link.into_inner());
        }
        std::thread::sleep(Duration::from_millis(PROBE_POLL_MS));
    }
    None
}
