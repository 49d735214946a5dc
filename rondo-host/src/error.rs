//! Host-side error type

use rondo_protocol::{LinkError, ProtocolError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    /// Every candidate port was tried and none answered as a knob
    #[error("no Rondo device found")]
    DeviceNotFound,

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Session-fatal link failure (lost framing, registry desync)
    #[error("link failure: {0}")]
    Link(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("cache serialization: {0}")]
    CacheEncode(#[from] toml::ser::Error),
}

impl From<LinkError<std::io::Error>> for HostError {
    fn from(e: LinkError<std::io::Error>) -> Self {
        match e {
            LinkError::Io(io) => HostError::Io(io),
            other => HostError::Link(other.to_string()),
        }
    }
}
