//! Host-side byte stream over an OS serial port
//!
//! `bytes_available` checks the driver's receive buffer without blocking;
//! reads block for at most the port timeout. A timed-out read surfaces as
//! zero bytes, which the link layer interprets as "nothing more coming
//! within the deadline".

use std::io::{Read, Write};
use std::time::Duration;

use serialport::{FlowControl, SerialPort};

use rondo_protocol::{ByteStream, BAUD_RATE};

/// Per-read timeout; an in-flight message finishes well within this
const READ_TIMEOUT_MS: u64 = 50;

pub struct HostStream {
    port: Box<dyn SerialPort>,
}

impl HostStream {
    pub fn open(port_name: &str) -> Result<Self, serialport::Error> {
        let port = serialport::new(port_name, BAUD_RATE)
            .timeout(Duration::from_millis(READ_TIMEOUT_MS))
            .flow_control(FlowControl::None)
            .open()?;
        Ok(Self { port })
    }

    pub fn name(&self) -> Option<String> {
        self.port.name()
    }
}

impl ByteStream for HostStream {
    type Error = std::io::Error;

    fn bytes_available(&mut self) -> Result<bool, Self::Error> {
        let waiting = self.port.bytes_to_read().map_err(std::io::Error::from)?;
        Ok(waiting > 0)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        Write::write_all(&mut self.port, buf)
    }
}
