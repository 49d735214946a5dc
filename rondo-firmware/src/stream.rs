//! Device-side byte stream over the USB CDC link
//!
//! The CDC tasks (see [`crate::tasks::usb`]) move raw packets between the
//! USB endpoints and the pipes in [`crate::channels`]. This adapter
//! reassembles the inbound chunks so the control loop's link never waits
//! mid-payload: `bytes_available` only reports true once the message at
//! the front of the buffer is complete.

use rondo_protocol::{ByteStream, MessageBuffer, MAX_MESSAGE_SIZE};

use crate::channels::{RX_PIPE, TX_PIPE};

/// The outbound pipe filled up; the CDC transmit task has stopped
/// draining it, which means the transport is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxOverflow;

pub struct UsbStream {
    inbound: MessageBuffer<128>,
}

impl UsbStream {
    pub fn new() -> Self {
        Self {
            inbound: MessageBuffer::new(),
        }
    }

    /// Move whatever the CDC receive task has queued into the reassembly
    /// buffer
    fn pump(&mut self) {
        let mut chunk = [0u8; MAX_MESSAGE_SIZE];
        loop {
            let want = self.inbound.free().min(chunk.len());
            if want == 0 {
                break;
            }
            match RX_PIPE.try_read(&mut chunk[..want]) {
                Ok(n) => {
                    self.inbound.extend(&chunk[..n]);
                }
                Err(_) => break,
            }
        }
    }
}

impl ByteStream for UsbStream {
    type Error = TxOverflow;

    fn bytes_available(&mut self) -> Result<bool, TxOverflow> {
        self.pump();
        Ok(self.inbound.message_ready())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TxOverflow> {
        self.pump();
        Ok(self.inbound.take(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), TxOverflow> {
        let mut sent = 0;
        while sent < buf.len() {
            match TX_PIPE.try_write(&buf[sent..]) {
                Ok(n) => sent += n,
                Err(_) => return Err(TxOverflow),
            }
        }
        Ok(())
    }
}
