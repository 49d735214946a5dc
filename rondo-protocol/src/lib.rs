//! Rondo serial message protocol
//!
//! This crate defines the binary message vocabulary spoken between the knob
//! firmware and the desktop host program, plus the generic serial link that
//! frames and dispatches those messages. Both endpoints compile this exact
//! crate, which is what guarantees they interpret the wire identically.
//!
//! # Wire format
//!
//! ```text
//! ┌─────────┬──────────────────┐
//! │ TYPE ID │ PAYLOAD          │
//! │ 1B      │ fixed per type   │
//! └─────────┴──────────────────┘
//! ```
//!
//! There is no length prefix, delimiter, or checksum: the type id alone
//! determines the payload length via a static per-type size table. The id of
//! a message type is its position in [`messages::REGISTRY`] - that ordering
//! *is* the protocol version, so it must never be reordered without
//! rebuilding both endpoints.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]

#[cfg(all(test, not(feature = "std")))]
#[macro_use]
extern crate std;

pub mod link;
pub mod messages;

pub use link::{ByteStream, LinkError, MessageBuffer, MessageSink, SerialLink};
pub use messages::{
    Message, MessageKind, ProtocolError, MAX_MESSAGE_SIZE, MAX_PAYLOAD_SIZE, SPECTRUM_BINS,
};

/// Baud rate the host configures on open. The device end is a native USB
/// CDC interface, which carries whole packets and ignores the line rate.
pub const BAUD_RATE: u32 = 115_200;

/// USB vendor id of the knob's serial interface (Raspberry Pi).
pub const USB_VID: u16 = 0x2E8A;

/// USB product id of the knob's serial interface (Pico CDC).
pub const USB_PID: u16 = 0x000A;

/// Device-type tag carried in `Identify` messages. The host only accepts a
/// port whose `Identify` carries this exact tag, so other devices that
/// happen to share the VID/PID are rejected during discovery.
pub const DEVICE_TYPE_TAG: u8 = 0x52;

/// Log levels carried in `Log` messages.
///
/// Values match the host logger's numeric levels so device-side log lines
/// can be re-emitted by the host without translation tables.
pub mod level {
    pub const CRITICAL: u8 = 50;
    pub const ERROR: u8 = 40;
    pub const WARNING: u8 = 30;
    pub const INFO: u8 = 20;
    pub const DEBUG: u8 = 10;
    pub const TRACE: u8 = 5;
}
