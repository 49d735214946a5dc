//! Board-agnostic core logic for the Rondo media knob
//!
//! This crate contains all device-side logic that does not depend on
//! specific hardware:
//!
//! - Quadrature encoder decoding and switch debouncing
//! - LED ring rendering engine (frames, crossfades, effects)
//! - Device state machine (gesture interpretation, protocol reactions)
//! - Fault category display
//! - Tunable constants shared by the firmware
//!
//! The firmware crate wires these up to real pins, the USB serial link,
//! and the ws2812 driver; everything here is pure and testable on the
//! host.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod config;
pub mod encoder;
pub mod fault;
pub mod ring;
pub mod state;
