//! Shared state between tasks
//!
//! The encoder task publishes its wrapping count here and the CDC tasks
//! shuttle serial bytes through a pipe pair; the control task reads a
//! snapshot and drains the inbound pipe once per tick. Everything else
//! stays task-local.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pipe::Pipe;
use portable_atomic::AtomicU16;

/// Current encoder count in `0..ENCODER_CPR`, written only by the
/// encoder task
pub static ENCODER_COUNT: AtomicU16 = AtomicU16::new(0);

/// Raw bytes received from the host, filled by the CDC receive task
pub static RX_PIPE: Pipe<CriticalSectionRawMutex, 256> = Pipe::new();

/// Raw bytes queued for the host, drained by the CDC transmit task
pub static TX_PIPE: Pipe<CriticalSectionRawMutex, 256> = Pipe::new();
