//! System volume seam
//!
//! The actual OS volume integration is a separate concern; the control
//! loop only needs get/set of a normalised level. [`NullAudio`] stands in
//! for platforms without an integration and during tests.

use anyhow::Result;

pub trait AudioEndpoint {
    /// Current system volume in [0, 1]
    fn volume(&mut self) -> Result<f32>;

    fn set_volume(&mut self, level: f32) -> Result<()>;
}

/// Remembers the level but touches no hardware
pub struct NullAudio {
    level: f32,
}

impl Default for NullAudio {
    fn default() -> Self {
        Self { level: 0.5 }
    }
}

impl AudioEndpoint for NullAudio {
    fn volume(&mut self) -> Result<f32> {
        Ok(self.level)
    }

    fn set_volume(&mut self, level: f32) -> Result<()> {
        self.level = level.clamp(0.0, 1.0);
        Ok(())
    }
}
