//! Quadrature encoder decoding
//!
//! Converts raw two-phase pin edges into a wrapping rotation counter plus a
//! debounced switch state. The edge handler is O(1) and allocation-free so
//! the firmware can run it from interrupt context; everything else only
//! reads snapshots of the counter.

/// Which encoder phase pin triggered an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    A,
    B,
}

/// Snapshot of encoder state taken once per control-loop tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncoderSnapshot {
    /// Rotation counter, wraps modulo counts-per-revolution
    pub count: u16,
    /// Debounced switch state (true = pressed)
    pub pressed: bool,
}

/// Decoder state for one quadrature encoder.
///
/// The same-pin-same-level suppression reproduces the behaviour the
/// hardware was tuned against: the interrupt path can re-deliver a single
/// edge, and a repeat of the last (pin, level) pair is discarded. This is a
/// workaround for that quirk, not a principled debounce filter, and may
/// still miss or double counts under very fast rotation.
#[derive(Debug, Clone)]
pub struct QuadratureDecoder {
    count: u16,
    cpr: u16,
    last_phase: Phase,
    last_level: bool,
}

impl QuadratureDecoder {
    /// Create a decoder for an encoder with the given pulses-per-revolution
    pub fn new(ppr: u16) -> Self {
        // Both phase lines idle high on their pull-ups
        Self {
            count: 0,
            cpr: ppr * 4,
            last_phase: Phase::A,
            last_level: true,
        }
    }

    /// Counts per revolution (the counter's modulus)
    pub fn cpr(&self) -> u16 {
        self.cpr
    }

    /// Current counter value in `0..cpr`
    pub fn count(&self) -> u16 {
        self.count
    }

    /// Handle one edge on either phase pin.
    ///
    /// Both pin levels must be sampled immediately when the edge fires and
    /// passed in; the levels may change again before this returns, so the
    /// handler never re-reads them.
    pub fn on_edge(&mut self, phase: Phase, level_a: bool, level_b: bool) {
        let level = match phase {
            Phase::A => level_a,
            Phase::B => level_b,
        };

        if self.last_phase == phase && self.last_level == level {
            return; // Repeat delivery of the same edge
        }
        self.last_phase = phase;
        self.last_level = level;

        let direction: i32 = if (phase == Phase::B) == (level_a == level_b) {
            1
        } else {
            -1
        };
        self.count = (self.count as i32 + direction).rem_euclid(self.cpr as i32) as u16;
    }
}

/// Signed shortest-path rotation between two counter values.
///
/// The result is always in `(-modulus/2, modulus/2]`. Required whenever
/// counts are compared across time: a raw subtraction would misread a
/// wraparound as a near-full-revolution turn.
pub fn encoder_delta(old: u16, new: u16, modulus: u16) -> i16 {
    let m = modulus as i32;
    let mut delta = new as i32 - old as i32;
    if delta * 2 > m {
        delta -= m;
    }
    if delta * 2 <= -m {
        delta += m;
    }
    delta as i16
}

/// Debouncer for the encoder's pushbutton.
///
/// The raw level must hold steady for the debounce interval before the
/// reported state changes. Pressed is logic low on the pull-up input; the
/// firmware inverts before feeding this.
#[derive(Debug, Clone)]
pub struct Debouncer {
    stable: bool,
    last_raw: bool,
    last_change_ms: u32,
    interval_ms: u32,
}

impl Debouncer {
    pub fn new(initial: bool, interval_ms: u32) -> Self {
        Self {
            stable: initial,
            last_raw: initial,
            last_change_ms: 0,
            interval_ms,
        }
    }

    /// Feed the current raw level, returning the debounced state
    pub fn update(&mut self, raw: bool, now_ms: u32) -> bool {
        if raw != self.last_raw {
            self.last_raw = raw;
            self.last_change_ms = now_ms;
        } else if now_ms.wrapping_sub(self.last_change_ms) >= self.interval_ms {
            self.stable = raw;
        }
        self.stable
    }

    pub fn state(&self) -> bool {
        self.stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_delta_wraparound_is_shortest_path() {
        // One count anticlockwise across the wrap point, not +79
        assert_eq!(encoder_delta(0, 79, 80), -1);
        assert_eq!(encoder_delta(79, 0, 80), 1);
        assert_eq!(encoder_delta(10, 13, 80), 3);
        assert_eq!(encoder_delta(13, 10, 80), -3);
        // Exactly half a revolution resolves to the positive bound
        assert_eq!(encoder_delta(0, 40, 80), 40);
        assert_eq!(encoder_delta(40, 0, 80), 40);
    }

    proptest! {
        #[test]
        fn delta_always_in_half_open_range(old in 0u16..80, new in 0u16..80) {
            let d = encoder_delta(old, new, 80) as i32;
            prop_assert!(d > -40 && d <= 40);
            // And it really is congruent to the raw difference
            let raw = new as i32 - old as i32;
            prop_assert_eq!((d - raw).rem_euclid(80), 0);
        }
    }

    #[test]
    fn test_full_quadrature_cycle_counts_four() {
        let mut dec = QuadratureDecoder::new(20);
        // Clockwise sequence: A falls, B falls, A rises, B rises
        dec.on_edge(Phase::A, false, true);
        dec.on_edge(Phase::B, false, false);
        dec.on_edge(Phase::A, true, false);
        dec.on_edge(Phase::B, true, true);
        assert_eq!(dec.count(), 4);
    }

    #[test]
    fn test_repeat_edge_suppressed() {
        let mut dec = QuadratureDecoder::new(20);
        dec.on_edge(Phase::A, false, true);
        let after_first = dec.count();
        // Same pin, same level: the interrupt path re-delivered the edge
        dec.on_edge(Phase::A, false, true);
        assert_eq!(dec.count(), after_first);
        // Same pin, opposite level is a genuine new edge
        dec.on_edge(Phase::A, true, true);
        assert_ne!(dec.count(), after_first);
    }

    #[test]
    fn test_count_wraps_at_cpr() {
        let mut dec = QuadratureDecoder::new(20);
        // Anticlockwise from zero wraps to cpr - 1
        dec.on_edge(Phase::B, true, false);
        assert_eq!(dec.count(), 79);
    }

    #[test]
    fn test_debouncer_rejects_glitches() {
        let mut db = Debouncer::new(false, 10);
        assert!(!db.update(true, 100)); // Change seen, not yet stable
        assert!(!db.update(false, 105)); // Bounced back within the window
        assert!(!db.update(false, 120));
        // Now a real press held past the interval
        db.update(true, 200);
        assert!(!db.state());
        assert!(db.update(true, 211));
    }
}
