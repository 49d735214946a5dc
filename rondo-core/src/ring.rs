//! LED ring rendering engine
//!
//! Holds a target frame of HSV pixels plus an optional in-flight crossfade
//! snapshot. All effects are expressed purely as target-frame writes; the
//! blended, gamma-corrected output frame is recomputed from
//! `(snapshot, target, progress)` on every render tick.
//!
//! Logical pixel index 0 is the reference point at the back of the device
//! and indices increase clockwise; [`LedRing::render`] remaps to the
//! physical wiring order and converts to the driver's GRB representation.

/// Lookup table for gamma-corrected 8-bit values, applied to the value
/// channel only. Compensates for perceptual nonlinearity and low-end PWM
/// quantisation.
/// https://learn.adafruit.com/led-tricks-gamma-correction/the-quick-fix
pub const GAMMA_LOOKUP: [u8; 256] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, //
    1, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, //
    2, 3, 3, 3, 3, 3, 3, 3, 4, 4, 4, 4, 4, 5, 5, 5, //
    5, 6, 6, 6, 6, 7, 7, 7, 7, 8, 8, 8, 9, 9, 9, 10, //
    10, 10, 11, 11, 11, 12, 12, 13, 13, 13, 14, 14, 15, 15, 16, 16, //
    17, 17, 18, 18, 19, 19, 20, 20, 21, 21, 22, 22, 23, 24, 24, 25, //
    25, 26, 27, 27, 28, 29, 29, 30, 31, 32, 32, 33, 34, 35, 35, 36, //
    37, 38, 39, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48, 49, 50, 50, //
    51, 52, 54, 55, 56, 57, 58, 59, 60, 61, 62, 63, 64, 66, 67, 68, //
    69, 70, 72, 73, 74, 75, 77, 78, 79, 81, 82, 83, 85, 86, 87, 89, //
    90, 92, 93, 95, 96, 98, 99, 101, 102, 104, 105, 107, 109, 110, 112, 114, //
    115, 117, 119, 120, 122, 124, 126, 127, 129, 131, 133, 135, 137, 138, 140, 142, //
    144, 146, 148, 150, 152, 154, 156, 158, 160, 162, 164, 167, 169, 171, 173, 175, //
    177, 180, 182, 184, 186, 189, 191, 193, 196, 198, 200, 203, 205, 208, 210, 213, //
    215, 218, 220, 223, 225, 228, 231, 233, 236, 239, 241, 244, 247, 249, 252, 255,
];

/// Colour in HSV space: hue 0-359, saturation and value 0-255
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hsv {
    pub h: u16,
    pub s: u8,
    pub v: u8,
}

pub const OFF: Hsv = Hsv { h: 0, s: 0, v: 0 };

impl Hsv {
    /// Same colour at the given value channel
    pub fn with_value(self, v: u8) -> Self {
        Hsv { v, ..self }
    }

    /// Same colour with value scaled by a [0, 1] factor
    pub fn scaled(self, factor: f32) -> Self {
        let f = clamp01(factor);
        Hsv {
            v: (self.v as f32 * f + 0.5) as u8,
            ..self
        }
    }
}

/// Colour in the driver's native RGB representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Integer HSV to RGB conversion
pub fn hsv_to_rgb(c: Hsv) -> Rgb {
    if c.s == 0 {
        return Rgb { r: c.v, g: c.v, b: c.v };
    }
    let h = (c.h % 360) as u32;
    let region = h / 60;
    let rem = h % 60;
    let v = c.v as u32;
    let s = c.s as u32;

    let p = v * (255 - s) / 255;
    let q = v * (255 * 60 - s * rem) / (255 * 60);
    let t = v * (255 * 60 - s * (60 - rem)) / (255 * 60);

    let (r, g, b) = match region {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    Rgb { r: r as u8, g: g as u8, b: b as u8 }
}

fn clamp01(x: f32) -> f32 {
    if x < 0.0 {
        0.0
    } else if x > 1.0 {
        1.0
    } else {
        x
    }
}

fn lerp_channel(a: u16, b: u16, f: f32) -> u16 {
    (a as f32 + (b as f32 - a as f32) * f + 0.5) as u16
}

fn blend(a: Hsv, b: Hsv, f: f32) -> Hsv {
    Hsv {
        h: lerp_channel(a.h, b.h, f),
        s: lerp_channel(a.s as u16, b.s as u16, f) as u8,
        v: lerp_channel(a.v as u16, b.v as u16, f) as u8,
    }
}

struct Transition<const N: usize> {
    snapshot: [Hsv; N],
    started_ms: u32,
    duration_ms: u32,
}

/// Rendering engine for one addressable LED ring
pub struct LedRing<const N: usize> {
    target: [Hsv; N],
    transition: Option<Transition<N>>,
    offset: usize,
    brightness: u8,
}

impl<const N: usize> LedRing<N> {
    /// `offset` is the physical index of logical pixel 0; `brightness`
    /// caps the overall output (0-255)
    pub fn new(offset: usize, brightness: u8) -> Self {
        Self {
            target: [OFF; N],
            transition: None,
            offset,
            brightness,
        }
    }

    /// Set one logical pixel in the target frame
    pub fn set_pixel(&mut self, index: usize, colour: Hsv) {
        if index < N {
            self.target[index] = colour;
        }
    }

    /// Fill the whole target frame
    pub fn set_all(&mut self, colour: Hsv) {
        self.target = [colour; N];
    }

    /// Turn every pixel off
    pub fn clear(&mut self) {
        self.set_all(OFF);
    }

    /// Begin a crossfade from the current target frame to whatever the
    /// target is subsequently changed to. Ignored if a transition is
    /// already in flight; there is no queue and no re-triggering.
    pub fn start_crossfade(&mut self, now_ms: u32, duration_ms: u32) {
        if self.transition.is_some() || duration_ms == 0 {
            return;
        }
        self.transition = Some(Transition {
            snapshot: self.target,
            started_ms: now_ms,
            duration_ms,
        });
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    /// Current logical output frame: the target, or the blend of the
    /// transition snapshot and the target by elapsed progress
    pub fn frame(&mut self, now_ms: u32) -> [Hsv; N] {
        if let Some(t) = &self.transition {
            let elapsed = now_ms.wrapping_sub(t.started_ms);
            if elapsed >= t.duration_ms {
                self.transition = None;
            } else {
                let f = elapsed as f32 / t.duration_ms as f32;
                let mut out = [OFF; N];
                for (i, px) in out.iter_mut().enumerate() {
                    *px = blend(t.snapshot[i], self.target[i], f);
                }
                return out;
            }
        }
        self.target
    }

    /// Produce the physical output frame: blended, gamma-corrected on the
    /// value channel, remapped to wiring order, brightness-capped RGB
    pub fn render(&mut self, now_ms: u32, out: &mut [Rgb; N]) {
        let frame = self.frame(now_ms);
        for (logical, px) in frame.iter().enumerate() {
            let corrected = px.with_value(GAMMA_LOOKUP[px.v as usize]);
            let rgb = hsv_to_rgb(corrected);
            let physical = (self.offset as i32 - logical as i32).rem_euclid(N as i32) as usize;
            out[physical] = Rgb {
                r: scale(rgb.r, self.brightness),
                g: scale(rgb.g, self.brightness),
                b: scale(rgb.b, self.brightness),
            };
        }
    }

    // Effects - all of these only write the target frame

    /// Light up a fraction of the ring clockwise from the back, with an
    /// antialiased boundary. Per-pixel brightness is
    /// `clamp(0, 1, 0.5 + (fraction*N - i) / smoothing)`.
    pub fn display_fraction(&mut self, fraction: f32, colour: Hsv, smoothing: f32) {
        let f = clamp01(fraction) * N as f32;
        for i in 0..N {
            let b = clamp01(0.5 + (f - i as f32) / smoothing);
            self.target[i] = colour.scaled(b);
        }
    }

    /// Directional indicator: brightness follows a downward parabola with
    /// roots at the two ends of one semicircle, scaled by the magnitude;
    /// positive magnitudes light the clockwise half, negative the other.
    pub fn display_direction(&mut self, magnitude: f32, hue: u16, sat: u8) {
        self.clear();
        let half = N / 2;
        let strength = if magnitude < 0.0 { -magnitude } else { magnitude };
        for k in 0..=half {
            let x = k as f32 / half as f32;
            let b = clamp01(4.0 * x * (1.0 - x) * strength);
            let index = if magnitude >= 0.0 { k } else { (N - k) % N };
            self.target[index] = Hsv { h: hue, s: sat, v: 255 }.scaled(b);
        }
    }

    /// Debug display of up to 3 raw bytes, one per colour channel, one bit
    /// per pixel. Zero bits are dim rather than off so byte boundaries stay
    /// visible against truly-off pixels.
    pub fn display_bytes(&mut self, bytes: &[u8]) {
        self.clear();
        for (n, val) in bytes.iter().take(3).enumerate() {
            let hue = [0u16, 120, 240][n];
            for bit in 0..8 {
                let index = n * 8 + bit;
                if index >= N {
                    return;
                }
                let v = if (val >> bit) & 1 == 1 { 255 } else { 10 };
                self.target[index] = Hsv { h: hue, s: 255, v };
            }
        }
    }

    /// Rotating startup spinner: a bright head with a linearly fading tail.
    /// `phase` is the animation position in [0, 1).
    pub fn display_spinner(&mut self, phase: f32, colour: Hsv, tail_len: usize) {
        self.clear();
        let head = (clamp01(phase) * N as f32) as i32;
        for t in 0..tail_len.min(N) {
            let index = (head - t as i32).rem_euclid(N as i32) as usize;
            let b = 1.0 - t as f32 / tail_len as f32;
            self.target[index] = colour.scaled(b);
        }
    }

    /// Audio level feedback: whole-ring colour shifting with intensity
    pub fn display_level(&mut self, level: f32) {
        let l = clamp01(level);
        self.set_all(Hsv {
            h: 240 - (l * 100.0) as u16,
            s: 255 - (l * 230.0) as u8,
            v: 200 + (l * 55.0) as u8,
        });
    }

    /// Stereo spectrum feedback: left channel bins run anticlockwise from
    /// the back, right channel bins clockwise. The two highest bins share
    /// the pixel opposite the back; the right channel wins it.
    pub fn display_spectrum(&mut self, left: &[f32], right: &[f32]) {
        for (i, v) in left.iter().enumerate().take(N / 2) {
            self.set_pixel(N - i - 1, spectrum_colour(i, *v));
        }
        for (i, v) in right.iter().enumerate().take(N / 2) {
            self.set_pixel(i + 1, spectrum_colour(i, *v));
        }
    }
}

fn spectrum_colour(bin: usize, value: f32) -> Hsv {
    let v = clamp01(value);
    Hsv {
        h: 280 - bin as u16 * 14 - (v * 100.0) as u16,
        s: 255 - (v * 180.0) as u8,
        v: 190 + (v * 65.0) as u8,
    }
}

fn scale(channel: u8, brightness: u8) -> u8 {
    (channel as u16 * brightness as u16 / 255) as u8
}
