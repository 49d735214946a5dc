//! Tunable constants for the knob firmware
//!
//! Pin assignments live in the firmware crate; everything here is
//! hardware-independent and shared with the core logic tests.

use crate::ring::Hsv;

// Encoder
/// Encoder pulses per revolution (1 pulse = 4 counts)
pub const ENCODER_PPR: u16 = 20;
/// Counts per revolution; the rotation counter wraps at this modulus
pub const ENCODER_CPR: u16 = ENCODER_PPR * 4;
/// Rotations of fewer than this many counts are ignored as noise
pub const ENCODER_DEADZONE: i16 = 3;
/// Stable time required before a switch level change is accepted
pub const SWITCH_DEBOUNCE_MS: u32 = 10;

// LED ring
/// Number of LEDs in the ring
pub const PIXEL_COUNT: usize = 24;
/// Physical index of the logical reference pixel (the one over the USB
/// port is last; indices increase clockwise from the back of the device)
pub const PIXEL_OFFSET: usize = 20;
/// Overall output brightness cap (out of 255)
pub const LED_BRIGHTNESS: u8 = 15;

// Control loop
/// Main loop tick period
pub const TICK_INTERVAL_MS: u32 = 40;
/// Time after the knob stops turning that the volume stays displayed
pub const VOL_DISPLAY_HOLD_MS: u32 = 2000;
/// Hold duration that turns a press into a like/unlike gesture
pub const LIKE_HOLD_MS: u32 = 1500;
/// Interval between `Identify` broadcasts while waiting for a host
pub const IDENTIFY_PERIOD_MS: u32 = 1000;

// Animations
/// Duration of LED crossfade transitions
pub const LED_TRANSITION_MS: u32 = 350;
/// Shorter fade used when snapping into the volume display
pub const LED_VOLUME_FADE_MS: u32 = 200;
/// Duration of one-shot animations (unlike, etc.)
pub const LED_ANIMATION_MS: u32 = 600;
/// Period of the startup spinner
pub const STARTUP_ANIMATION_PERIOD_MS: u32 = 1500;
/// Number of pixels in the startup spinner's fading tail
pub const STARTUP_ANIMATION_FADE_LEN: usize = 12;

// Colours
pub const STARTUP_COLOUR: Hsv = Hsv { h: 0, s: 0, v: 220 };
pub const VOLUME_COLOUR: Hsv = Hsv { h: 0, s: 0, v: 220 };
pub const PLAY_PAUSE_COLOUR: Hsv = Hsv { h: 0, s: 0, v: 255 };
pub const LIKE_COLOUR: Hsv = Hsv { h: 120, s: 219, v: 255 };
pub const UNLIKE_COLOUR: Hsv = Hsv { h: 120, s: 219, v: 200 };
pub const ALERT_COLOUR: Hsv = Hsv { h: 0, s: 255, v: 255 };
/// Hue/saturation of the skip direction indicator
pub const SKIP_HUE: u16 = 200;
pub const SKIP_SAT: u8 = 180;
