//! Message types for the Rondo protocol
//!
//! Every message has a fixed payload size known at compile time. Normalised
//! floats (volume, VU levels, spectrum bins) are quantised to a single byte;
//! the 8-bit loss is an accepted part of the contract, round trips are only
//! exact for multiples of 1/255.

use heapless::{String, Vec};

/// Number of frequency bins per channel in a `Spectrum` message.
pub const SPECTRUM_BINS: usize = 12;

/// Maximum UTF-8 text bytes in a `Log` message.
pub const LOG_TEXT_BYTES: usize = 62;

/// `Log` payload: 1 level byte + space-padded text.
pub const LOG_PAYLOAD_BYTES: usize = 1 + LOG_TEXT_BYTES;

/// Largest payload of any registered message type.
pub const MAX_PAYLOAD_SIZE: usize = LOG_PAYLOAD_BYTES;

/// Largest complete message (type id + payload).
pub const MAX_MESSAGE_SIZE: usize = 1 + MAX_PAYLOAD_SIZE;

/// Errors raised while constructing, encoding or decoding messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// Type id outside the registry range - the endpoints' registries are
    /// out of sync and framing can no longer be trusted
    UnknownType(u8),
    /// Fewer payload bytes supplied than the type requires
    Truncated { expected: usize, got: usize },
    /// Numeric input outside its valid range at message construction
    InvalidValue,
}

impl core::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ProtocolError::UnknownType(id) => write!(f, "unknown message type id {}", id),
            ProtocolError::Truncated { expected, got } => {
                write!(f, "truncated payload: expected {} byte(s), got {}", expected, got)
            }
            ProtocolError::InvalidValue => write!(f, "value out of range"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ProtocolError {}

/// Message type identifiers.
///
/// Declared in wire order: the discriminant of each variant is its type id,
/// and [`REGISTRY`] mirrors the same ordering. Appending new types at the
/// end is safe; reordering or removing entries is a silent protocol break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MessageKind {
    VolumeRequest = 0,
    Volume = 1,
    TogglePlayback = 2,
    PlaybackStatus = 3,
    Skip = 4,
    Vu = 5,
    Spectrum = 6,
    Like = 7,
    LikeStatus = 8,
    Disconnect = 9,
    Exit = 10,
    Log = 11,
    Identify = 12,
}

/// The shared message registry. Index = wire type id.
pub const REGISTRY: [MessageKind; 13] = [
    MessageKind::VolumeRequest,
    MessageKind::Volume,
    MessageKind::TogglePlayback,
    MessageKind::PlaybackStatus,
    MessageKind::Skip,
    MessageKind::Vu,
    MessageKind::Spectrum,
    MessageKind::Like,
    MessageKind::LikeStatus,
    MessageKind::Disconnect,
    MessageKind::Exit,
    MessageKind::Log,
    MessageKind::Identify,
];

impl MessageKind {
    /// Look up a message kind from its wire type id
    pub fn from_id(id: u8) -> Option<Self> {
        REGISTRY.get(id as usize).copied()
    }

    /// Wire type id of this kind
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Fixed payload size in bytes (excluding the type id)
    pub const fn payload_len(self) -> usize {
        match self {
            MessageKind::VolumeRequest => 0,
            MessageKind::Volume => 1,
            MessageKind::TogglePlayback => 0,
            MessageKind::PlaybackStatus => 1,
            MessageKind::Skip => 1,
            MessageKind::Vu => 2,
            MessageKind::Spectrum => SPECTRUM_BINS * 2,
            MessageKind::Like => 0,
            MessageKind::LikeStatus => 1,
            MessageKind::Disconnect => 0,
            MessageKind::Exit => 0,
            MessageKind::Log => LOG_PAYLOAD_BYTES,
            MessageKind::Identify => 1,
        }
    }
}

/// One unit of the protocol vocabulary
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Message {
    /// Device asks the host for the current system volume
    VolumeRequest,
    /// Current volume level, normalised to [0, 1]
    Volume { level: f32 },
    /// Device requests a play/pause toggle
    TogglePlayback,
    /// Host reports the current play/pause status
    PlaybackStatus { playing: bool },
    /// Device requests a track skip
    Skip { forward: bool },
    /// Stereo VU levels, normalised to [0, 1]
    Vu { left: f32, right: f32 },
    /// Stereo frequency spectrum, one normalised value per bin
    Spectrum {
        left: [f32; SPECTRUM_BINS],
        right: [f32; SPECTRUM_BINS],
    },
    /// Device requests a like/unlike of the current track
    Like,
    /// Host reports whether the current track is now liked
    LikeStatus { liked: bool },
    /// Host is closing the session; device should return to startup
    Disconnect,
    /// Host process is exiting
    Exit,
    /// Device-side log line relayed to the host logger
    Log { level: u8, text: String<LOG_TEXT_BYTES> },
    /// Device announces itself during discovery
    Identify { device_type: u8 },
}

/// Quantise a normalised float to a byte. Exact for multiples of 1/255.
pub fn quantize_unit(x: f32) -> u8 {
    let clamped = if x < 0.0 {
        0.0
    } else if x > 1.0 {
        1.0
    } else {
        x
    };
    (clamped * 255.0 + 0.5) as u8
}

/// Reverse of [`quantize_unit`]
pub fn dequantize_unit(b: u8) -> f32 {
    b as f32 / 255.0
}

fn check_unit(x: f32) -> Result<f32, ProtocolError> {
    if (0.0..=1.0).contains(&x) {
        Ok(x)
    } else {
        Err(ProtocolError::InvalidValue)
    }
}

impl Message {
    /// Build a `Volume` message, rejecting levels outside [0, 1]
    pub fn volume(level: f32) -> Result<Self, ProtocolError> {
        Ok(Message::Volume { level: check_unit(level)? })
    }

    /// Build a `Vu` message, rejecting levels outside [0, 1]
    pub fn vu(left: f32, right: f32) -> Result<Self, ProtocolError> {
        Ok(Message::Vu {
            left: check_unit(left)?,
            right: check_unit(right)?,
        })
    }

    /// Build a `Spectrum` message, rejecting bins outside [0, 1]
    pub fn spectrum(
        left: [f32; SPECTRUM_BINS],
        right: [f32; SPECTRUM_BINS],
    ) -> Result<Self, ProtocolError> {
        for v in left.iter().chain(right.iter()) {
            check_unit(*v)?;
        }
        Ok(Message::Spectrum { left, right })
    }

    /// Build a `Log` message. Text longer than 62 bytes is truncated at a
    /// character boundary; shorter text is space-padded on the wire, which
    /// means trailing real spaces are unrecoverably lost on decode.
    pub fn log(level: u8, text: &str) -> Self {
        let mut end = text.len().min(LOG_TEXT_BYTES);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        let mut truncated = String::new();
        // Cannot fail: end <= LOG_TEXT_BYTES and lands on a char boundary
        let _ = truncated.push_str(&text[..end]);
        Message::Log { level, text: truncated }
    }

    /// Message kind (and thus wire type id) of this message
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::VolumeRequest => MessageKind::VolumeRequest,
            Message::Volume { .. } => MessageKind::Volume,
            Message::TogglePlayback => MessageKind::TogglePlayback,
            Message::PlaybackStatus { .. } => MessageKind::PlaybackStatus,
            Message::Skip { .. } => MessageKind::Skip,
            Message::Vu { .. } => MessageKind::Vu,
            Message::Spectrum { .. } => MessageKind::Spectrum,
            Message::Like => MessageKind::Like,
            Message::LikeStatus { .. } => MessageKind::LikeStatus,
            Message::Disconnect => MessageKind::Disconnect,
            Message::Exit => MessageKind::Exit,
            Message::Log { .. } => MessageKind::Log,
            Message::Identify { .. } => MessageKind::Identify,
        }
    }

    /// Encode this message as `[type id] ++ payload`.
    ///
    /// Payload length always equals `self.kind().payload_len()`. Floats are
    /// clamped on the way out; validated constructors mean clamping only
    /// matters for messages built with out-of-range literals.
    pub fn encode(&self) -> Vec<u8, MAX_MESSAGE_SIZE> {
        let mut out = Vec::new();
        // Infallible: MAX_MESSAGE_SIZE covers the largest registered type
        let _ = out.push(self.kind().id());
        match self {
            Message::VolumeRequest
            | Message::TogglePlayback
            | Message::Like
            | Message::Disconnect
            | Message::Exit => {}
            Message::Volume { level } => {
                let _ = out.push(quantize_unit(*level));
            }
            Message::PlaybackStatus { playing } => {
                let _ = out.push(*playing as u8);
            }
            Message::Skip { forward } => {
                let _ = out.push(*forward as u8);
            }
            Message::Vu { left, right } => {
                let _ = out.push(quantize_unit(*left));
                let _ = out.push(quantize_unit(*right));
            }
            Message::Spectrum { left, right } => {
                for v in left.iter().chain(right.iter()) {
                    let _ = out.push(quantize_unit(*v));
                }
            }
            Message::LikeStatus { liked } => {
                let _ = out.push(*liked as u8);
            }
            Message::Log { level, text } => {
                let _ = out.push(*level);
                let _ = out.extend_from_slice(text.as_bytes());
                for _ in text.len()..LOG_TEXT_BYTES {
                    let _ = out.push(b' ');
                }
            }
            Message::Identify { device_type } => {
                let _ = out.push(*device_type);
            }
        }
        out
    }

    /// Decode a message from its type id and payload bytes
    pub fn decode(id: u8, payload: &[u8]) -> Result<Self, ProtocolError> {
        let kind = MessageKind::from_id(id).ok_or(ProtocolError::UnknownType(id))?;
        let expected = kind.payload_len();
        if payload.len() < expected {
            return Err(ProtocolError::Truncated { expected, got: payload.len() });
        }

        Ok(match kind {
            MessageKind::VolumeRequest => Message::VolumeRequest,
            MessageKind::Volume => Message::Volume { level: dequantize_unit(payload[0]) },
            MessageKind::TogglePlayback => Message::TogglePlayback,
            MessageKind::PlaybackStatus => Message::PlaybackStatus { playing: payload[0] != 0 },
            MessageKind::Skip => Message::Skip { forward: payload[0] != 0 },
            MessageKind::Vu => Message::Vu {
                left: dequantize_unit(payload[0]),
                right: dequantize_unit(payload[1]),
            },
            MessageKind::Spectrum => {
                let mut left = [0.0; SPECTRUM_BINS];
                let mut right = [0.0; SPECTRUM_BINS];
                for (i, v) in left.iter_mut().enumerate() {
                    *v = dequantize_unit(payload[i]);
                }
                for (i, v) in right.iter_mut().enumerate() {
                    *v = dequantize_unit(payload[SPECTRUM_BINS + i]);
                }
                Message::Spectrum { left, right }
            }
            MessageKind::Like => Message::Like,
            MessageKind::LikeStatus => Message::LikeStatus { liked: payload[0] != 0 },
            MessageKind::Disconnect => Message::Disconnect,
            MessageKind::Exit => Message::Exit,
            MessageKind::Log => {
                let level = payload[0];
                let mut raw = &payload[1..LOG_PAYLOAD_BYTES];
                while let [rest @ .., b' '] = raw {
                    raw = rest;
                }
                let text = core::str::from_utf8(raw).map_err(|_| ProtocolError::InvalidValue)?;
                let mut s = String::new();
                s.push_str(text).map_err(|_| ProtocolError::InvalidValue)?;
                Message::Log { level, text: s }
            }
            MessageKind::Identify => Message::Identify { device_type: payload[0] },
        })
    }
}


#[cfg(test)]
mod props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn volume_roundtrip_within_quantisation_bound(f in 0.0f32..=1.0) {
            let bytes = Message::volume(f).unwrap().encode();
            let decoded = Message::decode(bytes[0], &bytes[1..]).unwrap();
            if let Message::Volume { level } = decoded {
                prop_assert!((level - f).abs() <= 1.0 / 255.0);
            } else {
                prop_assert!(false, "wrong variant");
            }
        }

        #[test]
        fn spectrum_roundtrip_within_quantisation_bound(
            left in proptest::array::uniform12(0.0f32..=1.0),
            right in proptest::array::uniform12(0.0f32..=1.0),
        ) {
            let bytes = Message::spectrum(left, right).unwrap().encode();
            let decoded = Message::decode(bytes[0], &bytes[1..]).unwrap();
            if let Message::Spectrum { left: dl, right: dr } = decoded {
                for (a, b) in left.iter().zip(dl.iter()) {
                    prop_assert!((a - b).abs() <= 1.0 / 255.0);
                }
                for (a, b) in right.iter().zip(dr.iter()) {
                    prop_assert!((a - b).abs() <= 1.0 / 255.0);
                }
            } else {
                prop_assert!(false, "wrong variant");
            }
        }
    }
}
