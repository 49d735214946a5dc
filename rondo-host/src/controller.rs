//! Message dispatch for a live session
//!
//! The controller is the host's [`MessageSink`]: it turns device messages
//! into audio/media calls and queues any replies in an outbox for the
//! session loop to flush. Kinds the host never receives (its own
//! host-to-device messages echoed back) are dropped silently.

use log::{log, warn, Level};

use rondo_protocol::{level, Message, MessageSink};

use crate::audio::AudioEndpoint;
use crate::media::{MediaReply, MediaRequest, MediaWorker};

pub struct Controller<A: AudioEndpoint> {
    audio: A,
    media: MediaWorker,
    outbox: Vec<Message>,
}

impl<A: AudioEndpoint> Controller<A> {
    pub fn new(audio: A, media: MediaWorker) -> Self {
        Self {
            audio,
            media,
            outbox: Vec::new(),
        }
    }

    /// Collect finished media operations into outbound status messages
    pub fn poll_media(&mut self) {
        while let Some(reply) = self.media.try_recv() {
            let msg = match reply {
                MediaReply::Playing(playing) => Message::PlaybackStatus { playing },
                MediaReply::Liked(liked) => Message::LikeStatus { liked },
            };
            self.outbox.push(msg);
        }
    }

    /// Take everything queued for the device
    pub fn drain_outbox(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.outbox)
    }
}

impl<A: AudioEndpoint> MessageSink for Controller<A> {
    fn on_message(&mut self, msg: Message) {
        match msg {
            Message::VolumeRequest => match self.audio.volume() {
                Ok(v) => match Message::volume(v) {
                    Ok(reply) => self.outbox.push(reply),
                    Err(e) => warn!("Audio endpoint returned bad volume: {}", e),
                },
                Err(e) => warn!("Volume query failed: {:#}", e),
            },

            Message::Volume { level } => {
                if let Err(e) = self.audio.set_volume(level) {
                    warn!("Setting volume failed: {:#}", e);
                }
            }

            Message::TogglePlayback => self.media.request(MediaRequest::TogglePlayback),
            Message::Skip { forward } => self.media.request(MediaRequest::Skip { forward }),
            Message::Like => self.media.request(MediaRequest::Like),

            Message::Log { level, text } => {
                log!(device_log_level(level), "[device] {}", text.trim_end());
            }

            // Stray broadcast from a device that hasn't noticed us yet
            Message::Identify { .. } => {}

            _ => {}
        }
    }
}

/// Map the wire log level byte onto the host logging facade
fn device_log_level(byte: u8) -> Level {
    match byte {
        level::ERROR.. => Level::Error,
        level::WARNING..level::ERROR => Level::Warn,
        level::INFO..level::WARNING => Level::Info,
        level::DEBUG..level::INFO => Level::Debug,
        _ => Level::Trace,
    }
}
