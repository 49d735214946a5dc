//! Device state machine
//!
//! Gesture interpretation for the knob: short press toggles playback, a
//! long hold likes the current track, turning adjusts volume, turning
//! while pressed skips. The machine is a pure sum type plus transition
//! function; every effect comes back to the caller as an [`Action`], so
//! the whole thing runs and tests without hardware.
//!
//! State changes mostly happen on receipt of host messages rather than
//! from within tick logic, which is why [`Machine::on_message`] exists
//! alongside [`Machine::tick`].

use heapless::Vec;
use rondo_protocol::{Message, DEVICE_TYPE_TAG, SPECTRUM_BINS};

use crate::config::*;
use crate::encoder::{encoder_delta, EncoderSnapshot};
use crate::ring::Hsv;

/// Upper bound on actions emitted by a single tick or message
pub const MAX_ACTIONS: usize = 8;

pub type Actions = Vec<Action, MAX_ACTIONS>;

/// LED ring command, interpreted by the firmware's render step
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedOp {
    Clear,
    Solid(Hsv),
    Fraction { fraction: f32, colour: Hsv },
    Direction { magnitude: f32, hue: u16, sat: u8 },
    Spinner { phase: f32 },
    Level(f32),
    SpectrumBars {
        left: [f32; SPECTRUM_BINS],
        right: [f32; SPECTRUM_BINS],
    },
    Crossfade { duration_ms: u32 },
}

/// One effect requested by the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Send(Message),
    Led(LedOp),
}

/// Device states. Timer fields are absolute tick timestamps in ms.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceState {
    /// Waiting for a host; broadcasts `Identify` and spins the ring
    Startup { last_identify_ms: u32 },
    /// Knob at rest, not pressed
    Idle { baseline: u16 },
    /// Volume display active, rotation adjusts the level
    VolumeAdjust {
        volume: f32,
        prev_count: u16,
        idle_since_ms: u32,
    },
    /// Button down, waiting to see which gesture this becomes
    Pressed {
        pressed_at_ms: u32,
        baseline: u16,
        like_sent: bool,
    },
    /// Turning while pressed; release commits the skip
    Skipping { baseline: u16 },
    /// Track was un-liked; play the removal animation out
    UnlikeAnimation { started_ms: u32 },
}

pub struct Machine {
    state: DeviceState,
    playing: bool,
}

impl Machine {
    pub fn new() -> Self {
        Self {
            state: DeviceState::Startup { last_identify_ms: 0 },
            playing: false,
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Run one control-loop tick
    pub fn tick(&mut self, snap: EncoderSnapshot, now_ms: u32) -> Actions {
        let mut actions = Actions::new();

        match self.state.clone() {
            DeviceState::Startup { last_identify_ms } => {
                let phase = (now_ms % STARTUP_ANIMATION_PERIOD_MS) as f32
                    / STARTUP_ANIMATION_PERIOD_MS as f32;
                emit(&mut actions, Action::Led(LedOp::Spinner { phase }));

                if now_ms.wrapping_sub(last_identify_ms) >= IDENTIFY_PERIOD_MS {
                    emit(
                        &mut actions,
                        Action::Send(Message::Identify {
                            device_type: DEVICE_TYPE_TAG,
                        }),
                    );
                    self.state = DeviceState::Startup {
                        last_identify_ms: now_ms,
                    };
                }
            }

            DeviceState::Idle { baseline } => {
                if snap.pressed {
                    self.transition(
                        DeviceState::Pressed {
                            pressed_at_ms: now_ms,
                            baseline: snap.count,
                            like_sent: false,
                        },
                        &mut actions,
                    );
                    return actions;
                }

                let delta = encoder_delta(baseline, snap.count, ENCODER_CPR);
                if delta.abs() > ENCODER_DEADZONE {
                    // Ask the host where the volume currently sits; the
                    // Volume reply moves us to VolumeAdjust, not this tick
                    emit(&mut actions, Action::Send(Message::VolumeRequest));
                }
            }

            DeviceState::VolumeAdjust {
                mut volume,
                prev_count,
                idle_since_ms,
            } => {
                if snap.pressed {
                    self.transition(
                        DeviceState::Pressed {
                            pressed_at_ms: now_ms,
                            baseline: snap.count,
                            like_sent: false,
                        },
                        &mut actions,
                    );
                    return actions;
                }

                if snap.count == prev_count {
                    if now_ms.wrapping_sub(idle_since_ms) >= VOL_DISPLAY_HOLD_MS {
                        emit(
                            &mut actions,
                            Action::Led(LedOp::Crossfade {
                                duration_ms: LED_TRANSITION_MS,
                            }),
                        );
                        self.transition(
                            DeviceState::Idle {
                                baseline: snap.count,
                            },
                            &mut actions,
                        );
                    }
                    return actions;
                }

                let delta = encoder_delta(prev_count, snap.count, ENCODER_CPR);
                let prev_volume = volume;
                volume = (volume + delta as f32 / ENCODER_CPR as f32).clamp(0.0, 1.0);

                // Clamping can leave the level unchanged; don't resend
                if volume != prev_volume {
                    emit(
                        &mut actions,
                        Action::Send(Message::Volume { level: volume }),
                    );
                    emit(
                        &mut actions,
                        Action::Led(LedOp::Fraction {
                            fraction: volume,
                            colour: VOLUME_COLOUR,
                        }),
                    );
                }

                self.state = DeviceState::VolumeAdjust {
                    volume,
                    prev_count: snap.count,
                    idle_since_ms: now_ms,
                };
            }

            DeviceState::Pressed {
                pressed_at_ms,
                baseline,
                like_sent,
            } => {
                let held = now_ms.wrapping_sub(pressed_at_ms) >= LIKE_HOLD_MS;

                if !snap.pressed {
                    if !held {
                        emit(&mut actions, Action::Led(LedOp::Solid(PLAY_PAUSE_COLOUR)));
                        emit(
                            &mut actions,
                            Action::Led(LedOp::Crossfade {
                                duration_ms: LED_TRANSITION_MS,
                            }),
                        );
                        emit(&mut actions, Action::Send(Message::TogglePlayback));
                    }
                    self.transition(
                        DeviceState::Idle {
                            baseline: snap.count,
                        },
                        &mut actions,
                    );
                    return actions;
                }

                // Like fires as soon as the hold time elapses, not on
                // release, so the user gets feedback while still holding
                if held && !like_sent {
                    emit(&mut actions, Action::Send(Message::Like));
                    self.state = DeviceState::Pressed {
                        pressed_at_ms,
                        baseline,
                        like_sent: true,
                    };
                }

                if encoder_delta(baseline, snap.count, ENCODER_CPR).abs() > ENCODER_DEADZONE {
                    self.transition(DeviceState::Skipping { baseline }, &mut actions);
                }
            }

            DeviceState::Skipping { baseline } => {
                let delta = encoder_delta(baseline, snap.count, ENCODER_CPR);
                emit(
                    &mut actions,
                    Action::Led(LedOp::Direction {
                        magnitude: delta as f32 / ENCODER_PPR as f32,
                        hue: SKIP_HUE,
                        sat: SKIP_SAT,
                    }),
                );

                if !snap.pressed {
                    if delta.abs() > ENCODER_DEADZONE {
                        emit(
                            &mut actions,
                            Action::Send(Message::Skip { forward: delta > 0 }),
                        );
                        // White flash of the indicator before fading out
                        emit(
                            &mut actions,
                            Action::Led(LedOp::Direction {
                                magnitude: if delta > 0 { 2.5 } else { -2.5 },
                                hue: 0,
                                sat: 0,
                            }),
                        );
                    }
                    emit(
                        &mut actions,
                        Action::Led(LedOp::Crossfade {
                            duration_ms: LED_TRANSITION_MS,
                        }),
                    );
                    self.transition(
                        DeviceState::Idle {
                            baseline: snap.count,
                        },
                        &mut actions,
                    );
                }
            }

            DeviceState::UnlikeAnimation { started_ms } => {
                let elapsed = now_ms.wrapping_sub(started_ms);
                let progress = (elapsed as f32 / LED_ANIMATION_MS as f32).min(1.0);
                emit(
                    &mut actions,
                    Action::Led(LedOp::Fraction {
                        fraction: 1.0 - progress,
                        colour: UNLIKE_COLOUR,
                    }),
                );

                if elapsed >= LED_ANIMATION_MS && !snap.pressed {
                    emit(
                        &mut actions,
                        Action::Led(LedOp::Crossfade {
                            duration_ms: LED_TRANSITION_MS,
                        }),
                    );
                    self.transition(
                        DeviceState::Idle {
                            baseline: snap.count,
                        },
                        &mut actions,
                    );
                }
            }
        }

        actions
    }

    /// Handle one inbound host message
    pub fn on_message(&mut self, msg: Message, snap: EncoderSnapshot, now_ms: u32) -> Actions {
        let mut actions = Actions::new();

        // Any host traffic other than a session teardown proves a host is
        // on the other end, which is the cue to leave Startup
        if matches!(self.state, DeviceState::Startup { .. })
            && !matches!(msg, Message::Disconnect | Message::Exit)
        {
            self.transition(
                DeviceState::Idle {
                    baseline: snap.count,
                },
                &mut actions,
            );
        }

        match msg {
            Message::Volume { level } => {
                self.transition(
                    DeviceState::VolumeAdjust {
                        volume: level,
                        prev_count: snap.count,
                        idle_since_ms: now_ms,
                    },
                    &mut actions,
                );
            }

            Message::PlaybackStatus { playing } => {
                self.playing = playing;
            }

            Message::Vu { left, .. } => {
                if self.audio_display_active() {
                    emit(&mut actions, Action::Led(LedOp::Level(left)));
                }
            }

            Message::Spectrum { left, right } => {
                if self.audio_display_active() {
                    emit(&mut actions, Action::Led(LedOp::SpectrumBars { left, right }));
                }
            }

            Message::LikeStatus { liked } => {
                if matches!(self.state, DeviceState::Pressed { .. }) {
                    if liked {
                        emit(&mut actions, Action::Led(LedOp::Solid(LIKE_COLOUR)));
                        emit(
                            &mut actions,
                            Action::Led(LedOp::Crossfade {
                                duration_ms: LED_TRANSITION_MS,
                            }),
                        );
                    } else {
                        self.transition(
                            DeviceState::UnlikeAnimation { started_ms: now_ms },
                            &mut actions,
                        );
                    }
                }
            }

            Message::Disconnect | Message::Exit => {
                self.transition(
                    DeviceState::Startup {
                        last_identify_ms: now_ms,
                    },
                    &mut actions,
                );
            }

            // Device-to-host messages echoed back are ignored
            _ => {}
        }

        actions
    }

    fn audio_display_active(&self) -> bool {
        self.playing && matches!(self.state, DeviceState::Idle { .. })
    }

    /// Switch state, running the new state's entry effects. Re-entering
    /// the current variant is a no-op so in-flight timers survive.
    fn transition(&mut self, new: DeviceState, actions: &mut Actions) {
        if core::mem::discriminant(&new) == core::mem::discriminant(&self.state) {
            return;
        }

        match &new {
            DeviceState::Idle { .. } => {
                emit(actions, Action::Led(LedOp::Clear));
            }
            DeviceState::VolumeAdjust { volume, .. } => {
                emit(
                    actions,
                    Action::Led(LedOp::Crossfade {
                        duration_ms: LED_VOLUME_FADE_MS,
                    }),
                );
                emit(
                    actions,
                    Action::Led(LedOp::Fraction {
                        fraction: *volume,
                        colour: VOLUME_COLOUR,
                    }),
                );
            }
            _ => {}
        }

        self.state = new;
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

fn emit(actions: &mut Actions, action: Action) {
    let _ = actions.push(action);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(count: u16, pressed: bool) -> EncoderSnapshot {
        EncoderSnapshot { count, pressed }
    }

    fn sends(actions: &Actions) -> std::vec::Vec<Message> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Send(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    /// Machine driven past Startup into Idle
    fn idle_machine() -> Machine {
        let mut m = Machine::new();
        m.on_message(Message::PlaybackStatus { playing: false }, snap(0, false), 0);
        assert!(matches!(m.state(), DeviceState::Idle { .. }));
        m
    }

    #[test]
    fn test_startup_identify_cadence() {
        let mut m = Machine::new();
        assert_eq!(sends(&m.tick(snap(0, false), 40)), vec![]);
        assert_eq!(
            sends(&m.tick(snap(0, false), 1000)),
            vec![Message::Identify {
                device_type: DEVICE_TYPE_TAG
            }]
        );
        // Not again until another full period has passed
        assert_eq!(sends(&m.tick(snap(0, false), 1040)), vec![]);
        assert_eq!(
            sends(&m.tick(snap(0, false), 2000)),
            vec![Message::Identify {
                device_type: DEVICE_TYPE_TAG
            }]
        );
    }

    #[test]
    fn test_startup_renders_spinner() {
        let mut m = Machine::new();
        let actions = m.tick(snap(0, false), 40);
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::Led(LedOp::Spinner { .. }))));
    }

    #[test]
    fn test_first_host_message_leaves_startup() {
        let mut m = Machine::new();
        m.on_message(Message::PlaybackStatus { playing: true }, snap(5, false), 100);
        assert!(matches!(m.state(), DeviceState::Idle { .. }));
    }

    #[test]
    fn test_disconnect_returns_to_startup() {
        let mut m = idle_machine();
        m.on_message(Message::Disconnect, snap(0, false), 5000);
        assert!(matches!(m.state(), DeviceState::Startup { .. }));
        // A Disconnect arriving first thing must not count as a host cue
        let mut fresh = Machine::new();
        fresh.on_message(Message::Exit, snap(0, false), 100);
        assert!(matches!(fresh.state(), DeviceState::Startup { .. }));
    }

    #[test]
    fn test_press_enters_pressed() {
        let mut m = idle_machine();
        m.tick(snap(0, true), 100);
        assert!(matches!(m.state(), DeviceState::Pressed { .. }));
    }

    #[test]
    fn test_short_press_toggles_playback_once() {
        let mut m = idle_machine();
        m.tick(snap(0, true), 100);
        let actions = m.tick(snap(0, false), 300);
        assert_eq!(sends(&actions), vec![Message::TogglePlayback]);
        assert!(matches!(m.state(), DeviceState::Idle { .. }));
        // Subsequent idle ticks send nothing further
        assert_eq!(sends(&m.tick(snap(0, false), 340)), vec![]);
    }

    #[test]
    fn test_long_hold_likes_exactly_once() {
        let mut m = idle_machine();
        m.tick(snap(0, true), 100);
        let mut like_count = 0;
        // Hold for many ticks well past the threshold
        for t in (140..5000).step_by(40) {
            like_count += sends(&m.tick(snap(0, true), t))
                .iter()
                .filter(|msg| matches!(msg, Message::Like))
                .count();
        }
        assert_eq!(like_count, 1);
        // Release after a like: no TogglePlayback
        assert_eq!(sends(&m.tick(snap(0, false), 5000)), vec![]);
        assert!(matches!(m.state(), DeviceState::Idle { .. }));
    }

    #[test]
    fn test_rotation_while_pressed_skips() {
        let mut m = idle_machine();
        m.tick(snap(10, true), 100);
        m.tick(snap(16, true), 140); // 6 counts: past the deadzone
        assert!(matches!(m.state(), DeviceState::Skipping { .. }));

        let actions = m.tick(snap(16, false), 180);
        assert_eq!(sends(&actions), vec![Message::Skip { forward: true }]);
        assert!(matches!(m.state(), DeviceState::Idle { .. }));
    }

    #[test]
    fn test_backward_skip_crosses_wraparound() {
        let mut m = idle_machine();
        m.tick(snap(2, true), 100);
        // Anticlockwise across zero: 2 -> 76 is -6, not +74
        m.tick(snap(76, true), 140);
        let actions = m.tick(snap(76, false), 180);
        assert_eq!(sends(&actions), vec![Message::Skip { forward: false }]);
    }

    #[test]
    fn test_skip_release_inside_deadzone_sends_nothing() {
        let mut m = idle_machine();
        m.tick(snap(0, true), 100);
        m.tick(snap(6, true), 140);
        assert!(matches!(m.state(), DeviceState::Skipping { .. }));
        // Turned back before releasing
        let actions = m.tick(snap(1, false), 180);
        assert_eq!(sends(&actions), vec![]);
        assert!(matches!(m.state(), DeviceState::Idle { .. }));
    }

    #[test]
    fn test_idle_rotation_requests_volume() {
        let mut m = idle_machine();
        let actions = m.tick(snap(4, false), 100);
        assert_eq!(sends(&actions), vec![Message::VolumeRequest]);
        assert!(matches!(m.state(), DeviceState::Idle { .. }));
        // Within the deadzone nothing is sent
        let mut m = idle_machine();
        assert_eq!(sends(&m.tick(snap(3, false), 100)), vec![]);
    }

    #[test]
    fn test_volume_reply_enters_adjust_with_display() {
        let mut m = idle_machine();
        let actions = m.on_message(Message::Volume { level: 0.5 }, snap(0, false), 100);
        assert!(matches!(m.state(), DeviceState::VolumeAdjust { .. }));
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::Led(LedOp::Fraction { .. }))));
    }

    #[test]
    fn test_volume_adjust_sends_changed_levels_only() {
        let mut m = idle_machine();
        m.on_message(Message::Volume { level: 0.5 }, snap(0, false), 100);

        // 8 counts of 80 per revolution: +0.1
        let actions = m.tick(snap(8, false), 140);
        match sends(&actions).as_slice() {
            [Message::Volume { level }] => assert!((level - 0.6).abs() < 1e-6),
            other => panic!("unexpected sends: {other:?}"),
        }

        // Stationary knob resends nothing
        assert_eq!(sends(&m.tick(snap(8, false), 180)), vec![]);
    }

    #[test]
    fn test_volume_clamped_at_full_suppresses_resend() {
        let mut m = idle_machine();
        m.on_message(Message::Volume { level: 1.0 }, snap(0, false), 100);
        // Turning up from full: clamped, unchanged, nothing sent
        assert_eq!(sends(&m.tick(snap(8, false), 140)), vec![]);
    }

    #[test]
    fn test_volume_display_times_out_to_idle() {
        let mut m = idle_machine();
        m.on_message(Message::Volume { level: 0.5 }, snap(0, false), 100);
        m.tick(snap(0, false), 2000);
        assert!(matches!(m.state(), DeviceState::VolumeAdjust { .. }));
        let actions = m.tick(snap(0, false), 2140);
        assert!(matches!(m.state(), DeviceState::Idle { .. }));
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::Led(LedOp::Crossfade { .. }))));
    }

    #[test]
    fn test_repeated_volume_message_keeps_timer() {
        let mut m = idle_machine();
        m.on_message(Message::Volume { level: 0.5 }, snap(0, false), 100);
        // A second Volume while already adjusting must not reset anything
        m.on_message(Message::Volume { level: 0.9 }, snap(0, false), 1000);
        m.tick(snap(0, false), 2140);
        assert!(matches!(m.state(), DeviceState::Idle { .. }));
    }

    #[test]
    fn test_unlike_animation_plays_out() {
        let mut m = idle_machine();
        m.tick(snap(0, true), 100);
        m.on_message(Message::LikeStatus { liked: false }, snap(0, true), 200);
        assert!(matches!(m.state(), DeviceState::UnlikeAnimation { .. }));

        // Still animating, even though the button is already up
        m.tick(snap(0, false), 400);
        assert!(matches!(m.state(), DeviceState::UnlikeAnimation { .. }));
        // Elapsed but button still held: waits for release
        m.tick(snap(0, true), 900);
        assert!(matches!(m.state(), DeviceState::UnlikeAnimation { .. }));
        m.tick(snap(0, false), 940);
        assert!(matches!(m.state(), DeviceState::Idle { .. }));
    }

    #[test]
    fn test_like_status_liked_flashes_while_pressed() {
        let mut m = idle_machine();
        m.tick(snap(0, true), 100);
        let actions = m.on_message(Message::LikeStatus { liked: true }, snap(0, true), 1700);
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::Led(LedOp::Solid(c)) if *c == LIKE_COLOUR)));
        assert!(matches!(m.state(), DeviceState::Pressed { .. }));
        // The same reply while idle is ignored
        let mut m = idle_machine();
        let actions = m.on_message(Message::LikeStatus { liked: true }, snap(0, false), 100);
        assert!(actions.is_empty());
    }

    #[test]
    fn test_audio_feedback_gated_on_idle_and_playing() {
        let mut m = idle_machine();
        // Not playing: no display
        let actions = m.on_message(Message::Vu { left: 0.8, right: 0.7 }, snap(0, false), 100);
        assert!(actions.is_empty());

        m.on_message(Message::PlaybackStatus { playing: true }, snap(0, false), 140);
        let actions = m.on_message(Message::Vu { left: 0.8, right: 0.7 }, snap(0, false), 180);
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::Led(LedOp::Level(_)))));

        // Playing but mid-gesture: no display
        m.tick(snap(0, true), 220);
        let actions = m.on_message(Message::Vu { left: 0.8, right: 0.7 }, snap(0, true), 260);
        assert!(actions.is_empty());
    }
}
