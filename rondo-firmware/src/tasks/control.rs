//! Main control task
//!
//! One strictly sequential loop per tick: drain the serial link, render
//! the ring, then step the state machine. A fatal link error (lost
//! framing, registry desync, transport loss) ends the loop in the fault
//! display, matching the device's only way of reporting problems.

use defmt::*;
use embassy_rp::gpio::Input;
use embassy_rp::peripherals::PIO0;
use embassy_rp::pio_programs::ws2812::PioWs2812;
use embassy_time::{Duration, Instant, Ticker, Timer};
use heapless::Vec;
use portable_atomic::Ordering;
use smart_leds::RGB8;

use rondo_core::config::{
    ALERT_COLOUR, LED_BRIGHTNESS, PIXEL_COUNT, PIXEL_OFFSET, STARTUP_ANIMATION_FADE_LEN,
    STARTUP_COLOUR, SWITCH_DEBOUNCE_MS, TICK_INTERVAL_MS,
};
use rondo_core::encoder::{Debouncer, EncoderSnapshot};
use rondo_core::fault::FaultKind;
use rondo_core::ring::{LedRing, Rgb};
use rondo_core::state::{Action, LedOp, Machine};
use rondo_protocol::{level, Message, SerialLink};

use crate::channels::ENCODER_COUNT;
use crate::stream::UsbStream;

type Ring = LedRing<PIXEL_COUNT>;
type Leds = PioWs2812<'static, PIO0, 0, PIXEL_COUNT>;
type Link = SerialLink<UsbStream>;

/// Inbound messages buffered within one tick
const INBOUND_DEPTH: usize = 8;

#[embassy_executor::task]
pub async fn control_task(mut leds: Leds, switch: Input<'static>) {
    let mut link = Link::new(UsbStream::new());
    let mut machine = Machine::new();
    let mut ring: Ring = LedRing::new(PIXEL_OFFSET, LED_BRIGHTNESS);
    let mut debouncer = Debouncer::new(false, SWITCH_DEBOUNCE_MS);
    let mut ticker = Ticker::every(Duration::from_millis(TICK_INTERVAL_MS as u64));

    info!("Control task started");

    loop {
        ticker.next().await;
        let now = Instant::now().as_millis() as u32;

        // Switch is active low on its pull-up
        let pressed = debouncer.update(switch.is_low(), now);
        let snap = EncoderSnapshot {
            count: ENCODER_COUNT.load(Ordering::Relaxed),
            pressed,
        };

        let mut inbound: Vec<Message, INBOUND_DEPTH> = Vec::new();
        if let Err(e) = link.update(&mut |msg: Message| {
            if inbound.push(msg).is_err() {
                warn!("Inbound message dropped, tick backlog full");
            }
        }) {
            error!("Link failure: {}", e);
            fail(&mut ring, &mut leds, &mut link, FaultKind::from_link_error(&e)).await;
        }

        let mut ok = true;
        for msg in inbound {
            for action in machine.on_message(msg, snap, now) {
                ok &= perform(&mut link, &mut ring, now, action);
            }
        }

        // Message reactions land on the ring this tick; whatever the
        // machine step below produces shows next tick
        render(&mut ring, &mut leds, now).await;

        for action in machine.tick(snap, now) {
            ok &= perform(&mut link, &mut ring, now, action);
        }

        if !ok {
            fail(&mut ring, &mut leds, &mut link, FaultKind::SerialIo).await;
        }
    }
}

/// Apply one state machine action, reporting write success
fn perform(link: &mut Link, ring: &mut Ring, now: u32, action: Action) -> bool {
    match action {
        Action::Send(msg) => match link.send(&msg) {
            Ok(()) => true,
            Err(e) => {
                error!("Send failed: {}", e);
                false
            }
        },
        Action::Led(op) => {
            apply_led(ring, now, op);
            true
        }
    }
}

fn apply_led(ring: &mut Ring, now: u32, op: LedOp) {
    match op {
        LedOp::Clear => ring.clear(),
        LedOp::Solid(colour) => ring.set_all(colour),
        LedOp::Fraction { fraction, colour } => ring.display_fraction(fraction, colour, 1.0),
        LedOp::Direction { magnitude, hue, sat } => ring.display_direction(magnitude, hue, sat),
        LedOp::Spinner { phase } => {
            ring.display_spinner(phase, STARTUP_COLOUR, STARTUP_ANIMATION_FADE_LEN)
        }
        LedOp::Level(level) => ring.display_level(level),
        LedOp::SpectrumBars { left, right } => ring.display_spectrum(&left, &right),
        LedOp::Crossfade { duration_ms } => ring.start_crossfade(now, duration_ms),
    }
}

/// Push the blended frame out through the PIO driver
async fn render(ring: &mut Ring, leds: &mut Leds, now: u32) {
    let mut out = [Rgb::default(); PIXEL_COUNT];
    ring.render(now, &mut out);

    let mut frame = [RGB8::default(); PIXEL_COUNT];
    for (dst, src) in frame.iter_mut().zip(out.iter()) {
        *dst = RGB8::new(src.r, src.g, src.b);
    }
    leds.write(&frame).await;
}

/// Terminal fault display: solid alert colour, then the fault code as a
/// bit pattern. The device stays here until power-cycled, the same
/// end-state as an unhandled crash.
async fn fail(ring: &mut Ring, leds: &mut Leds, link: &mut Link, kind: FaultKind) -> ! {
    // Best effort; the link may be the thing that failed
    let _ = link.send(&Message::log(level::CRITICAL, "device fault, see ring pattern"));

    ring.set_all(ALERT_COLOUR);
    render(ring, leds, 0).await;
    Timer::after_secs(1).await;

    ring.display_bytes(&[kind.code()]);
    render(ring, leds, 0).await;

    loop {
        error!("Halted on fault {:?}, code {}", kind, kind.code());
        Timer::after_secs(60).await;
    }
}
