//! Encoder edge task
//!
//! Waits on edges from both phase pins and feeds them to the quadrature
//! decoder. The handler body is O(1) and never touches the serial link or
//! LED driver; the only output is the published atomic count.

use embassy_futures::select::{select, Either};
use embassy_rp::gpio::Input;
use portable_atomic::Ordering;

use rondo_core::config::ENCODER_PPR;
use rondo_core::encoder::{Phase, QuadratureDecoder};

use crate::channels::ENCODER_COUNT;

#[embassy_executor::task]
pub async fn encoder_task(mut phase_a: Input<'static>, mut phase_b: Input<'static>) {
    let mut decoder = QuadratureDecoder::new(ENCODER_PPR);

    loop {
        let phase = match select(phase_a.wait_for_any_edge(), phase_b.wait_for_any_edge()).await {
            Either::First(()) => Phase::A,
            Either::Second(()) => Phase::B,
        };

        // Sample both lines immediately; they may move again before the
        // next await
        decoder.on_edge(phase, phase_a.is_high(), phase_b.is_high());
        ENCODER_COUNT.store(decoder.count(), Ordering::Relaxed);
    }
}
