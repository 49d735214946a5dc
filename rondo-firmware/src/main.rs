//! Rondo - USB media knob firmware
//!
//! Firmware binary for RP2040-based knob hardware: a quadrature encoder
//! with pushbutton and a 24-pixel ws2812 ring. Talks the shared Rondo
//! protocol to the desktop host over the chip's native USB CDC serial
//! interface.
//!
//! All gesture and display logic lives in `rondo-core`; this binary only
//! wires pins, the USB stack and the PIO LED driver to it.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Pull};
use embassy_rp::peripherals::{PIO0, USB};
use embassy_rp::pio::{InterruptHandler as PioInterruptHandler, Pio};
use embassy_rp::pio_programs::ws2812::{PioWs2812, PioWs2812Program};
use embassy_rp::usb::{Driver, InterruptHandler as UsbInterruptHandler};
use embassy_usb::class::cdc_acm::{CdcAcmClass, State};
use embassy_usb::Builder;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use rondo_protocol::{USB_PID, USB_VID};

mod channels;
mod stream;
mod tasks;

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => PioInterruptHandler<PIO0>;
    USBCTRL_IRQ => UsbInterruptHandler<USB>;
});

// Descriptor and control buffers outlive main so the USB tasks can own them
static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();
static CDC_STATE: StaticCell<State<'static>> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Rondo firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // CDC serial to the host on the chip's native USB controller. The
    // VID/PID pair here is what host-side discovery filters ports by.
    let driver = Driver::new(p.USB, Irqs);
    let mut usb_config = embassy_usb::Config::new(USB_VID, USB_PID);
    usb_config.manufacturer = Some("Rondo");
    usb_config.product = Some("Rondo media knob");
    usb_config.serial_number = Some("rondo-0001");
    usb_config.max_power = 100;
    usb_config.max_packet_size_0 = 64;

    let mut builder = Builder::new(
        driver,
        usb_config,
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        &mut [],
        CONTROL_BUF.init([0; 64]),
    );
    let cdc = CdcAcmClass::new(&mut builder, CDC_STATE.init(State::new()), 64);
    let usb = builder.build();
    let (usb_tx, usb_rx) = cdc.split();

    // Encoder phase pins and switch, all active low on pull-ups
    let phase_a = Input::new(p.PIN_2, Pull::Up);
    let phase_b = Input::new(p.PIN_3, Pull::Up);
    let switch = Input::new(p.PIN_4, Pull::Up);

    // LED ring data line driven by PIO0 + DMA
    let Pio {
        mut common, sm0, ..
    } = Pio::new(p.PIO0, Irqs);
    let program = PioWs2812Program::new(&mut common);
    let ws2812 = PioWs2812::new(&mut common, sm0, p.DMA_CH0, p.PIN_5, &program);

    info!("USB and LED ring initialized");

    spawner.spawn(tasks::usb_task(usb)).unwrap();
    spawner.spawn(tasks::usb_rx_task(usb_rx)).unwrap();
    spawner.spawn(tasks::usb_tx_task(usb_tx)).unwrap();
    spawner.spawn(tasks::encoder_task(phase_a, phase_b)).unwrap();
    spawner.spawn(tasks::control_task(ws2812, switch)).unwrap();

    info!("All tasks spawned, firmware running");

    // Main task has nothing else to do - all work happens in spawned tasks
    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}
