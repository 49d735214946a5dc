//! USB CDC transport tasks
//!
//! Three tasks own the USB side: the device task runs the stack itself,
//! the receive task copies host packets into the inbound pipe and the
//! transmit task flushes the outbound pipe. The control loop only ever
//! touches the pipes (through [`crate::stream::UsbStream`]), so a host
//! unplug never stalls a tick.

use defmt::*;
use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_usb::class::cdc_acm::{Receiver, Sender};
use embassy_usb::driver::EndpointError;
use embassy_usb::UsbDevice;

use crate::channels::{RX_PIPE, TX_PIPE};

pub type UsbDriver = Driver<'static, USB>;

#[embassy_executor::task]
pub async fn usb_task(mut usb: UsbDevice<'static, UsbDriver>) -> ! {
    usb.run().await
}

#[embassy_executor::task]
pub async fn usb_rx_task(mut rx: Receiver<'static, UsbDriver>) {
    let mut packet = [0u8; 64];
    loop {
        rx.wait_connection().await;
        info!("Host port opened");
        loop {
            match rx.read_packet(&mut packet).await {
                Ok(n) => {
                    let mut queued = 0;
                    while queued < n {
                        queued += RX_PIPE.write(&packet[queued..n]).await;
                    }
                }
                Err(EndpointError::BufferOverflow) => warn!("Oversized CDC packet dropped"),
                Err(EndpointError::Disabled) => break,
            }
        }
        info!("Host port closed");
    }
}

#[embassy_executor::task]
pub async fn usb_tx_task(mut tx: Sender<'static, UsbDriver>) {
    // One byte under the endpoint size, so a full chunk is never an exact
    // packet multiple needing a zero-length terminator
    let mut chunk = [0u8; 63];
    loop {
        let n = TX_PIPE.read(&mut chunk).await;
        // Write failure means no host is listening; the bytes are dropped
        let _ = tx.write_packet(&chunk[..n]).await;
    }
}
