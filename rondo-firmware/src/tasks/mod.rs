//! Embassy async tasks

pub mod control;
pub mod encoder;
pub mod usb;

pub use control::control_task;
pub use encoder::encoder_task;
pub use usb::{usb_rx_task, usb_task, usb_tx_task};
