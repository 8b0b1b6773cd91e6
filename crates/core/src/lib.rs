//! unifying-core: HID++ transport, request dispatch, and protocol layers.
//!
//! This crate talks to Logitech Unifying receivers and their paired devices
//! over a raw HID channel: framing, request/response matching with
//! notification forwarding, the HID++ 1.0 register protocol and HID++ 2.0
//! feature discovery.

pub mod comm;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod hidpp;
pub mod hidpp10;
pub mod hidpp20;
pub mod transport;

/// Logitech USB Vendor ID.
pub const LOGITECH_VID: u16 = 0x046D;

/// Known receiver product IDs.
pub mod pids {
    /// Unifying receiver.
    pub const UNIFYING: u16 = 0xC52B;
    /// Unifying receiver, later revision.
    pub const UNIFYING_C532: u16 = 0xC532;
    /// Older nano receiver.
    pub const NANO_RECEIVER: u16 = 0xC52F;
}
