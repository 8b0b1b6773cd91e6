//! Receiver discovery and the hidapi-backed channel.

use crate::config::Timeouts;
use crate::error::{Error, Result};
use crate::transport::HidTransport;
use crate::{pids, LOGITECH_VID};
use std::ffi::CString;
use tracing::{debug, info};

/// USB interface carrying HID++ traffic on Unifying receivers.
pub const HIDPP_INTERFACE: i32 = 2;

/// Supported receiver models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverModel {
    Unifying,
    UnifyingC532,
    Nano,
}

impl ReceiverModel {
    /// Look up model from USB product ID.
    pub fn from_pid(pid: u16) -> Option<Self> {
        match pid {
            pids::UNIFYING => Some(Self::Unifying),
            pids::UNIFYING_C532 => Some(Self::UnifyingC532),
            pids::NANO_RECEIVER => Some(Self::Nano),
            _ => None,
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unifying | Self::UnifyingC532 => "Logitech Unifying Receiver",
            Self::Nano => "Logitech Nano Receiver",
        }
    }

    /// USB Product ID.
    pub fn pid(&self) -> u16 {
        match self {
            Self::Unifying => pids::UNIFYING,
            Self::UnifyingC532 => pids::UNIFYING_C532,
            Self::Nano => pids::NANO_RECEIVER,
        }
    }
}

/// Information about a discovered receiver.
#[derive(Debug, Clone)]
pub struct ReceiverInfo {
    pub model: ReceiverModel,
    pub vid: u16,
    pub pid: u16,
    pub path: String,
    pub serial: Option<String>,
}

/// Whether an enumerated HID interface is a receiver's HID++ interface.
fn is_receiver_interface(vid: u16, pid: u16, interface: i32) -> Option<ReceiverModel> {
    if vid != LOGITECH_VID || interface != HIDPP_INTERFACE {
        return None;
    }
    ReceiverModel::from_pid(pid)
}

/// Discover all connected Unifying receivers.
pub fn discover_receivers() -> Result<Vec<ReceiverInfo>> {
    debug!("Starting HID device enumeration");
    let api = hidapi::HidApi::new().map_err(|e| Error::Transport(e.to_string()))?;

    let mut receivers = Vec::new();
    for info in api.device_list() {
        let Some(model) =
            is_receiver_interface(info.vendor_id(), info.product_id(), info.interface_number())
        else {
            continue;
        };

        info!(
            model = model.name(),
            vid = format_args!("0x{:04X}", info.vendor_id()),
            pid = format_args!("0x{:04X}", info.product_id()),
            path = %info.path().to_string_lossy(),
            "Found receiver"
        );
        receivers.push(ReceiverInfo {
            model,
            vid: info.vendor_id(),
            pid: info.product_id(),
            path: info.path().to_string_lossy().into_owned(),
            serial: info.serial_number().map(|s| s.to_string()),
        });
    }

    debug!(count = receivers.len(), "Device enumeration complete");
    Ok(receivers)
}

/// Map a hidapi open failure, spotting permission problems.
fn open_error(path: &str, err: hidapi::HidError) -> Error {
    let message = err.to_string();
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("access denied") {
        Error::PermissionDenied(format!(
            "{path}: {message}; run as root or grant read/write access to the hidraw node"
        ))
    } else {
        Error::Transport(format!("open {path}: {message}"))
    }
}

/// Channel over an open hidapi device.
pub struct HidapiTransport {
    device: hidapi::HidDevice,
    timeouts: Timeouts,
}

impl HidapiTransport {
    /// Open the receiver at `path`.
    pub fn open(path: &str, timeouts: Timeouts) -> Result<Self> {
        let api = hidapi::HidApi::new().map_err(|e| Error::Transport(e.to_string()))?;
        let c_path = CString::new(path)
            .map_err(|_| Error::DeviceNotFound(format!("invalid device path: {path}")))?;
        let device = api.open_path(&c_path).map_err(|e| open_error(path, e))?;
        debug!(path, "Opened receiver");
        Ok(Self { device, timeouts })
    }

    /// Open the first receiver found.
    pub fn open_first(timeouts: Timeouts) -> Result<Self> {
        let receivers = discover_receivers()?;
        let first = receivers
            .first()
            .ok_or_else(|| Error::DeviceNotFound("no Unifying receiver found".into()))?;
        Self::open(&first.path, timeouts)
    }
}

impl HidTransport for HidapiTransport {
    fn write_report(&self, data: &[u8]) -> Result<usize> {
        self.device
            .write(data)
            .map_err(|e| Error::Transport(format!("write: {e}")))
    }

    fn read_report(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        self.device
            .read_timeout(buf, timeout_ms)
            .map_err(|e| Error::Transport(format!("read_timeout: {e}")))
    }

    fn timeouts(&self) -> Timeouts {
        self.timeouts
    }
}
