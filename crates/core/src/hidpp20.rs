//! HID++ 2.0 feature discovery.
//!
//! HID++ 2.0 devices describe themselves through a feature table. Two
//! bootstrap features make it reachable:
//!   - ROOT (0x0000, always index 0)
//!     - Function 0: getFeature(id_hi, id_lo) → params[0] = index, params[1] = type
//!     - Function 1: ping(0, 0, data) → params[0..1] = version, params[2] = data
//!   - FEATURE_SET (0x0001, index looked up through ROOT)
//!     - Function 0: getCount → params[0] = number of features besides ROOT
//!     - Function 1: getFeatureId(index) → params[0..1] = id, params[2] = type
//!
//! Requests travel through the HID++ 1.0 request path; the selector bytes
//! are simply read as feature index and function.

use crate::dispatch::IgnoreNotifications;
use crate::error::{Error, Result};
use crate::hidpp::{validate_device_index, Command, Message, ReportKind};
use crate::hidpp10::{self, RegisterError};
use crate::transport::HidTransport;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Software ID placed in the low nibble of every request we send.
pub const SW_ID: u8 = 0x01;
/// ROOT is always at feature index 0.
pub const ROOT_FEATURE_INDEX: u8 = 0x00;

const ROOT_FN_GET_FEATURE: u8 = 0x00;
const ROOT_FN_PING: u8 = 0x01;
const FEATURE_SET_FN_GET_COUNT: u8 = 0x00;
const FEATURE_SET_FN_GET_FEATURE_ID: u8 = 0x01;

/// Arbitrary byte echoed back by the ROOT ping.
const PING_DATA: u8 = 0x5A;

/// HID++ 2.0 well-known feature IDs.
pub mod features {
    /// Root feature: ping and feature index lookup.
    pub const ROOT: u16 = 0x0000;
    /// Feature set: enumerate all supported features.
    pub const FEATURE_SET: u16 = 0x0001;
    /// Firmware information.
    pub const FIRMWARE_INFO: u16 = 0x0003;
    /// Device name and type.
    pub const DEVICE_NAME: u16 = 0x0005;
    /// Battery status.
    pub const BATTERY_STATUS: u16 = 0x1000;
    /// Programmable keys and buttons.
    pub const REPROG_CONTROLS: u16 = 0x1B00;
    /// Wireless device status broadcasts.
    pub const WIRELESS_DEVICE_STATUS: u16 = 0x1D4B;
    /// Fn key inversion.
    pub const FN_INVERSION: u16 = 0x40A0;
    /// Keyboard layout.
    pub const KEYBOARD_LAYOUT: u16 = 0x4540;
    /// Touchpad raw XY.
    pub const TOUCHPAD_RAW_XY: u16 = 0x6100;
    /// Adjustable DPI setting.
    pub const ADJUSTABLE_DPI: u16 = 0x2201;

    /// Human-readable name for a known feature ID.
    pub fn name(id: u16) -> Option<&'static str> {
        Some(match id {
            ROOT => "ROOT",
            FEATURE_SET => "FEATURE_SET",
            FIRMWARE_INFO => "FIRMWARE_INFO",
            DEVICE_NAME => "DEVICE_NAME",
            BATTERY_STATUS => "BATTERY_STATUS",
            REPROG_CONTROLS => "REPROG_CONTROLS",
            WIRELESS_DEVICE_STATUS => "WIRELESS_DEVICE_STATUS",
            FN_INVERSION => "FN_INVERSION",
            KEYBOARD_LAYOUT => "KEYBOARD_LAYOUT",
            TOUCHPAD_RAW_XY => "TOUCHPAD_RAW_XY",
            ADJUSTABLE_DPI => "ADJUSTABLE_DPI",
            _ => return None,
        })
    }
}

/// Feature type flags.
pub mod feature_type {
    pub const OBSOLETE: u8 = 0x80;
    /// Hidden from software.
    pub const HIDDEN: u8 = 0x40;
    /// Engineering-only.
    pub const ENGINEERING: u8 = 0x20;
}

/// HID++ 2.0 error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FeatureError {
    NoError = 0x00,
    Unknown = 0x01,
    InvalidArgument = 0x02,
    OutOfRange = 0x03,
    HwError = 0x04,
    LogitechInternal = 0x05,
    InvalidFeatureIndex = 0x06,
    InvalidFunctionId = 0x07,
    Busy = 0x08,
    Unsupported = 0x09,
}

impl FeatureError {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x00 => Self::NoError,
            0x01 => Self::Unknown,
            0x02 => Self::InvalidArgument,
            0x03 => Self::OutOfRange,
            0x04 => Self::HwError,
            0x05 => Self::LogitechInternal,
            0x06 => Self::InvalidFeatureIndex,
            0x07 => Self::InvalidFunctionId,
            0x08 => Self::Busy,
            0x09 => Self::Unsupported,
            _ => return None,
        })
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NoError => "no error",
            Self::Unknown => "unknown",
            Self::InvalidArgument => "invalid argument",
            Self::OutOfRange => "out of range",
            Self::HwError => "hardware error",
            Self::LogitechInternal => "Logitech internal",
            Self::InvalidFeatureIndex => "invalid feature index",
            Self::InvalidFunctionId => "invalid function ID",
            Self::Busy => "busy",
            Self::Unsupported => "unsupported",
        }
    }

    /// Name for a raw code, including codes outside the documented set.
    pub fn describe(code: u8) -> &'static str {
        Self::from_code(code).map_or("unrecognized", |e| e.name())
    }
}

/// HID++ protocol version as reported by the ROOT ping (major in the high byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProtocolVersion(pub u16);

impl ProtocolVersion {
    /// Version could not be determined.
    pub const UNKNOWN: Self = Self(0);
    /// HID++ 1.0 (register protocol only).
    pub const V1_0: Self = Self(0x0100);
    /// First version with the feature table.
    pub const V2_0: Self = Self(0x0200);

    pub fn major(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn minor(&self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    pub fn is_known(&self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_known() {
            write!(f, "{}.{}", self.major(), self.minor())
        } else {
            write!(f, "unknown")
        }
    }
}

/// One entry of a device's feature table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureInfo {
    pub feature_index: u8,
    pub feature_id: u16,
    pub feature_type: u8,
}

impl FeatureInfo {
    /// The implicit ROOT entry at index 0.
    pub const ROOT: Self = Self {
        feature_index: ROOT_FEATURE_INDEX,
        feature_id: features::ROOT,
        feature_type: 0,
    };

    pub fn is_obsolete(&self) -> bool {
        self.feature_type & feature_type::OBSOLETE != 0
    }

    pub fn is_hidden(&self) -> bool {
        self.feature_type & feature_type::HIDDEN != 0
    }

    pub fn is_engineering(&self) -> bool {
        self.feature_type & feature_type::ENGINEERING != 0
    }

    pub fn name(&self) -> Option<&'static str> {
        features::name(self.feature_id)
    }
}

/// A complete feature table; position equals feature index, 0 is ROOT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureTable(Vec<FeatureInfo>);

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entry at `feature_index`.
    pub fn get(&self, feature_index: u8) -> Option<&FeatureInfo> {
        self.0.get(feature_index as usize)
    }

    /// Entry for `feature_id`, if the device has it.
    pub fn find(&self, feature_id: u16) -> Option<&FeatureInfo> {
        self.0.iter().find(|f| f.feature_id == feature_id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FeatureInfo> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[FeatureInfo] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a FeatureTable {
    type Item = &'a FeatureInfo;
    type IntoIter = std::slice::Iter<'a, FeatureInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Send one feature request and return the response.
fn feature_request(
    transport: &dyn HidTransport,
    device_index: u8,
    feature_index: u8,
    function: u8,
    params: &[u8],
) -> Result<Message> {
    let req = Message::new(
        ReportKind::HidppShort,
        device_index,
        Command::feature(feature_index, function, SW_ID),
    )
    .with_params(params)?;
    hidpp10::request(transport, &req, &mut IgnoreNotifications)
}

/// Probe the HID++ version with a ROOT ping.
///
/// A device answering "invalid sub-id" only speaks HID++ 1.0. Any other
/// failure, or a reply that does not echo the ping byte, yields
/// [`ProtocolVersion::UNKNOWN`].
pub fn get_version(transport: &dyn HidTransport, device_index: u8) -> Result<ProtocolVersion> {
    validate_device_index(device_index, false)?;

    match feature_request(
        transport,
        device_index,
        ROOT_FEATURE_INDEX,
        ROOT_FN_PING,
        &[0x00, 0x00, PING_DATA],
    ) {
        Ok(resp) if resp.param(2) == PING_DATA => Ok(ProtocolVersion(u16::from_be_bytes([
            resp.param(0),
            resp.param(1),
        ]))),
        Ok(resp) => {
            debug!(
                device_index,
                echoed = resp.param(2),
                "Ping reply did not echo ping data"
            );
            Ok(ProtocolVersion::UNKNOWN)
        }
        Err(Error::Register { code }) if code == RegisterError::InvalidSubId.code() => {
            Ok(ProtocolVersion::V1_0)
        }
        Err(e) => {
            debug!(device_index, error = %e, "HID++ version unavailable");
            Ok(ProtocolVersion::UNKNOWN)
        }
    }
}

/// Look up a feature's index and type through ROOT.
pub fn get_feature_by_id(
    transport: &dyn HidTransport,
    device_index: u8,
    feature_id: u16,
) -> Result<FeatureInfo> {
    validate_device_index(device_index, false)?;

    let resp = feature_request(
        transport,
        device_index,
        ROOT_FEATURE_INDEX,
        ROOT_FN_GET_FEATURE,
        &feature_id.to_be_bytes(),
    )?;

    let feature_index = resp.param(0);
    if feature_index == 0 && feature_id != features::ROOT {
        debug!(
            feature_id = format_args!("0x{:04X}", feature_id),
            "Feature not supported by device"
        );
        return Err(Error::FeatureNotFound {
            feature: feature_id,
        });
    }

    Ok(FeatureInfo {
        feature_index,
        feature_id,
        feature_type: resp.param(1),
    })
}

/// Read the ID and type of the feature at `feature_index` through FEATURE_SET.
pub fn get_feature(
    transport: &dyn HidTransport,
    device_index: u8,
    feature_set: &FeatureInfo,
    feature_index: u8,
) -> Result<FeatureInfo> {
    validate_device_index(device_index, false)?;

    let resp = feature_request(
        transport,
        device_index,
        feature_set.feature_index,
        FEATURE_SET_FN_GET_FEATURE_ID,
        &[feature_index],
    )?;

    Ok(FeatureInfo {
        feature_index,
        feature_id: u16::from_be_bytes([resp.param(0), resp.param(1)]),
        feature_type: resp.param(2),
    })
}

/// Number of features besides ROOT, through FEATURE_SET.
pub fn get_features_count(
    transport: &dyn HidTransport,
    device_index: u8,
    feature_set: &FeatureInfo,
) -> Result<u8> {
    validate_device_index(device_index, false)?;

    let resp = feature_request(
        transport,
        device_index,
        feature_set.feature_index,
        FEATURE_SET_FN_GET_COUNT,
        &[],
    )?;
    Ok(resp.param(0))
}

/// Read the whole feature table.
///
/// Requires HID++ 2.0 or later. Any failing query aborts the enumeration;
/// no partial table is ever returned.
pub fn get_features(transport: &dyn HidTransport, device_index: u8) -> Result<FeatureTable> {
    let version = get_version(transport, device_index)?;
    if version < ProtocolVersion::V2_0 {
        debug!(device_index, %version, "Device has no feature table");
        return Err(Error::UnsupportedProtocol { version: version.0 });
    }

    let feature_set = get_feature_by_id(transport, device_index, features::FEATURE_SET)?;
    let count = get_features_count(transport, device_index, &feature_set)?;
    debug!(device_index, count, "Enumerating device features");

    let mut table = Vec::with_capacity(count as usize + 1);
    table.push(FeatureInfo::ROOT);
    for feature_index in 1..=count {
        let info = get_feature(transport, device_index, &feature_set, feature_index)?;
        debug!(
            feature_index,
            feature_id = format_args!("0x{:04X}", info.feature_id),
            feature_type = format_args!("0x{:02X}", info.feature_type),
            "Found feature"
        );
        table.push(info);
    }

    Ok(FeatureTable(table))
}
