//! HID++ wire format: report kinds, frame lengths and the `Message` value type.
//!
//! Every frame starts with a report ID selecting one of four fixed lengths:
//! - HID++ short: 7 bytes (report ID 0x10)
//! - HID++ long: 20 bytes (report ID 0x11)
//! - DJ short: 15 bytes (report ID 0x20)
//! - DJ long: 32 bytes (report ID 0x21)
//!
//! Byte 1 is the device index, bytes 2..4 the command selector and the rest
//! parameters, zero-padded to the full frame length.
//!
//! The two-byte selector means `sub_id`/`address` in HID++ 1.0 and
//! `feature_index`/`function | sw_id` in HID++ 2.0. Outgoing messages are
//! built from a generation-tagged [`Command`]; incoming ones are read back
//! through the matching typed view.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// HID++ report ID for short messages (7 bytes total).
pub const SHORT_REPORT_ID: u8 = 0x10;
/// HID++ report ID for long messages (20 bytes total).
pub const LONG_REPORT_ID: u8 = 0x11;
/// DJ report ID for short enumerator messages (15 bytes total).
pub const DJ_SHORT_REPORT_ID: u8 = 0x20;
/// DJ report ID for long enumerator messages (32 bytes total).
pub const DJ_LONG_REPORT_ID: u8 = 0x21;

/// Short report length (including report ID).
pub const SHORT_REPORT_LEN: usize = 7;
/// Long report length (including report ID).
pub const LONG_REPORT_LEN: usize = 20;
/// DJ short report length.
pub const DJ_SHORT_REPORT_LEN: usize = 15;
/// DJ long report length.
pub const DJ_LONG_REPORT_LEN: usize = 32;

/// Largest frame any report kind produces; also the receive buffer size.
pub const MAX_FRAME_LEN: usize = DJ_LONG_REPORT_LEN;
/// Report ID, device index and the two selector bytes.
pub const HEADER_LEN: usize = 4;
/// Largest parameter block.
pub const MAX_PARAMS_LEN: usize = MAX_FRAME_LEN - HEADER_LEN;

/// Number of device slots on a Unifying receiver.
pub const MAX_DEVICES: u8 = 6;
/// Device index addressing the receiver itself.
pub const RECEIVER_INDEX: u8 = 0xFF;

/// Recognized report kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportKind {
    HidppShort,
    HidppLong,
    DjShort,
    DjLong,
}

impl ReportKind {
    /// All recognized kinds.
    pub const ALL: &'static [ReportKind] = &[
        ReportKind::HidppShort,
        ReportKind::HidppLong,
        ReportKind::DjShort,
        ReportKind::DjLong,
    ];

    /// Look up a kind from its report ID.
    pub fn from_report_id(report_id: u8) -> Option<Self> {
        match report_id {
            SHORT_REPORT_ID => Some(Self::HidppShort),
            LONG_REPORT_ID => Some(Self::HidppLong),
            DJ_SHORT_REPORT_ID => Some(Self::DjShort),
            DJ_LONG_REPORT_ID => Some(Self::DjLong),
            _ => None,
        }
    }

    /// Wire report ID.
    pub fn report_id(&self) -> u8 {
        match self {
            Self::HidppShort => SHORT_REPORT_ID,
            Self::HidppLong => LONG_REPORT_ID,
            Self::DjShort => DJ_SHORT_REPORT_ID,
            Self::DjLong => DJ_LONG_REPORT_ID,
        }
    }

    /// Total frame length in bytes.
    pub fn frame_len(&self) -> usize {
        match self {
            Self::HidppShort => SHORT_REPORT_LEN,
            Self::HidppLong => LONG_REPORT_LEN,
            Self::DjShort => DJ_SHORT_REPORT_LEN,
            Self::DjLong => DJ_LONG_REPORT_LEN,
        }
    }

    /// Parameter block length (`frame_len - 4`).
    pub fn params_len(&self) -> usize {
        self.frame_len() - HEADER_LEN
    }

    /// Whether this is one of the two HID++ kinds (as opposed to DJ).
    pub fn is_hidpp(&self) -> bool {
        matches!(self, Self::HidppShort | Self::HidppLong)
    }
}

/// Frame length for a raw report ID, if the ID is recognized.
pub fn frame_length(report_id: u8) -> Option<usize> {
    ReportKind::from_report_id(report_id).map(|kind| kind.frame_len())
}

/// Whether `ix` names a paired device slot (1..=6).
pub fn is_valid_device_index(ix: u8) -> bool {
    (1..=MAX_DEVICES).contains(&ix)
}

/// Reject device indices outside 1..=6, optionally allowing the receiver (0xFF).
pub fn validate_device_index(ix: u8, allow_receiver: bool) -> Result<u8> {
    if is_valid_device_index(ix) || (allow_receiver && ix == RECEIVER_INDEX) {
        Ok(ix)
    } else {
        Err(Error::InvalidDeviceIndex(ix))
    }
}

/// HID++ 1.0 view of the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegisterCommand {
    pub sub_id: u8,
    pub address: u8,
}

/// HID++ 2.0 view of the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureCommand {
    pub feature_index: u8,
    /// Function ID (upper nibble on the wire).
    pub function: u8,
    /// Software ID (lower nibble on the wire).
    pub sw_id: u8,
}

/// A command selector tagged with the protocol generation that defines it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Register(RegisterCommand),
    Feature(FeatureCommand),
}

impl Command {
    /// HID++ 1.0 register command.
    pub fn register(sub_id: u8, address: u8) -> Self {
        Self::Register(RegisterCommand { sub_id, address })
    }

    /// HID++ 2.0 feature command.
    pub fn feature(feature_index: u8, function: u8, sw_id: u8) -> Self {
        Self::Feature(FeatureCommand {
            feature_index,
            function,
            sw_id,
        })
    }

    /// The two selector bytes as sent on the wire.
    pub fn to_bytes(&self) -> [u8; 2] {
        match *self {
            Self::Register(RegisterCommand { sub_id, address }) => [sub_id, address],
            Self::Feature(FeatureCommand {
                feature_index,
                function,
                sw_id,
            }) => [feature_index, (function << 4) | (sw_id & 0x0F)],
        }
    }
}

/// One HID++ or DJ frame.
///
/// A fixed-size value type: the parameter block is stored inline and its
/// usable length is fixed by the report kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    report_id: u8,
    device_index: u8,
    selector: [u8; 2],
    params: [u8; MAX_PARAMS_LEN],
    params_len: u8,
}

impl Message {
    /// Create a zero-parameter message.
    pub fn new(kind: ReportKind, device_index: u8, command: Command) -> Self {
        Self {
            report_id: kind.report_id(),
            device_index,
            selector: command.to_bytes(),
            params: [0; MAX_PARAMS_LEN],
            params_len: kind.params_len() as u8,
        }
    }

    /// Copy `params` into the parameter block; the rest stays zero.
    pub fn with_params(mut self, params: &[u8]) -> Result<Self> {
        if params.len() > self.params().len() {
            return Err(Error::MalformedFrame(format!(
                "{} parameter bytes do not fit a {}-byte frame",
                params.len(),
                self.params_len as usize + HEADER_LEN
            )));
        }
        self.params[..params.len()].copy_from_slice(params);
        Ok(self)
    }

    /// Decode a raw frame as read from the channel.
    ///
    /// Unrecognized report IDs are kept (with the parameter length taken from
    /// the read) so higher layers can still inspect them.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < SHORT_REPORT_LEN {
            return Err(Error::MalformedFrame(format!(
                "frame too short: {} bytes (minimum {})",
                data.len(),
                SHORT_REPORT_LEN
            )));
        }

        // A truncated read of a known kind keeps the bytes present and
        // zero-pads the rest of the parameter block.
        let (len, params_len) = match ReportKind::from_report_id(data[0]) {
            Some(kind) => (data.len().min(kind.frame_len()), kind.params_len()),
            None => {
                let len = data.len().min(MAX_FRAME_LEN);
                (len, len - HEADER_LEN)
            }
        };

        let mut params = [0u8; MAX_PARAMS_LEN];
        params[..len - HEADER_LEN].copy_from_slice(&data[HEADER_LEN..len]);

        Ok(Self {
            report_id: data[0],
            device_index: data[1],
            selector: [data[2], data[3]],
            params,
            params_len: params_len as u8,
        })
    }

    /// Encode into the exact wire frame. Fails for unrecognized report IDs.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let len = frame_length(self.report_id).ok_or_else(|| {
            Error::MalformedFrame(format!("unknown report ID: 0x{:02X}", self.report_id))
        })?;
        let mut buf = Vec::with_capacity(len);
        buf.push(self.report_id);
        buf.push(self.device_index);
        buf.extend_from_slice(&self.selector);
        buf.extend_from_slice(&self.params[..len - HEADER_LEN]);
        Ok(buf)
    }

    pub fn report_id(&self) -> u8 {
        self.report_id
    }

    /// Recognized kind, or `None` for report IDs this layer does not know.
    pub fn kind(&self) -> Option<ReportKind> {
        ReportKind::from_report_id(self.report_id)
    }

    /// Whether this is a HID++ short or long frame.
    pub fn is_hidpp(&self) -> bool {
        self.kind().is_some_and(|k| k.is_hidpp())
    }

    pub fn device_index(&self) -> u8 {
        self.device_index
    }

    /// Raw selector bytes.
    pub fn selector(&self) -> [u8; 2] {
        self.selector
    }

    /// Selector read as a HID++ 1.0 register command.
    pub fn register(&self) -> RegisterCommand {
        RegisterCommand {
            sub_id: self.selector[0],
            address: self.selector[1],
        }
    }

    /// Selector read as a HID++ 2.0 feature command.
    pub fn feature(&self) -> FeatureCommand {
        FeatureCommand {
            feature_index: self.selector[0],
            function: self.selector[1] >> 4,
            sw_id: self.selector[1] & 0x0F,
        }
    }

    /// The parameter block, exactly `frame_len - 4` bytes long.
    pub fn params(&self) -> &[u8] {
        &self.params[..self.params_len as usize]
    }

    /// Mutable access to the parameter block.
    pub fn params_mut(&mut self) -> &mut [u8] {
        &mut self.params[..self.params_len as usize]
    }

    /// Parameter byte at `i`, or 0 past the end of the block.
    pub fn param(&self, i: usize) -> u8 {
        self.params().get(i).copied().unwrap_or(0)
    }
}
