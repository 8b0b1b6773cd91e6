//! HID++ 1.0 register protocol.
//!
//! Registers are read and written with four sub-ids:
//!   - 0x80 SET_REGISTER / 0x81 GET_REGISTER: 3 parameter bytes, short reply
//!   - 0x82 SET_LONG_REGISTER: 16 parameter bytes, short reply
//!   - 0x83 GET_LONG_REGISTER: long reply carrying 16 bytes
//!
//! Failures come back as a short frame with sub-id 0x8F:
//! `[0x10, ix, 0x8F, orig_sub_id, orig_address, error_code, 0x00]`.
//!
//! Protocol reference: Logitech HID++ 1.0 documentation, ltunify.

use crate::dispatch::{self, Disposition, NotificationSink, ResponseFilter};
use crate::error::{Error, Result};
use crate::hidpp::{validate_device_index, Command, Message, ReportKind, RECEIVER_INDEX};
use crate::transport::{self, HidTransport};
use tracing::{debug, warn};

pub const SUB_SET_REGISTER: u8 = 0x80;
pub const SUB_GET_REGISTER: u8 = 0x81;
pub const SUB_SET_LONG_REGISTER: u8 = 0x82;
pub const SUB_GET_LONG_REGISTER: u8 = 0x83;
pub const SUB_ERROR_MSG: u8 = 0x8F;
/// Feature index of HID++ 2.0 error frames; same layout as 0x8F frames.
pub const SUB_ERROR_MSG_20: u8 = 0xFF;

/// Device disconnection.
pub const NOTIF_DEV_DISCONNECT: u8 = 0x40;
/// Device connection.
pub const NOTIF_DEV_CONNECT: u8 = 0x41;
/// Unifying receiver locking change.
pub const NOTIF_RECV_LOCK_CHANGE: u8 = 0x4A;

/// Well-known register addresses.
pub mod registers {
    /// Enabled notification flags.
    pub const ENABLED_NOTIFS: u8 = 0x00;
    /// Connection state; params[1] = number of connected devices.
    pub const CONNECTION_STATE: u8 = 0x02;
    /// Device connection and disconnection (pairing).
    pub const DEVICE_PAIRING: u8 = 0xB2;
    pub const DEVICE_ACTIVITY: u8 = 0xB3;
    pub const PAIRING_INFO: u8 = 0xB5;
    /// Firmware version information (undocumented).
    pub const VERSION_INFO: u8 = 0xF1;
}

/// Bit 0 of ENABLED_NOTIFS params[1]: wireless connect/disconnect reporting.
pub const NOTIF_FLAG_WIRELESS: u8 = 0x01;

/// HID++ 1.0 error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RegisterError {
    Success = 0x00,
    InvalidSubId = 0x01,
    InvalidAddress = 0x02,
    InvalidValue = 0x03,
    ConnectFail = 0x04,
    TooManyDevices = 0x05,
    AlreadyExists = 0x06,
    Busy = 0x07,
    UnknownDevice = 0x08,
    ResourceError = 0x09,
    RequestUnavailable = 0x0A,
    InvalidParamValue = 0x0B,
    WrongPinCode = 0x0C,
}

impl RegisterError {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x00 => Self::Success,
            0x01 => Self::InvalidSubId,
            0x02 => Self::InvalidAddress,
            0x03 => Self::InvalidValue,
            0x04 => Self::ConnectFail,
            0x05 => Self::TooManyDevices,
            0x06 => Self::AlreadyExists,
            0x07 => Self::Busy,
            0x08 => Self::UnknownDevice,
            0x09 => Self::ResourceError,
            0x0A => Self::RequestUnavailable,
            0x0B => Self::InvalidParamValue,
            0x0C => Self::WrongPinCode,
            _ => return None,
        })
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::InvalidSubId => "invalid sub-id",
            Self::InvalidAddress => "invalid address",
            Self::InvalidValue => "invalid value",
            Self::ConnectFail => "connection failed",
            Self::TooManyDevices => "too many devices",
            Self::AlreadyExists => "already exists",
            Self::Busy => "busy",
            Self::UnknownDevice => "unknown device",
            Self::ResourceError => "resource error",
            Self::RequestUnavailable => "request unavailable",
            Self::InvalidParamValue => "invalid parameter value",
            Self::WrongPinCode => "wrong PIN code",
        }
    }

    /// Name for a raw code, including codes outside the documented set.
    pub fn describe(code: u8) -> &'static str {
        Self::from_code(code).map_or("unrecognized", |e| e.name())
    }
}

/// Whether `msg` is a notification the caller should see while waiting.
pub fn is_notification(msg: &Message) -> bool {
    matches!(
        msg.register().sub_id,
        NOTIF_DEV_DISCONNECT | NOTIF_DEV_CONNECT | NOTIF_RECV_LOCK_CHANGE
    )
}

/// Matches responses to one outstanding request.
pub struct RegisterFilter<'a> {
    request: &'a Message,
}

impl<'a> RegisterFilter<'a> {
    pub fn new(request: &'a Message) -> Self {
        Self { request }
    }

    /// Error frame (either generation) naming this request's selector.
    fn is_error_for_request(&self, msg: &Message) -> bool {
        let req = self.request.register();
        let resp = msg.register();
        let is_error = match resp.sub_id {
            SUB_ERROR_MSG => msg.kind() == Some(ReportKind::HidppShort),
            SUB_ERROR_MSG_20 => msg.is_hidpp(),
            _ => false,
        };
        is_error && resp.address == req.sub_id && msg.param(0) == req.address
    }
}

impl ResponseFilter for RegisterFilter<'_> {
    fn classify(&self, msg: &Message) -> Disposition {
        let req = self.request.register();
        let resp = msg.register();
        let same_device = msg.device_index() == self.request.device_index();

        if same_device && self.is_error_for_request(msg) {
            return Disposition::Matched;
        }

        // DJ and other report kinds: maybe the caller is interested.
        let Some(kind) = msg.kind().filter(|k| k.is_hidpp()) else {
            return Disposition::Notification;
        };

        let ok = same_device && resp.sub_id == req.sub_id && resp.address == req.address;
        let accept = match resp.sub_id {
            SUB_SET_REGISTER | SUB_GET_REGISTER | SUB_SET_LONG_REGISTER => {
                ok && kind == ReportKind::HidppShort
            }
            SUB_GET_LONG_REGISTER => ok && kind == ReportKind::HidppLong,
            NOTIF_DEV_DISCONNECT | NOTIF_DEV_CONNECT | NOTIF_RECV_LOCK_CHANGE => {
                return Disposition::Notification;
            }
            // Undocumented registers: report kinds may differ, accept on the
            // selector alone.
            _ => ok,
        };

        if accept {
            Disposition::Matched
        } else {
            Disposition::Discarded
        }
    }
}

/// Send `request` and wait for its response.
///
/// Notifications arriving in the meantime go to `sink`. An error frame
/// answering the request becomes `Error::Register` (0x8F) or
/// `Error::Feature` (0xFF) with the embedded code.
pub fn request(
    transport: &dyn HidTransport,
    request: &Message,
    sink: &mut dyn NotificationSink,
) -> Result<Message> {
    validate_device_index(request.device_index(), true)?;
    transport::send(transport, request)?;

    let filter = RegisterFilter::new(request);
    let timeout_ms = transport.timeouts().read_timeout_ms;
    let response = dispatch::read_matching(transport, timeout_ms, &filter, sink)?;

    match response.register().sub_id {
        SUB_ERROR_MSG => {
            let code = response.param(1);
            debug!(
                device_index = request.device_index(),
                sub_id = format_args!("0x{:02X}", request.register().sub_id),
                address = format_args!("0x{:02X}", request.register().address),
                error = RegisterError::describe(code),
                "HID++ 1.0 error response"
            );
            Err(Error::Register { code })
        }
        SUB_ERROR_MSG_20 => {
            let code = response.param(1);
            warn!(
                device_index = request.device_index(),
                feature_index = request.feature().feature_index,
                error_code = code,
                "HID++ 2.0 error response"
            );
            Err(Error::Feature { code })
        }
        _ => Ok(response),
    }
}

/// Read a short register: the three parameter bytes.
pub fn read_register(
    transport: &dyn HidTransport,
    device_index: u8,
    address: u8,
) -> Result<[u8; 3]> {
    let req = Message::new(
        ReportKind::HidppShort,
        device_index,
        Command::register(SUB_GET_REGISTER, address),
    );
    let resp = request(transport, &req, &mut dispatch::IgnoreNotifications)?;
    Ok([resp.param(0), resp.param(1), resp.param(2)])
}

/// Read a long register: sixteen parameter bytes.
pub fn read_long_register(
    transport: &dyn HidTransport,
    device_index: u8,
    address: u8,
) -> Result<[u8; 16]> {
    let req = Message::new(
        ReportKind::HidppShort,
        device_index,
        Command::register(SUB_GET_LONG_REGISTER, address),
    );
    let resp = request(transport, &req, &mut dispatch::IgnoreNotifications)?;
    let mut value = [0u8; 16];
    value.copy_from_slice(&resp.params()[..16]);
    Ok(value)
}

/// Write a short register.
pub fn write_register(
    transport: &dyn HidTransport,
    device_index: u8,
    address: u8,
    value: [u8; 3],
) -> Result<()> {
    let req = Message::new(
        ReportKind::HidppShort,
        device_index,
        Command::register(SUB_SET_REGISTER, address),
    )
    .with_params(&value)?;
    request(transport, &req, &mut dispatch::IgnoreNotifications)?;
    Ok(())
}

/// Number of devices currently connected to the receiver.
pub fn connected_devices(transport: &dyn HidTransport) -> Result<u8> {
    let value = read_register(transport, RECEIVER_INDEX, registers::CONNECTION_STATE)?;
    Ok(value[1])
}

/// Turn reporting of wireless notifications on or off.
///
/// The current flags are read first; the register is only written when the
/// wireless bit differs from `enabled`.
pub fn enable_wireless_notifications(transport: &dyn HidTransport, enabled: bool) -> Result<()> {
    let mut flags = read_register(transport, RECEIVER_INDEX, registers::ENABLED_NOTIFS)?;
    let current = flags[1] & NOTIF_FLAG_WIRELESS != 0;
    if current == enabled {
        debug!(enabled, "Wireless notifications already in requested state");
        return Ok(());
    }

    if enabled {
        flags[1] |= NOTIF_FLAG_WIRELESS;
    } else {
        flags[1] &= !NOTIF_FLAG_WIRELESS;
    }
    write_register(transport, RECEIVER_INDEX, registers::ENABLED_NOTIFS, flags)?;
    debug!(enabled, "Wireless notifications updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::IgnoreNotifications;
    use crate::transport::mock::MockTransport;

    fn get_register(ix: u8, address: u8) -> Message {
        Message::new(
            ReportKind::HidppShort,
            ix,
            Command::register(SUB_GET_REGISTER, address),
        )
    }

    fn decode(frame: &[u8]) -> Message {
        Message::decode(frame).unwrap()
    }

    #[test]
    fn error_frame_for_request_is_accepted() {
        let req = get_register(0xFF, 0xB5);
        let filter = RegisterFilter::new(&req);
        let err = decode(&[0x10, 0xFF, 0x8F, 0x81, 0xB5, 0x02, 0x00]);
        assert_eq!(filter.classify(&err), Disposition::Matched);
    }

    #[test]
    fn error_frame_for_other_address_is_not_accepted() {
        let req = get_register(0xFF, 0xB5);
        let filter = RegisterFilter::new(&req);
        let err = decode(&[0x10, 0xFF, 0x8F, 0x81, 0xB2, 0x02, 0x00]);
        assert_eq!(filter.classify(&err), Disposition::Discarded);
        let other_dev = decode(&[0x10, 0x01, 0x8F, 0x81, 0xB5, 0x02, 0x00]);
        assert_eq!(filter.classify(&other_dev), Disposition::Discarded);
    }

    #[test]
    fn feature_error_frame_for_other_selector_is_not_accepted() {
        // Feature index 0x03, function 1, software id 1: selector 03 11.
        let req = Message::new(ReportKind::HidppLong, 0x02, Command::feature(0x03, 0x01, 0x01));
        let filter = RegisterFilter::new(&req);

        let mut matching = vec![0x11, 0x02, 0xFF, 0x03, 0x11, 0x05];
        matching.resize(20, 0);
        assert_eq!(filter.classify(&decode(&matching)), Disposition::Matched);

        let mut other_index = vec![0x11, 0x02, 0xFF, 0x04, 0x11, 0x05];
        other_index.resize(20, 0);
        assert_eq!(filter.classify(&decode(&other_index)), Disposition::Discarded);

        let mut other_function = vec![0x11, 0x02, 0xFF, 0x03, 0x21, 0x05];
        other_function.resize(20, 0);
        assert_eq!(filter.classify(&decode(&other_function)), Disposition::Discarded);
    }

    #[test]
    fn short_register_reply_must_be_short() {
        let req = get_register(0xFF, 0x02);
        let filter = RegisterFilter::new(&req);
        assert_eq!(
            filter.classify(&decode(&[0x10, 0xFF, 0x81, 0x02, 0x00, 0x01, 0x00])),
            Disposition::Matched
        );
        let mut long = vec![0x11, 0xFF, 0x81, 0x02];
        long.resize(20, 0);
        assert_eq!(filter.classify(&decode(&long)), Disposition::Discarded);
    }

    #[test]
    fn long_register_reply_must_be_long() {
        let req = Message::new(
            ReportKind::HidppShort,
            0xFF,
            Command::register(SUB_GET_LONG_REGISTER, 0xB5),
        );
        let filter = RegisterFilter::new(&req);
        assert_eq!(
            filter.classify(&decode(&[0x10, 0xFF, 0x83, 0xB5, 0x00, 0x00, 0x00])),
            Disposition::Discarded
        );
        let mut long = vec![0x11, 0xFF, 0x83, 0xB5];
        long.resize(20, 0);
        assert_eq!(filter.classify(&decode(&long)), Disposition::Matched);
    }

    #[test]
    fn connection_notifications_are_forwarded() {
        let req = get_register(0xFF, 0x02);
        let filter = RegisterFilter::new(&req);
        for sub_id in [NOTIF_DEV_DISCONNECT, NOTIF_DEV_CONNECT, NOTIF_RECV_LOCK_CHANGE] {
            let notif = decode(&[0x10, 0x01, sub_id, 0x04, 0x00, 0x00, 0x00]);
            assert_eq!(filter.classify(&notif), Disposition::Notification);
        }
    }

    #[test]
    fn dj_frames_are_forwarded() {
        let req = get_register(0xFF, 0x02);
        let filter = RegisterFilter::new(&req);
        let mut dj = vec![0x20, 0x01, 0x42, 0x00];
        dj.resize(15, 0);
        assert_eq!(filter.classify(&decode(&dj)), Disposition::Notification);
    }

    #[test]
    fn unlisted_sub_id_accepted_on_selector_match() {
        // HID++ 2.0 style request: feature 0x00, function 1, sw 1.
        let req = Message::new(ReportKind::HidppShort, 0x01, Command::feature(0x00, 0x01, 0x01));
        let filter = RegisterFilter::new(&req);
        let mut long = vec![0x11, 0x01, 0x00, 0x11, 0x04, 0x02];
        long.resize(20, 0);
        assert_eq!(filter.classify(&decode(&long)), Disposition::Matched);
        assert_eq!(
            filter.classify(&decode(&[0x10, 0x02, 0x00, 0x11, 0x04, 0x02, 0x00])),
            Disposition::Discarded
        );
    }

    #[test]
    fn request_returns_embedded_error_code_verbatim() {
        let mock = MockTransport::new();
        mock.on_write(|req| {
            vec![
                // Interleaved notification for another device.
                vec![0x10, 0x03, 0x41, 0x04, 0x61, 0x10, 0x40],
                vec![0x10, req[1], 0x8F, req[2], req[3], 0x0B, 0x00],
            ]
        });
        let err = request(&mock, &get_register(0xFF, 0xB5), &mut IgnoreNotifications)
            .unwrap_err();
        assert_eq!(err.register_code(), Some(0x0B));
    }

    #[test]
    fn notification_forwarded_once_and_wait_continues() {
        let mock = MockTransport::new();
        mock.on_write(|req| {
            vec![
                vec![0x10, 0x01, 0x41, 0x04, 0x61, 0x10, 0x40],
                vec![0x10, req[1], req[2], req[3], 0x00, 0x02, 0x00],
            ]
        });

        let mut notifications = Vec::new();
        let mut sink = |m: &Message| notifications.push(*m);
        let resp = request(&mock, &get_register(0xFF, 0x02), &mut sink).unwrap();
        assert_eq!(resp.param(1), 0x02);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].register().sub_id, NOTIF_DEV_CONNECT);
    }

    #[test]
    fn request_times_out_without_response() {
        let mock = MockTransport::new().with_read_timeout(40);
        let err = request(&mock, &get_register(0xFF, 0x02), &mut IgnoreNotifications)
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[test]
    fn request_rejects_invalid_device_index() {
        let mock = MockTransport::new();
        let err = request(&mock, &get_register(0x00, 0x02), &mut IgnoreNotifications)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDeviceIndex(0)));
        assert!(mock.written().is_empty());
    }

    #[test]
    fn feature_error_frame_maps_to_feature_error() {
        let mock = MockTransport::new();
        mock.on_write(|req| vec![vec![0x10, req[1], 0xFF, req[2], req[3], 0x05, 0x00]]);
        let req = Message::new(ReportKind::HidppShort, 0x02, Command::feature(0x03, 0x01, 0x01));
        let err = request(&mock, &req, &mut IgnoreNotifications).unwrap_err();
        assert_eq!(err.feature_code(), Some(0x05));
    }

    /// Responder modelling the ENABLED_NOTIFS register of a receiver.
    fn notification_register(mock: &MockTransport, initial: u8) {
        let mut flags = [0x00, initial, 0x00];
        mock.on_write(move |req| {
            let reply = match (req[2], req[3]) {
                (SUB_GET_REGISTER, registers::ENABLED_NOTIFS) => {
                    vec![0x10, req[1], req[2], req[3], flags[0], flags[1], flags[2]]
                }
                (SUB_SET_REGISTER, registers::ENABLED_NOTIFS) => {
                    flags.copy_from_slice(&req[4..7]);
                    vec![0x10, req[1], req[2], req[3], 0x00, 0x00, 0x00]
                }
                _ => vec![0x10, req[1], 0x8F, req[2], req[3], 0x02, 0x00],
            };
            vec![reply]
        });
    }

    #[test]
    fn enable_notifications_skips_write_when_already_enabled() {
        let mock = MockTransport::new();
        notification_register(&mock, 0x01);
        enable_wireless_notifications(&mock, true).unwrap();
        let written = mock.written();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0][2], SUB_GET_REGISTER);
    }

    #[test]
    fn enable_notifications_reads_then_writes_when_changing() {
        let mock = MockTransport::new();
        notification_register(&mock, 0x00);
        enable_wireless_notifications(&mock, true).unwrap();
        let written = mock.written();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0][2], SUB_GET_REGISTER);
        assert_eq!(written[1], vec![0x10, 0xFF, 0x80, 0x00, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn disable_notifications_clears_only_wireless_bit() {
        let mock = MockTransport::new();
        notification_register(&mock, 0x09);
        enable_wireless_notifications(&mock, false).unwrap();
        let written = mock.written();
        assert_eq!(written.len(), 2);
        assert_eq!(written[1][5], 0x08);
    }

    #[test]
    fn connected_devices_reads_connection_state() {
        let mock = MockTransport::new();
        mock.on_write(|req| vec![vec![0x10, 0xFF, req[2], req[3], 0x00, 0x03, 0x00]]);
        assert_eq!(connected_devices(&mock).unwrap(), 3);
        assert_eq!(mock.written()[0][3], registers::CONNECTION_STATE);
    }

    #[test]
    fn read_long_register_returns_sixteen_bytes() {
        let mock = MockTransport::new();
        mock.on_write(|req| {
            let mut reply = vec![0x11, req[1], req[2], req[3]];
            reply.extend(1..=16u8);
            vec![reply]
        });
        let value = read_long_register(&mock, 0xFF, registers::PAIRING_INFO).unwrap();
        assert_eq!(value[0], 1);
        assert_eq!(value[15], 16);
    }

    #[test]
    fn register_error_names() {
        assert_eq!(RegisterError::from_code(0x07), Some(RegisterError::Busy));
        assert_eq!(RegisterError::WrongPinCode.code(), 0x0C);
        assert_eq!(RegisterError::from_code(0x0D), None);
    }
}
