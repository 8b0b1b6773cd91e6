//! HID transport abstraction and single-frame send/receive.
//!
//! Provides a trait-based transport layer so that real hidraw devices and
//! mock devices share the same interface. `send` and `receive` move exactly
//! one frame; matching responses to requests is the dispatcher's job.

use crate::config::Timeouts;
use crate::error::{Error, Result};
use crate::hidpp::{Message, MAX_FRAME_LEN};
use tracing::{debug, trace, warn};

/// Abstraction over an open duplex HID channel.
///
/// At most one request/response exchange may be outstanding per channel;
/// callers sharing a channel must serialize their exchanges.
pub trait HidTransport: Send {
    /// Write one raw report, returning the number of bytes transferred.
    fn write_report(&self, data: &[u8]) -> Result<usize>;

    /// Wait up to `timeout_ms` for a report and read it into `buf`.
    ///
    /// Returns 0 when the wait timed out.
    fn read_report(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize>;

    /// Timing budgets used by protocol code on this channel.
    fn timeouts(&self) -> Timeouts {
        Timeouts::default()
    }
}

/// Read and drop everything currently queued on the channel.
///
/// A frame left over from an abandoned exchange must not be taken as the
/// response to the next request. Returns the number of frames discarded.
pub fn discard_pending(transport: &dyn HidTransport) -> usize {
    let timeouts = transport.timeouts();
    let mut buf = [0u8; MAX_FRAME_LEN];
    let mut discarded = 0;

    while discarded < timeouts.max_drain_reads {
        match transport.read_report(&mut buf, timeouts.drain_poll_ms) {
            Ok(0) => break,
            Ok(n) => {
                trace!(
                    report_hex = format_args!("{:02X?}", &buf[..n.min(MAX_FRAME_LEN)]),
                    "HID++ discard"
                );
                discarded += 1;
            }
            Err(e) => {
                debug!(error = %e, "Read failed while draining channel");
                break;
            }
        }
    }

    if discarded > 0 {
        debug!(discarded, "Discarded stale input before send");
    }
    discarded
}

/// Send one message, writing exactly its frame length.
///
/// Pending input is always drained first.
pub fn send(transport: &dyn HidTransport, msg: &Message) -> Result<()> {
    let encoded = msg.encode()?;

    discard_pending(transport);

    trace!(
        device_index = msg.device_index(),
        report_hex = format_args!("{:02X?}", encoded),
        "HID++ TX"
    );

    let written = transport.write_report(&encoded)?;
    if written != encoded.len() {
        warn!(written, expected = encoded.len(), "Short HID write");
        return Err(Error::Transport(format!(
            "short write: {written} of {} bytes",
            encoded.len()
        )));
    }
    Ok(())
}

/// Wait up to `timeout_ms` for one frame.
///
/// A wait timeout or an empty read yields `Ok(None)`; the caller decides
/// whether to try again. A failing read primitive is an error.
pub fn receive(transport: &dyn HidTransport, timeout_ms: i32) -> Result<Option<Vec<u8>>> {
    let mut buf = [0u8; MAX_FRAME_LEN];
    match transport.read_report(&mut buf, timeout_ms) {
        Ok(0) => {
            trace!(timeout_ms, "poll timeout reached");
            Ok(None)
        }
        Ok(n) => {
            let n = n.min(MAX_FRAME_LEN);
            trace!(report_hex = format_args!("{:02X?}", &buf[..n]), "HID++ RX");
            Ok(Some(buf[..n].to_vec()))
        }
        Err(e) => {
            warn!(error = %e, "HID read failed");
            Err(e)
        }
    }
}
