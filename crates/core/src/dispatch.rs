//! Blocking request/response dispatch.
//!
//! One channel carries both synchronous replies and asynchronous
//! notifications. `read_matching` keeps reading frames until a
//! [`ResponseFilter`] claims one, handing notifications to a
//! [`NotificationSink`] on the way. The total wait is bounded by the
//! caller's budget no matter how many frames arrive in between.

use crate::error::{Error, Result};
use crate::hidpp::{is_valid_device_index, Message, RECEIVER_INDEX};
use crate::transport::{self, HidTransport};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// What a filter decided about a received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The awaited response; stop reading.
    Matched,
    /// Not the response, but the sink should see it.
    Notification,
    /// Not interesting; keep waiting.
    Discarded,
}

/// Decides whether a received frame answers the outstanding request.
pub trait ResponseFilter {
    fn classify(&self, msg: &Message) -> Disposition;
}

/// Receives notifications seen while a request is outstanding.
pub trait NotificationSink {
    fn notify(&mut self, msg: &Message);
}

impl<F: FnMut(&Message)> NotificationSink for F {
    fn notify(&mut self, msg: &Message) {
        self(msg)
    }
}

/// Sink that drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreNotifications;

impl NotificationSink for IgnoreNotifications {
    fn notify(&mut self, _msg: &Message) {}
}

/// Why a received frame never reached the filter.
fn reject_reason(msg: &Message) -> Option<&'static str> {
    if msg.is_hidpp() {
        let ix = msg.device_index();
        if !is_valid_device_index(ix) && ix != RECEIVER_INDEX {
            return Some("invalid device index");
        }
    }
    None
}

/// Read frames until `filter` matches one or `timeout_ms` elapses.
///
/// Frames too short to be a HID++ short report are dropped, as are HID++
/// frames with a device index outside 1..=6 and 0xFF. Frames of other
/// report kinds still go to the filter. A failing read ends the wait with
/// `Error::Transport`.
pub fn read_matching(
    transport: &dyn HidTransport,
    timeout_ms: u64,
    filter: &dyn ResponseFilter,
    sink: &mut dyn NotificationSink,
) -> Result<Message> {
    let budget = Duration::from_millis(timeout_ms);
    let started = Instant::now();

    loop {
        let elapsed = started.elapsed();
        let remaining_ms = budget.saturating_sub(elapsed).as_millis();
        if remaining_ms == 0 {
            debug!(timeout_ms, "No matching HID++ response before timeout");
            return Err(Error::Timeout(format!(
                "no matching response within {timeout_ms} ms"
            )));
        }
        let wait_ms = i32::try_from(remaining_ms).unwrap_or(i32::MAX);

        let Some(raw) = transport::receive(transport, wait_ms)? else {
            continue;
        };

        let msg = match Message::decode(&raw) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(error = %e, len = raw.len(), "Dropping malformed frame");
                continue;
            }
        };

        if let Some(reason) = reject_reason(&msg) {
            debug!(
                device_index = msg.device_index(),
                reason, "Dropping HID++ frame"
            );
            continue;
        }

        match filter.classify(&msg) {
            Disposition::Matched => {
                trace!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "HID++ response matched"
                );
                return Ok(msg);
            }
            Disposition::Notification => sink.notify(&msg),
            Disposition::Discarded => {}
        }
    }
}
