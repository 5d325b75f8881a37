//! Fixed waits for host rendering steps that expose no completion signal.
//!
//! Timings are approximate; only their order of magnitude matters.

use std::time::Duration;

/// Before clicking the confirmation control of a command dialog.
pub const CONFIRM_SETTLE: Duration = Duration::from_millis(750);
/// Before re-reading or re-applying view state after a mode switch.
pub const VIEW_SETTLE: Duration = Duration::from_millis(10);

pub async fn settle(delay: Duration) {
    tracing::trace!(?delay, "settling");
    tokio::time::sleep(delay).await;
}
