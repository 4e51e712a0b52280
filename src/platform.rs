/// Platform services the core relies on: uptime, restart, and the task
/// watchdog.
///
/// Restarting is funnelled through [`escalate`]. No other code in the crate
/// calls [`Platform::restart`], which keeps the one irreversible action in a
/// single place that tests can intercept.
use crate::error::RestartReason;
use crate::protocol::{self, DeviceMessage};

/// Process-wide services provided by the firmware.
#[cfg_attr(test, mockall::automock)]
pub trait Platform {
    /// Milliseconds since boot.
    fn uptime_ms(&self) -> u64;

    /// Reset the whole device. On hardware this never returns.
    fn restart(&self, reason: &RestartReason);
}

/// Per-task handle on the platform watchdog. Each task feeds its own
/// subscription at least once per watchdog window.
pub trait Watchdog {
    fn feed(&mut self);
}

/// Watchdog for contexts without one (host tools, tests).
pub struct NoWatchdog;

impl Watchdog for NoWatchdog {
    fn feed(&mut self) {}
}

/// Log the reason, emit the restart telemetry line, and restart.
pub fn escalate<P: Platform + ?Sized>(platform: &P, reason: RestartReason) {
    let uptime_ms = platform.uptime_ms();
    match &reason {
        RestartReason::Scheduled { .. } => log::warn!("performing a routine restart"),
        RestartReason::Fatal(err) => log::error!("fatal: {}, restarting", err),
    }
    protocol::emit(&DeviceMessage::Restart {
        reason: reason.kind(),
        uptime: (uptime_ms / 1000) as u32,
    });
    platform.restart(&reason);
}
