//! Optional per-stage timing instrumentation.
//!
//! A [`TimingGuard`] measures a scoped operation and logs the elapsed time
//! under the `rillnet::telemetry` target when dropped. Guards are inert
//! unless telemetry has been switched on and the requested log level passes
//! the current filter, so leaving them in hot paths costs an `Instant` read.

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{log, log_enabled, Level};

static TELEMETRY_ENABLED: AtomicBool = AtomicBool::new(false);

const TARGET: &str = "rillnet::telemetry";

/// RAII guard that logs its lifetime duration on drop.
pub struct TimingGuard {
    label: Cow<'static, str>,
    level: Level,
    start: Instant,
    active: bool,
}

impl TimingGuard {
    /// Returns `true` when the guard will emit a log entry on drop.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        if self.active {
            log!(
                target: TARGET,
                self.level,
                "{} completed in {:.2?}",
                self.label,
                self.start.elapsed()
            );
        }
    }
}

/// Create a guard for `label` that logs at `level` when telemetry is on.
pub fn timing_guard(label: impl Into<Cow<'static, str>>, level: Level) -> TimingGuard {
    let active = telemetry_enabled() && log_enabled!(target: TARGET, level);
    TimingGuard {
        label: label.into(),
        level,
        start: Instant::now(),
        active,
    }
}

/// Switch stage timing logs on or off for the whole process.
pub fn set_telemetry(enabled: bool) {
    TELEMETRY_ENABLED.store(enabled, Ordering::Relaxed);
}

/// Returns whether timing logs are currently enabled.
pub fn telemetry_enabled() -> bool {
    TELEMETRY_ENABLED.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_stay_inert_until_enabled() {
        set_telemetry(false);
        let guard = timing_guard("test op", Level::Debug);
        assert!(!guard.is_active());
    }

    #[test]
    fn toggle_round_trips() {
        set_telemetry(true);
        assert!(telemetry_enabled());
        set_telemetry(false);
        assert!(!telemetry_enabled());
    }
}
