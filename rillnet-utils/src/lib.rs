//! Common helpers shared across RillNet crates.

/// Fixed-point sample arithmetic.
pub mod fixed;
/// Image decoding and sample-order conversion for the harness.
pub mod image_utils;
/// Runtime options and the output-head activation toggle.
pub mod options;
/// Instrumentation helpers for optional performance tracing.
pub mod telemetry;

use anyhow::Result;
use log::LevelFilter;

pub use fixed::Fixed;
pub use image_utils::{
    flatten_samples, load_image, resize_to_square, rgb_to_samples, samples_to_rgb,
};
pub use options::{Activation, OptionsError, RuntimeOptions};
pub use telemetry::{set_telemetry, telemetry_enabled, timing_guard, TimingGuard};

/// Initialize logging once for binaries and tests.
///
/// Respects `RUST_LOG` when set; otherwise falls back to `default_filter`.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.filter_module("rillnet::telemetry", LevelFilter::Trace);

    if builder.try_init().is_err() {
        // Logger already initialized; nothing to do.
    }
    Ok(())
}
