//! Runtime options shared by the pipeline and the harness.
//!
//! Options tune scheduling slack and the output-head activation; none of
//! them changes the order or count of samples crossing any stream edge.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fixed::Fixed;

/// Nonlinearity applied by the output head to each class score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Emit the raw biased score.
    #[default]
    Identity,
    /// Logistic squash, computed through `f32` and re-quantized.
    Sigmoid,
}

impl Activation {
    /// Apply the activation to one score.
    pub fn apply(self, value: Fixed) -> Fixed {
        match self {
            Activation::Identity => value,
            Activation::Sigmoid => {
                let x = value.to_f32();
                Fixed::from_f32(1.0 / (1.0 + (-x).exp()))
            }
        }
    }
}

/// Tunables for one inference run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Output-head nonlinearity.
    pub head_activation: Activation,
    /// Capacity of ordinary stream edges, in rows of the producing stage.
    pub fifo_slack_rows: usize,
    /// Emit per-stage timing logs under the `rillnet::telemetry` target.
    pub telemetry: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            head_activation: Activation::Identity,
            fifo_slack_rows: 4,
            telemetry: false,
        }
    }
}

/// Failure to read or parse an options file.
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("failed to read options file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse options file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl RuntimeOptions {
    /// Load options from a JSON file; absent fields keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, OptionsError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
