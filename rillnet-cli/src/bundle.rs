//! Raw weight-bundle loading.
//!
//! A bundle is a flat little-endian `f32` file holding every stage's
//! constants in graph order, weights before bias within a stage. Values
//! are quantized to [`Fixed`] at load; the total length is validated
//! against the wiring table before any stage is built.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rillnet_core::graph::{bundle_len, NetworkWeights};
use rillnet_utils::Fixed;

/// Load and quantize a weight bundle.
pub fn load_weight_bundle<P: AsRef<Path>>(path: P) -> Result<NetworkWeights> {
    let path = path.as_ref();
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read weight bundle {}", path.display()))?;
    anyhow::ensure!(
        bytes.len() % 4 == 0,
        "weight bundle {} is not a whole number of f32 values",
        path.display()
    );
    let floats: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes);
    anyhow::ensure!(
        floats.len() == bundle_len(),
        "weight bundle {} holds {} values, expected {}",
        path.display(),
        floats.len(),
        bundle_len()
    );

    let samples: Vec<Fixed> = floats.iter().map(|&v| Fixed::from_f32(v)).collect();
    NetworkWeights::from_flat(&samples)
        .with_context(|| format!("weight bundle {} does not match the network", path.display()))
}
