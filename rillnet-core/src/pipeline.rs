//! The fixed dataflow graph and the inference entry point.
//!
//! Fifteen stages run as scoped threads joined by bounded FIFOs. Every
//! stage blocks reading an empty edge or writing a full one; that
//! back-pressure is the only synchronization. The graph is feed-forward,
//! so the pass deadlocks only if a skip edge cannot hold the encoder's
//! lead over the decoder; those two edges get measured capacities, all
//! others a few rows of slack. Output is a pure function of input and
//! weights: bit-identical across runs regardless of scheduling.

use std::thread;

use anyhow::{Context, Result};
use log::debug;
use rillnet_utils::telemetry::timing_guard;
use rillnet_utils::{Fixed, RuntimeOptions};

use crate::add::{AddConfig, AddRelu};
use crate::conv::{Conv2d, ConvConfig};
use crate::graph::{
    input_sample_count, output_sample_count, NetworkWeights, CLASS_COUNT, HEAD_KERNEL,
    INPUT_DEPTH, INPUT_SIZE, KERNEL, POOL, UPSTRIDE,
};
use crate::head::{HeadConfig, OutputHead};
use crate::pool::{MaxPool2d, PoolConfig};
use crate::separable::{SeparableConfig, SeparableConv2d};
use crate::stream::fifo;
use crate::transpose::{TransposeConfig, TransposeConv2d};

/// Rows of capacity on the first skip edge (256×16). The decoder's first
/// output waits on roughly thirty encoder input rows, so the tap must
/// absorb that lead without stalling the encoder.
const SKIP1_ROWS: usize = 48;
/// Rows of capacity on the second skip edge (64×48); lead is about seven
/// rows at that scale.
const SKIP2_ROWS: usize = 16;

/// Run one full inference pass.
///
/// `input` is the flattened 256×256×3 image in row-major channel-fastest
/// order; the result is the flattened 256×256×3 score map in the same
/// order. Shape validation happens before any stage starts; the streaming
/// pass itself has no recoverable error states.
pub fn run_inference(
    input: &[Fixed],
    weights: &NetworkWeights,
    options: &RuntimeOptions,
) -> Result<Vec<Fixed>> {
    let _guard = timing_guard("rillnet_core::run_inference", log::Level::Debug);
    anyhow::ensure!(
        input.len() == input_sample_count(),
        "input expected {} samples, got {}",
        input_sample_count(),
        input.len()
    );
    weights
        .validate()
        .context("network weights do not match the wiring table")?;

    // Build every stage up front so shape errors surface before any thread
    // starts.
    let conv0 = Conv2d::new(
        ConvConfig::new(INPUT_SIZE, KERNEL, INPUT_DEPTH, 16)?,
        &weights.conv0.weights,
        &weights.conv0.bias,
    )?;
    let pool0 = MaxPool2d::new(PoolConfig::new(INPUT_SIZE, POOL, 16)?);
    let sep1 = SeparableConv2d::new(
        SeparableConfig::new(128, KERNEL, 16, 32)?,
        &weights.sep1.depthwise,
        &weights.sep1.pointwise,
        &weights.sep1.bias,
    )?;
    let pool1 = MaxPool2d::new(PoolConfig::new(128, POOL, 32)?);
    let sep2 = SeparableConv2d::new(
        SeparableConfig::new(64, KERNEL, 32, 48)?,
        &weights.sep2.depthwise,
        &weights.sep2.pointwise,
        &weights.sep2.bias,
    )?;
    let pool2 = MaxPool2d::new(PoolConfig::new(64, POOL, 48)?);
    let sep3 = SeparableConv2d::new(
        SeparableConfig::new(32, KERNEL, 48, 64)?,
        &weights.sep3.depthwise,
        &weights.sep3.pointwise,
        &weights.sep3.bias,
    )?;
    let pool3 = MaxPool2d::new(PoolConfig::new(32, POOL, 64)?);
    let up4 = TransposeConv2d::new(
        TransposeConfig::new(32, KERNEL, UPSTRIDE, 64, 64)?,
        &weights.up4.weights,
        &weights.up4.bias,
    )?;
    let up5 = TransposeConv2d::new(
        TransposeConfig::new(64, KERNEL, UPSTRIDE, 64, 48)?,
        &weights.up5.weights,
        &weights.up5.bias,
    )?;
    let fuse2 = AddRelu::new(AddConfig::new(64, 48)?);
    let up6 = TransposeConv2d::new(
        TransposeConfig::new(128, KERNEL, UPSTRIDE, 48, 32)?,
        &weights.up6.weights,
        &weights.up6.bias,
    )?;
    let up7 = TransposeConv2d::new(
        TransposeConfig::new(INPUT_SIZE, KERNEL, UPSTRIDE, 32, 16)?,
        &weights.up7.weights,
        &weights.up7.bias,
    )?;
    let fuse1 = AddRelu::new(AddConfig::new(INPUT_SIZE, 16)?);
    let head = OutputHead::new(
        HeadConfig::new(INPUT_SIZE, HEAD_KERNEL, 16, CLASS_COUNT, options.head_activation)?,
        &weights.head8.weights,
        &weights.head8.bias,
    )?;

    let slack = options.fifo_slack_rows.max(2);
    let rows = |size: usize, depth: usize, n: usize| size * depth * n;

    debug!(
        target: "rillnet::pipeline",
        "starting dataflow pass ({} input samples, slack {} rows)",
        input.len(),
        slack
    );

    let output = thread::scope(|scope| {
        let (in_tx, in_rx) = fifo(rows(256, INPUT_DEPTH, slack));
        let (s0_tx, s0_rx) = fifo(rows(256, 16, slack));
        let (skip1_tx, skip1_rx) = fifo(rows(256, 16, SKIP1_ROWS));
        let (s1_tx, s1_rx) = fifo(rows(128, 32, slack));
        let (s2_tx, s2_rx) = fifo(rows(128, 32, slack));
        let (s3_tx, s3_rx) = fifo(rows(64, 48, slack));
        let (s4_tx, s4_rx) = fifo(rows(64, 48, slack));
        let (skip2_tx, skip2_rx) = fifo(rows(64, 48, SKIP2_ROWS));
        let (s5_tx, s5_rx) = fifo(rows(32, 64, slack));
        let (s6_tx, s6_rx) = fifo(rows(32, 64, slack));
        let (s7_tx, s7_rx) = fifo(rows(16, 64, slack));
        let (s8_tx, s8_rx) = fifo(rows(32, 64, slack));
        let (s9_tx, s9_rx) = fifo(rows(64, 48, slack));
        let (s10_tx, s10_rx) = fifo(rows(64, 48, slack));
        let (s11_tx, s11_rx) = fifo(rows(128, 32, slack));
        let (s12_tx, s12_rx) = fifo(rows(256, 16, slack));
        let (s13_tx, s13_rx) = fifo(rows(256, 16, slack));
        let (out_tx, out_rx) = fifo(rows(256, CLASS_COUNT, slack));

        // Feed the flattened image into the first edge.
        scope.spawn(move || {
            for &sample in input {
                in_tx.push(sample);
            }
        });

        // Encoder.
        scope.spawn(move || conv0.run(in_rx, s0_tx, Some(skip1_tx)));
        scope.spawn(move || pool0.run(s0_rx, s1_tx));
        scope.spawn(move || sep1.run(s1_rx, s2_tx, None));
        scope.spawn(move || pool1.run(s2_rx, s3_tx));
        scope.spawn(move || sep2.run(s3_rx, s4_tx, Some(skip2_tx)));
        scope.spawn(move || pool2.run(s4_rx, s5_tx));
        scope.spawn(move || sep3.run(s5_rx, s6_tx, None));
        scope.spawn(move || pool3.run(s6_rx, s7_tx));

        // Decoder.
        scope.spawn(move || up4.run(s7_rx, s8_tx));
        scope.spawn(move || up5.run(s8_rx, s9_tx));
        scope.spawn(move || fuse2.run(skip2_rx, s9_rx, s10_tx));
        scope.spawn(move || up6.run(s10_rx, s11_tx));
        scope.spawn(move || up7.run(s11_rx, s12_tx));
        scope.spawn(move || fuse1.run(skip1_rx, s12_rx, s13_tx));
        scope.spawn(move || head.run(s13_rx, out_tx));

        out_rx.into_vec()
    });

    anyhow::ensure!(
        output.len() == output_sample_count(),
        "pipeline emitted {} samples, expected {}",
        output.len(),
        output_sample_count()
    );
    Ok(output)
}
