//! Command-line harness: decode an image, run one RillNet pass, write the
//! rendered score map. All file I/O lives here; the core stays pure.

mod args;
mod bundle;

use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use image::GenericImageView;
use log::{debug, info};
use rillnet_core::graph::INPUT_SIZE;
use rillnet_core::run_inference;
use rillnet_utils::{
    flatten_samples, init_logging, load_image, resize_to_square, rgb_to_samples, samples_to_rgb,
    set_telemetry, RuntimeOptions,
};

use crate::args::InferArgs;
use crate::bundle::load_weight_bundle;

fn main() -> Result<()> {
    init_logging(log::LevelFilter::Info)?;
    let args = InferArgs::parse();

    let options = match &args.options {
        Some(path) => RuntimeOptions::load(path)
            .with_context(|| format!("failed to load options from {}", path.display()))?,
        None => RuntimeOptions::default(),
    };
    set_telemetry(options.telemetry);
    debug!("runtime options: {options:?}");

    let weights = load_weight_bundle(&args.weights)?;
    info!("loaded weight bundle from {}", args.weights.display());

    let image = load_image(&args.input)?;
    let rgb = resize_to_square(&image, INPUT_SIZE as u32);
    let input = flatten_samples(&rgb_to_samples(&rgb));
    let (source_w, source_h) = image.dimensions();
    info!(
        "running inference on {} ({source_w}x{source_h} source)",
        args.input.display()
    );

    let scores = run_inference(&input, &weights, &options)?;

    if let Some(path) = &args.scores {
        let floats: Vec<f32> = scores.iter().map(|s| s.to_f32()).collect();
        fs::write(path, bytemuck::cast_slice::<f32, u8>(&floats))
            .with_context(|| format!("failed to write raw scores to {}", path.display()))?;
        info!("wrote raw scores to {}", path.display());
    }

    let rendered = samples_to_rgb(&scores, INPUT_SIZE)?;
    rendered
        .save(&args.output)
        .with_context(|| format!("failed to write output image to {}", args.output.display()))?;
    info!("wrote score image to {}", args.output.display());

    Ok(())
}
