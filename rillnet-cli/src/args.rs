use std::path::PathBuf;

use clap::Parser;

/// Run RillNet segmentation over one image.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct InferArgs {
    /// Path to the input image (any format the `image` crate decodes).
    #[arg(short, long)]
    pub input: PathBuf,

    /// Path to the raw little-endian f32 weight bundle.
    #[arg(short, long)]
    pub weights: PathBuf,

    /// Where to write the rendered score image.
    #[arg(short, long, default_value = "rillnet_out.png")]
    pub output: PathBuf,

    /// Optional runtime options JSON.
    #[arg(long)]
    pub options: Option<PathBuf>,

    /// Also dump the raw scores as little-endian f32.
    #[arg(long)]
    pub scores: Option<PathBuf>,
}
