//! Streaming fixed-point inference core for the RillNet segmentation
//! network.
//!
//! The network is a fixed encoder/decoder graph processed as ordered
//! scalar streams: each stage holds a kernel-sized window plus a few line
//! rings instead of a feature map, so live memory is O(kernel × width ×
//! depth) regardless of image height. Stages run concurrently behind
//! bounded FIFOs; [`run_inference`] is the single entry point.

/// Elementwise skip fuse.
pub mod add;
/// Dense stride-1 convolution.
pub mod conv;
/// The fixed wiring table and weight bundle.
pub mod graph;
/// Per-pixel output head.
pub mod head;
/// Graph composition and the inference entry point.
pub mod pipeline;
/// Non-overlapping max pooling.
pub mod pool;
/// Depthwise-separable convolution.
pub mod separable;
/// Bounded sample FIFOs between stages.
pub mod stream;
/// Transposed convolution (upsampling).
pub mod transpose;
/// Shared sliding-window and line-buffer state machines.
pub mod window;

pub use add::{AddConfig, AddRelu};
pub use conv::{Conv2d, ConvConfig};
pub use graph::{
    bundle_len, input_sample_count, output_sample_count, LayerKind, LayerShape, LayerWeights,
    NetworkWeights, SeparableWeights, CLASS_COUNT, INPUT_DEPTH, INPUT_SIZE, WEIGHT_LAYERS,
};
pub use head::{HeadConfig, OutputHead};
pub use pipeline::run_inference;
pub use pool::{MaxPool2d, PoolConfig};
pub use separable::{SeparableConfig, SeparableConv2d};
pub use stream::{fifo, IterSource, SampleReceiver, SampleSender, SampleSource};
pub use transpose::{TransposeConfig, TransposeConv2d};
pub use window::{Borders, PadWindow, PoolWindow};

pub use rillnet_utils::{Activation, Fixed, RuntimeOptions};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
