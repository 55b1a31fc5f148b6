//! Transposed convolution: upsampling by scatter-accumulation.
//!
//! Instead of gathering a receptive field per output pixel, each input
//! pixel scatters its weighted kernel footprint into a rotating accumulator
//! of `kernel` output rows. Once an input row has fully scattered, the top
//! `stride` accumulator rows have received every contribution they will
//! ever get: they are rectified, emitted, and recycled. Accumulator depth
//! therefore stays at `kernel` rows whatever the output height.

use anyhow::Result;
use rillnet_utils::Fixed;

use crate::stream::{SampleSender, SampleSource};

/// Geometry for a transposed convolution stage.
#[derive(Debug, Clone, Copy)]
pub struct TransposeConfig {
    pub output_size: usize,
    pub kernel: usize,
    pub stride: usize,
    pub input_depth: usize,
    pub output_depth: usize,
}

impl TransposeConfig {
    pub fn new(
        output_size: usize,
        kernel: usize,
        stride: usize,
        input_depth: usize,
        output_depth: usize,
    ) -> Result<Self> {
        anyhow::ensure!(stride > 0, "stride must be > 0");
        anyhow::ensure!(input_depth > 0, "input depth must be > 0");
        anyhow::ensure!(output_depth > 0, "output depth must be > 0");
        anyhow::ensure!(
            kernel >= stride,
            "kernel {kernel} must cover the stride {stride}"
        );
        anyhow::ensure!(
            output_size > 0 && output_size % stride == 0,
            "output size {output_size} must be a multiple of the stride {stride}"
        );
        Ok(Self {
            output_size,
            kernel,
            stride,
            input_depth,
            output_depth,
        })
    }

    pub fn input_size(&self) -> usize {
        self.output_size / self.stride
    }

    /// Flat weight length, `[ky][kx][cout][cin]`.
    pub fn weight_len(&self) -> usize {
        self.kernel * self.kernel * self.output_depth * self.input_depth
    }

    pub fn bias_len(&self) -> usize {
        self.output_depth
    }

    pub fn input_len(&self) -> usize {
        let size = self.input_size();
        size * size * self.input_depth
    }

    pub fn output_len(&self) -> usize {
        self.output_size * self.output_size * self.output_depth
    }
}

/// Streaming transposed convolution stage.
pub struct TransposeConv2d<'w> {
    config: TransposeConfig,
    weights: &'w [Fixed],
    bias: &'w [Fixed],
}

impl<'w> TransposeConv2d<'w> {
    pub fn new(config: TransposeConfig, weights: &'w [Fixed], bias: &'w [Fixed]) -> Result<Self> {
        anyhow::ensure!(
            weights.len() == config.weight_len(),
            "transpose weights expected {} elements, got {}",
            config.weight_len(),
            weights.len()
        );
        anyhow::ensure!(
            bias.len() == config.bias_len(),
            "transpose bias expected {} elements, got {}",
            config.bias_len(),
            bias.len()
        );
        Ok(Self {
            config,
            weights,
            bias,
        })
    }

    /// Run one full image pass, upsampling by the configured stride.
    pub fn run<S: SampleSource>(&self, mut input: S, output: SampleSender) {
        let TransposeConfig {
            output_size: out,
            kernel,
            stride,
            input_depth,
            output_depth,
        } = self.config;
        let weights = self.weights;
        let bias = self.bias;

        // One spare column absorbs scatter past the right edge; it is never
        // emitted or re-biased.
        let acc_width = out + 1;
        let cell = |row: usize, col: usize, f: usize| (row * acc_width + col) * output_depth + f;

        let mut acc = vec![Fixed::ZERO; kernel * acc_width * output_depth];
        for row in 0..kernel {
            for col in 0..acc_width {
                for f in 0..output_depth {
                    acc[cell(row, col, f)] = bias[f];
                }
            }
        }

        let mut pixel = vec![Fixed::ZERO; input_depth];
        for _x in 0..self.config.input_size() {
            for y in (0..out).step_by(stride) {
                for slot in pixel.iter_mut() {
                    *slot = input.next_sample();
                }
                for f in 0..output_depth {
                    for ky in 0..kernel {
                        for kx in 0..kernel {
                            let mut contrib = Fixed::ZERO;
                            let base = ((ky * kernel + kx) * output_depth + f) * input_depth;
                            for (chn, &value) in pixel.iter().enumerate() {
                                contrib += weights[base + chn] * value;
                            }
                            let idx = cell(ky, y + kx, f);
                            acc[idx] = acc[idx] + contrib;
                        }
                    }
                }
            }
            // Emit the finalized top rows, then rotate: surviving partial
            // rows move up, vacated rows restart from the bias.
            for row in 0..kernel {
                for col in 0..out {
                    for f in 0..output_depth {
                        let idx = cell(row, col, f);
                        if row < stride {
                            output.push(acc[idx].relu());
                        }
                        acc[idx] = if row + stride < kernel {
                            acc[cell(row + stride, col, f)]
                        } else {
                            bias[f]
                        };
                    }
                }
            }
        }
    }
}
