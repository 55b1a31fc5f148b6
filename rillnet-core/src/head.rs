//! Output head: per-pixel cross-channel convolution producing class scores.
//!
//! The head needs no spatial window; it reads one pixel's channel vector
//! at a time. The final nonlinearity is a configurable toggle rather than a
//! fixed choice, and the default leaves the biased scores untouched.

use anyhow::Result;
use rillnet_utils::{Activation, Fixed};

use crate::stream::{SampleSender, SampleSource};

/// Geometry and activation for the output head.
#[derive(Debug, Clone, Copy)]
pub struct HeadConfig {
    pub input_size: usize,
    pub kernel: usize,
    pub input_depth: usize,
    pub output_depth: usize,
    pub activation: Activation,
}

impl HeadConfig {
    pub fn new(
        input_size: usize,
        kernel: usize,
        input_depth: usize,
        output_depth: usize,
        activation: Activation,
    ) -> Result<Self> {
        anyhow::ensure!(input_size > 0, "input size must be > 0");
        anyhow::ensure!(kernel > 0, "kernel must be > 0");
        anyhow::ensure!(input_depth > 0, "input depth must be > 0");
        anyhow::ensure!(output_depth > 0, "output depth must be > 0");
        Ok(Self {
            input_size,
            kernel,
            input_depth,
            output_depth,
            activation,
        })
    }

    /// Flat weight length, `[ky][kx][cin][cout]`.
    pub fn weight_len(&self) -> usize {
        self.kernel * self.kernel * self.input_depth * self.output_depth
    }

    pub fn bias_len(&self) -> usize {
        self.output_depth
    }

    pub fn output_len(&self) -> usize {
        self.input_size * self.input_size * self.output_depth
    }
}

/// Streaming output head.
pub struct OutputHead<'w> {
    config: HeadConfig,
    weights: &'w [Fixed],
    bias: &'w [Fixed],
}

impl<'w> OutputHead<'w> {
    pub fn new(config: HeadConfig, weights: &'w [Fixed], bias: &'w [Fixed]) -> Result<Self> {
        anyhow::ensure!(
            weights.len() == config.weight_len(),
            "head weights expected {} elements, got {}",
            config.weight_len(),
            weights.len()
        );
        anyhow::ensure!(
            bias.len() == config.bias_len(),
            "head bias expected {} elements, got {}",
            config.bias_len(),
            bias.len()
        );
        Ok(Self {
            config,
            weights,
            bias,
        })
    }

    /// Run one full image pass, emitting `output_depth` scores per pixel.
    pub fn run<S: SampleSource>(&self, mut input: S, output: SampleSender) {
        let HeadConfig {
            input_size,
            kernel,
            input_depth,
            output_depth,
            activation,
        } = self.config;
        let weights = self.weights;
        let bias = self.bias;

        let mut pixel = vec![Fixed::ZERO; input_depth];
        for _ in 0..input_size * input_size {
            for slot in pixel.iter_mut() {
                *slot = input.next_sample();
            }
            for filter in 0..output_depth {
                let mut acc = Fixed::ZERO;
                for (chn, &value) in pixel.iter().enumerate() {
                    for ky in 0..kernel {
                        for kx in 0..kernel {
                            acc +=
                                weights[((ky * kernel + kx) * input_depth + chn) * output_depth
                                    + filter]
                                    * value;
                        }
                    }
                }
                acc += bias[filter];
                output.push(activation.apply(acc));
            }
        }
    }
}
