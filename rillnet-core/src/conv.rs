//! Dense stride-1 convolution with fused bias and rectifier.

use anyhow::Result;
use rillnet_utils::Fixed;

use crate::stream::{SampleSender, SampleSource};
use crate::window::PadWindow;

/// Geometry for a dense convolution stage.
#[derive(Debug, Clone, Copy)]
pub struct ConvConfig {
    pub input_size: usize,
    pub kernel: usize,
    pub input_depth: usize,
    pub output_depth: usize,
}

impl ConvConfig {
    /// Create a validated convolution geometry.
    pub fn new(
        input_size: usize,
        kernel: usize,
        input_depth: usize,
        output_depth: usize,
    ) -> Result<Self> {
        anyhow::ensure!(input_size > 0, "input size must be > 0");
        anyhow::ensure!(input_depth > 0, "input depth must be > 0");
        anyhow::ensure!(output_depth > 0, "output depth must be > 0");
        anyhow::ensure!(
            kernel % 2 == 1,
            "kernel must be odd for same-size output (got {kernel})"
        );
        anyhow::ensure!(
            kernel <= input_size,
            "kernel {kernel} exceeds input size {input_size}"
        );
        Ok(Self {
            input_size,
            kernel,
            input_depth,
            output_depth,
        })
    }

    /// Flat weight length, `[ky][kx][cin][cout]`.
    pub fn weight_len(&self) -> usize {
        self.kernel * self.kernel * self.input_depth * self.output_depth
    }

    pub fn bias_len(&self) -> usize {
        self.output_depth
    }

    pub fn input_len(&self) -> usize {
        self.input_size * self.input_size * self.input_depth
    }

    pub fn output_len(&self) -> usize {
        self.input_size * self.input_size * self.output_depth
    }
}

/// Streaming convolution stage.
///
/// The optional tap mirrors every output sample in lockstep onto a second
/// edge for a downstream skip fuse; single- and dual-output uses share this
/// one implementation.
pub struct Conv2d<'w> {
    config: ConvConfig,
    weights: &'w [Fixed],
    bias: &'w [Fixed],
}

impl<'w> Conv2d<'w> {
    pub fn new(config: ConvConfig, weights: &'w [Fixed], bias: &'w [Fixed]) -> Result<Self> {
        anyhow::ensure!(
            weights.len() == config.weight_len(),
            "conv weights expected {} elements, got {}",
            config.weight_len(),
            weights.len()
        );
        anyhow::ensure!(
            bias.len() == config.bias_len(),
            "conv bias expected {} elements, got {}",
            config.bias_len(),
            bias.len()
        );
        Ok(Self {
            config,
            weights,
            bias,
        })
    }

    /// Run one full image pass: consumes `input_size² × input_depth`
    /// samples, emits `input_size² × output_depth` in the same order
    /// convention.
    pub fn run<S: SampleSource>(
        &self,
        mut input: S,
        output: SampleSender,
        tap: Option<SampleSender>,
    ) {
        let ConvConfig {
            input_size,
            kernel,
            input_depth,
            output_depth,
        } = self.config;
        let weights = self.weights;
        let bias = self.bias;

        let window = PadWindow::new(kernel, input_size, input_depth);
        window.for_each_window(&mut input, |field| {
            for filter in 0..output_depth {
                let mut acc = Fixed::ZERO;
                for chn in 0..input_depth {
                    for ky in 0..kernel {
                        for kx in 0..kernel {
                            let site = (ky * kernel + kx) * input_depth + chn;
                            acc += weights[site * output_depth + filter] * field[site];
                        }
                    }
                }
                let value = (acc + bias[filter]).relu();
                output.push(value);
                if let Some(tap) = &tap {
                    tap.push(value);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{fifo, IterSource};

    /// Brute-force same-convolution over a fully materialized map.
    fn reference(
        input: &[Fixed],
        cfg: &ConvConfig,
        weights: &[Fixed],
        bias: &[Fixed],
    ) -> Vec<Fixed> {
        let (w, k, cin, cout) = (
            cfg.input_size,
            cfg.kernel,
            cfg.input_depth,
            cfg.output_depth,
        );
        let half = (k / 2) as isize;
        let mut out = Vec::with_capacity(cfg.output_len());
        for x in 0..w as isize {
            for y in 0..w as isize {
                for f in 0..cout {
                    let mut acc = Fixed::ZERO;
                    for chn in 0..cin {
                        for ky in 0..k {
                            for kx in 0..k {
                                let r = x + ky as isize - half;
                                let c = y + kx as isize - half;
                                if r < 0 || c < 0 || r >= w as isize || c >= w as isize {
                                    continue;
                                }
                                let sample = input[(r as usize * w + c as usize) * cin + chn];
                                acc += weights[((ky * k + kx) * cin + chn) * cout + f] * sample;
                            }
                        }
                    }
                    out.push((acc + bias[f]).relu());
                }
            }
        }
        out
    }

    fn run_streamed(
        cfg: ConvConfig,
        input: Vec<Fixed>,
        weights: &[Fixed],
        bias: &[Fixed],
    ) -> Vec<Fixed> {
        let conv = Conv2d::new(cfg, weights, bias).expect("valid conv");
        let (tx, rx) = fifo(cfg.output_len());
        conv.run(IterSource(input.into_iter()), tx, None);
        rx.into_vec()
    }

    #[test]
    fn streamed_output_matches_brute_force_4x4() {
        let cfg = ConvConfig::new(4, 3, 1, 1).expect("config");
        let input: Vec<Fixed> = (0..16).map(|i| Fixed::from_int(i - 8)).collect();
        let weights: Vec<Fixed> = (0..9).map(|i| Fixed::from_f32(0.125 * (i as f32 - 4.0))).collect();
        let bias = vec![Fixed::from_f32(0.5)];

        let streamed = run_streamed(cfg, input.clone(), &weights, &bias);
        let expected = reference(&input, &cfg, &weights, &bias);
        assert_eq!(streamed, expected);
    }

    #[test]
    fn streamed_output_matches_brute_force_multichannel() {
        let cfg = ConvConfig::new(5, 3, 2, 3).expect("config");
        let input: Vec<Fixed> = (0..cfg.input_len())
            .map(|i| Fixed::from_f32(((i * 7) % 13) as f32 * 0.25 - 1.5))
            .collect();
        let weights: Vec<Fixed> = (0..cfg.weight_len())
            .map(|i| Fixed::from_f32(((i * 5) % 11) as f32 * 0.0625 - 0.3125))
            .collect();
        let bias: Vec<Fixed> = (0..3).map(|i| Fixed::from_f32(i as f32 * 0.25 - 0.25)).collect();

        let streamed = run_streamed(cfg, input.clone(), &weights, &bias);
        let expected = reference(&input, &cfg, &weights, &bias);
        assert_eq!(streamed, expected);
    }

    #[test]
    fn tap_mirrors_the_output_stream() {
        let cfg = ConvConfig::new(4, 3, 1, 2).expect("config");
        let input: Vec<Fixed> = (0..16).map(|i| Fixed::from_int(i % 5)).collect();
        let weights = vec![Fixed::from_f32(0.25); cfg.weight_len()];
        let bias = vec![Fixed::from_f32(-0.5), Fixed::from_f32(0.5)];

        let conv = Conv2d::new(cfg, &weights, &bias).expect("valid conv");
        let (tx, rx) = fifo(cfg.output_len());
        let (tap_tx, tap_rx) = fifo(cfg.output_len());
        conv.run(IterSource(input.into_iter()), tx, Some(tap_tx));

        let main = rx.into_vec();
        let tapped = tap_rx.into_vec();
        assert_eq!(main.len(), cfg.output_len());
        assert_eq!(main, tapped);
    }

    #[test]
    fn rejects_mismatched_weight_shapes() {
        let cfg = ConvConfig::new(4, 3, 1, 1).expect("config");
        let weights = vec![Fixed::ZERO; cfg.weight_len() - 1];
        let bias = vec![Fixed::ZERO];
        assert!(Conv2d::new(cfg, &weights, &bias).is_err());
    }
}
