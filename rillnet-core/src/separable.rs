//! Depthwise-separable convolution: a per-channel spatial filter followed
//! by a 1×1 cross-channel mix.

use anyhow::Result;
use rillnet_utils::Fixed;

use crate::stream::{SampleSender, SampleSource};
use crate::window::PadWindow;

/// Geometry for a separable convolution stage.
#[derive(Debug, Clone, Copy)]
pub struct SeparableConfig {
    pub input_size: usize,
    pub kernel: usize,
    pub input_depth: usize,
    pub output_depth: usize,
}

impl SeparableConfig {
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

    /// Depthwise weight length, `[ky][kx][cin]`.
    pub fn depthwise_len(&self) -> usize {
        self.kernel * self.kernel * self.input_depth
    }

    /// Pointwise weight length, `[cin][cout]`.
    pub fn pointwise_len(&self) -> usize {
        self.input_depth * self.output_depth
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

/// Streaming separable convolution with the same border contract and
/// optional skip tap as the dense stage.
pub struct SeparableConv2d<'w> {
    config: SeparableConfig,
    depthwise: &'w [Fixed],
    pointwise: &'w [Fixed],
    bias: &'w [Fixed],
}

impl<'w> SeparableConv2d<'w> {
    pub fn new(
        config: SeparableConfig,
        depthwise: &'w [Fixed],
        pointwise: &'w [Fixed],
        bias: &'w [Fixed],
    ) -> Result<Self> {
        anyhow::ensure!(
            depthwise.len() == config.depthwise_len(),
            "depthwise weights expected {} elements, got {}",
            config.depthwise_len(),
            depthwise.len()
        );
        anyhow::ensure!(
            pointwise.len() == config.pointwise_len(),
            "pointwise weights expected {} elements, got {}",
            config.pointwise_len(),
            pointwise.len()
        );
        anyhow::ensure!(
            bias.len() == config.bias_len(),
            "bias expected {} elements, got {}",
            config.bias_len(),
            bias.len()
        );
        Ok(Self {
            config,
            depthwise,
            pointwise,
            bias,
        })
    }

    /// Run one full image pass.
    pub fn run<S: SampleSource>(
        &self,
        mut input: S,
        output: SampleSender,
        tap: Option<SampleSender>,
    ) {
        let SeparableConfig {
            input_size,
            kernel,
            input_depth,
            output_depth,
        } = self.config;
        let depthwise = self.depthwise;
        let pointwise = self.pointwise;
        let bias = self.bias;
        let mut per_channel = vec![Fixed::ZERO; input_depth];

        let window = PadWindow::new(kernel, input_size, input_depth);
        window.for_each_window(&mut input, |field| {
            // Stage one: each input channel against its own spatial kernel.
            for chn in 0..input_depth {
                let mut acc = Fixed::ZERO;
                for ky in 0..kernel {
                    for kx in 0..kernel {
                        let site = (ky * kernel + kx) * input_depth + chn;
                        acc += depthwise[site] * field[site];
                    }
                }
                per_channel[chn] = acc;
            }
            // Stage two: 1×1 cross-channel mix per output filter.
            for filter in 0..output_depth {
                let mut acc = Fixed::ZERO;
                for chn in 0..input_depth {
                    acc += pointwise[chn * output_depth + filter] * per_channel[chn];
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

    /// Brute-force depthwise-then-pointwise reference.
    fn reference(
        input: &[Fixed],
        cfg: &SeparableConfig,
        depthwise: &[Fixed],
        pointwise: &[Fixed],
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
                let mut mixed = vec![Fixed::ZERO; cin];
                for (chn, slot) in mixed.iter_mut().enumerate() {
                    let mut acc = Fixed::ZERO;
                    for ky in 0..k {
                        for kx in 0..k {
                            let r = x + ky as isize - half;
                            let c = y + kx as isize - half;
                            if r < 0 || c < 0 || r >= w as isize || c >= w as isize {
                                continue;
                            }
                            let sample = input[(r as usize * w + c as usize) * cin + chn];
                            acc += depthwise[(ky * k + kx) * cin + chn] * sample;
                        }
                    }
                    *slot = acc;
                }
                for f in 0..cout {
                    let mut acc = Fixed::ZERO;
                    for chn in 0..cin {
                        acc += pointwise[chn * cout + f] * mixed[chn];
                    }
                    out.push((acc + bias[f]).relu());
                }
            }
        }
        out
    }

    #[test]
    fn streamed_output_matches_brute_force() {
        let cfg = SeparableConfig::new(4, 3, 2, 3).expect("config");
        let input: Vec<Fixed> = (0..cfg.input_len())
            .map(|i| Fixed::from_f32(((i * 3) % 17) as f32 * 0.125 - 1.0))
            .collect();
        let depthwise: Vec<Fixed> = (0..cfg.depthwise_len())
            .map(|i| Fixed::from_f32(((i * 7) % 9) as f32 * 0.0625 - 0.25))
            .collect();
        let pointwise: Vec<Fixed> = (0..cfg.pointwise_len())
            .map(|i| Fixed::from_f32(((i * 5) % 7) as f32 * 0.125 - 0.375))
            .collect();
        let bias: Vec<Fixed> = (0..3).map(|i| Fixed::from_f32(i as f32 * 0.5 - 0.5)).collect();

        let sep =
            SeparableConv2d::new(cfg, &depthwise, &pointwise, &bias).expect("valid separable");
        let (tx, rx) = fifo(cfg.output_len());
        sep.run(IterSource(input.clone().into_iter()), tx, None);

        let streamed = rx.into_vec();
        let expected = reference(&input, &cfg, &depthwise, &pointwise, &bias);
        assert_eq!(streamed, expected);
    }

    #[test]
    fn tap_mirrors_the_output_stream() {
        let cfg = SeparableConfig::new(4, 3, 1, 2).expect("config");
        let input: Vec<Fixed> = (0..cfg.input_len())
            .map(|i| Fixed::from_int((i % 4) as i32))
            .collect();
        let depthwise = vec![Fixed::from_f32(0.25); cfg.depthwise_len()];
        let pointwise = vec![Fixed::from_f32(0.5); cfg.pointwise_len()];
        let bias = vec![Fixed::ZERO, Fixed::from_f32(0.25)];

        let sep =
            SeparableConv2d::new(cfg, &depthwise, &pointwise, &bias).expect("valid separable");
        let (tx, rx) = fifo(cfg.output_len());
        let (tap_tx, tap_rx) = fifo(cfg.output_len());
        sep.run(IterSource(input.into_iter()), tx, Some(tap_tx));

        assert_eq!(rx.into_vec(), tap_rx.into_vec());
    }

    #[test]
    fn rejects_mismatched_pointwise_shape() {
        let cfg = SeparableConfig::new(4, 3, 2, 2).expect("config");
        let depthwise = vec![Fixed::ZERO; cfg.depthwise_len()];
        let pointwise = vec![Fixed::ZERO; cfg.pointwise_len() + 1];
        let bias = vec![Fixed::ZERO; 2];
        assert!(SeparableConv2d::new(cfg, &depthwise, &pointwise, &bias).is_err());
    }
}
