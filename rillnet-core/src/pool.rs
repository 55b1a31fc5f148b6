//! Non-overlapping max pooling.

use anyhow::Result;
use rillnet_utils::Fixed;

use crate::stream::{SampleSender, SampleSource};
use crate::window::PoolWindow;

/// Geometry for a pooling stage.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub input_size: usize,
    pub pool: usize,
    pub depth: usize,
}

impl PoolConfig {
    pub fn new(input_size: usize, pool: usize, depth: usize) -> Result<Self> {
        anyhow::ensure!(pool > 1, "pool size must be > 1 (got {pool})");
        anyhow::ensure!(depth > 0, "depth must be > 0");
        anyhow::ensure!(
            input_size > 0 && input_size % pool == 0,
            "input size {input_size} must divide evenly into {pool}x{pool} blocks"
        );
        Ok(Self {
            input_size,
            pool,
            depth,
        })
    }

    pub fn output_size(&self) -> usize {
        self.input_size / self.pool
    }

    pub fn input_len(&self) -> usize {
        self.input_size * self.input_size * self.depth
    }

    pub fn output_len(&self) -> usize {
        let out = self.output_size();
        out * out * self.depth
    }
}

/// Streaming max pool: stride equals the pool size, no padding.
pub struct MaxPool2d {
    config: PoolConfig,
}

impl MaxPool2d {
    pub fn new(config: PoolConfig) -> MaxPool2d {
        MaxPool2d { config }
    }

    /// Run one full image pass, reducing each `pool × pool` block to its
    /// per-channel maximum.
    pub fn run<S: SampleSource>(&self, mut input: S, output: SampleSender) {
        let PoolConfig {
            input_size,
            pool,
            depth,
        } = self.config;

        let mut window = PoolWindow::new(pool, input_size, depth);
        for _block in 0..input_size / pool {
            window.fill(&mut input);
            for y in 0..input_size - pool + 1 {
                if y % pool == 0 {
                    let field = window.window();
                    for chn in 0..depth {
                        let mut best = Fixed::MIN;
                        for row in 0..pool {
                            for col in 0..pool {
                                let v = field[(row * pool + col) * depth + chn];
                                if best < v {
                                    best = v;
                                }
                            }
                        }
                        output.push(best);
                    }
                }
                if y != input_size - pool {
                    window.shift(&mut input);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{fifo, IterSource};

    fn run_pool(cfg: PoolConfig, input: Vec<Fixed>) -> Vec<Fixed> {
        let pool = MaxPool2d::new(cfg);
        let (tx, rx) = fifo(cfg.output_len());
        pool.run(IterSource(input.into_iter()), tx);
        rx.into_vec()
    }

    #[test]
    fn each_output_cell_is_its_block_max() {
        let cfg = PoolConfig::new(4, 2, 1).expect("config");
        #[rustfmt::skip]
        let input: Vec<Fixed> = [
            1, 5, 2, 0,
            3, 4, 8, 1,
            0, 9, 1, 1,
            7, 2, 3, 6,
        ]
        .iter()
        .map(|&v| Fixed::from_int(v))
        .collect();

        let out = run_pool(cfg, input);
        let expected: Vec<Fixed> = [5, 8, 9, 6].iter().map(|&v| Fixed::from_int(v)).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn channels_pool_independently() {
        let cfg = PoolConfig::new(2, 2, 2).expect("config");
        // One 2x2 block, two channels interleaved.
        let input: Vec<Fixed> = [
            (1, 40), (2, 30),
            (3, 20), (4, 10),
        ]
        .iter()
        .flat_map(|&(a, b)| [Fixed::from_int(a), Fixed::from_int(b)])
        .collect();

        let out = run_pool(cfg, input);
        assert_eq!(out, vec![Fixed::from_int(4), Fixed::from_int(40)]);
    }

    #[test]
    fn negative_blocks_keep_their_true_max() {
        let cfg = PoolConfig::new(2, 2, 1).expect("config");
        let input: Vec<Fixed> = [-5, -2, -9, -3].iter().map(|&v| Fixed::from_int(v)).collect();
        let out = run_pool(cfg, input);
        assert_eq!(out, vec![Fixed::from_int(-2)]);
    }

    #[test]
    fn rejects_indivisible_input() {
        assert!(PoolConfig::new(5, 2, 1).is_err());
    }
}
