//! Elementwise skip fuse: ReLU(a + b).

use anyhow::Result;
use rillnet_utils::Fixed;

use crate::stream::{SampleSender, SampleSource};

/// Geometry for a skip-fuse stage.
#[derive(Debug, Clone, Copy)]
pub struct AddConfig {
    pub size: usize,
    pub depth: usize,
}

impl AddConfig {
    pub fn new(size: usize, depth: usize) -> Result<Self> {
        anyhow::ensure!(size > 0, "size must be > 0");
        anyhow::ensure!(depth > 0, "depth must be > 0");
        Ok(Self { size, depth })
    }

    pub fn len(&self) -> usize {
        self.size * self.size * self.depth
    }
}

/// Fuses two equal-shaped streams strictly position-for-position.
///
/// Both producers must emit in the same row-major channel-fastest order;
/// there is no reordering or buffering tolerance.
pub struct AddRelu {
    config: AddConfig,
}

impl AddRelu {
    pub fn new(config: AddConfig) -> AddRelu {
        AddRelu { config }
    }

    /// Run one full image pass over both inputs.
    pub fn run<A, B>(&self, mut skip: A, mut main: B, output: SampleSender)
    where
        A: SampleSource,
        B: SampleSource,
    {
        for _ in 0..self.config.len() {
            let a = skip.next_sample();
            let b = main.next_sample();
            output.push((a + b).relu());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{fifo, IterSource};

    #[test]
    fn ones_plus_twos_gives_threes_everywhere() {
        let cfg = AddConfig::new(2, 1).expect("config");
        let ones = vec![Fixed::ONE; cfg.len()];
        let twos = vec![Fixed::from_int(2); cfg.len()];

        let (tx, rx) = fifo(cfg.len());
        AddRelu::new(cfg).run(
            IterSource(ones.into_iter()),
            IterSource(twos.into_iter()),
            tx,
        );
        let out = rx.into_vec();
        assert_eq!(out, vec![Fixed::from_int(3); cfg.len()]);
    }

    #[test]
    fn negative_sums_clamp_to_zero() {
        let cfg = AddConfig::new(1, 2).expect("config");
        let a = vec![Fixed::from_int(-2), Fixed::from_int(1)];
        let b = vec![Fixed::ONE, Fixed::ONE];

        let (tx, rx) = fifo(cfg.len());
        AddRelu::new(cfg).run(IterSource(a.into_iter()), IterSource(b.into_iter()), tx);
        assert_eq!(rx.into_vec(), vec![Fixed::ZERO, Fixed::from_int(2)]);
    }
}
