//! The fixed encoder/decoder wiring table and the network weight bundle.
//!
//! The architecture is configuration data: a constant table of stage
//! shapes. [`NetworkWeights`] is validated against it once, when built.
//! A shape mismatch is a configuration error and never surfaces while the
//! streams are running.

use anyhow::Result;
use rillnet_utils::Fixed;

/// Input feature-map edge length.
pub const INPUT_SIZE: usize = 256;
/// Input channels.
pub const INPUT_DEPTH: usize = 3;
/// Output class channels.
pub const CLASS_COUNT: usize = 3;
/// Spatial kernel of every convolution stage.
pub const KERNEL: usize = 3;
/// Head kernel (per-pixel cross-channel mix).
pub const HEAD_KERNEL: usize = 1;
/// Pooling window and stride.
pub const POOL: usize = 2;
/// Upsampling stride of the decoder stages.
pub const UPSTRIDE: usize = 2;

/// Samples in one flattened input image.
pub const fn input_sample_count() -> usize {
    INPUT_SIZE * INPUT_SIZE * INPUT_DEPTH
}

/// Samples in one flattened score map.
pub const fn output_sample_count() -> usize {
    INPUT_SIZE * INPUT_SIZE * CLASS_COUNT
}

/// Shape of one weight-bearing stage, in bundle order.
#[derive(Debug, Clone, Copy)]
pub struct LayerShape {
    pub name: &'static str,
    pub kind: LayerKind,
}

/// Stage families that carry constants.
#[derive(Debug, Clone, Copy)]
pub enum LayerKind {
    Conv {
        size: usize,
        input_depth: usize,
        output_depth: usize,
    },
    Separable {
        size: usize,
        input_depth: usize,
        output_depth: usize,
    },
    Transpose {
        output_size: usize,
        input_depth: usize,
        output_depth: usize,
    },
    Head {
        size: usize,
        input_depth: usize,
        output_depth: usize,
    },
}

impl LayerKind {
    /// Constant-section lengths in bundle order, bias last.
    pub fn section_lens(&self) -> Vec<usize> {
        match *self {
            LayerKind::Conv {
                input_depth,
                output_depth,
                ..
            } => vec![
                KERNEL * KERNEL * input_depth * output_depth,
                output_depth,
            ],
            LayerKind::Separable {
                input_depth,
                output_depth,
                ..
            } => vec![
                KERNEL * KERNEL * input_depth,
                input_depth * output_depth,
                output_depth,
            ],
            LayerKind::Transpose {
                input_depth,
                output_depth,
                ..
            } => vec![
                KERNEL * KERNEL * output_depth * input_depth,
                output_depth,
            ],
            LayerKind::Head {
                input_depth,
                output_depth,
                ..
            } => vec![
                HEAD_KERNEL * HEAD_KERNEL * input_depth * output_depth,
                output_depth,
            ],
        }
    }

    /// Total constants carried by this stage.
    pub fn total_len(&self) -> usize {
        self.section_lens().iter().sum()
    }
}

/// Every weight-bearing stage, encoder first, in stream order.
pub const WEIGHT_LAYERS: [LayerShape; 9] = [
    LayerShape {
        name: "conv0",
        kind: LayerKind::Conv {
            size: 256,
            input_depth: 3,
            output_depth: 16,
        },
    },
    LayerShape {
        name: "sep1",
        kind: LayerKind::Separable {
            size: 128,
            input_depth: 16,
            output_depth: 32,
        },
    },
    LayerShape {
        name: "sep2",
        kind: LayerKind::Separable {
            size: 64,
            input_depth: 32,
            output_depth: 48,
        },
    },
    LayerShape {
        name: "sep3",
        kind: LayerKind::Separable {
            size: 32,
            input_depth: 48,
            output_depth: 64,
        },
    },
    LayerShape {
        name: "up4",
        kind: LayerKind::Transpose {
            output_size: 32,
            input_depth: 64,
            output_depth: 64,
        },
    },
    LayerShape {
        name: "up5",
        kind: LayerKind::Transpose {
            output_size: 64,
            input_depth: 64,
            output_depth: 48,
        },
    },
    LayerShape {
        name: "up6",
        kind: LayerKind::Transpose {
            output_size: 128,
            input_depth: 48,
            output_depth: 32,
        },
    },
    LayerShape {
        name: "up7",
        kind: LayerKind::Transpose {
            output_size: 256,
            input_depth: 32,
            output_depth: 16,
        },
    },
    LayerShape {
        name: "head8",
        kind: LayerKind::Head {
            size: 256,
            input_depth: 16,
            output_depth: 3,
        },
    },
];

/// Total constants across the whole bundle.
pub fn bundle_len() -> usize {
    WEIGHT_LAYERS.iter().map(|l| l.kind.total_len()).sum()
}

/// Walks a flat bundle section by section.
struct Cursor<'a> {
    values: &'a [Fixed],
    pos: usize,
}

impl Cursor<'_> {
    fn take(&mut self, len: usize) -> Vec<Fixed> {
        let section = self.values[self.pos..self.pos + len].to_vec();
        self.pos += len;
        section
    }

    fn dense(&mut self, shape: &LayerShape) -> LayerWeights {
        let lens = shape.kind.section_lens();
        LayerWeights {
            weights: self.take(lens[0]),
            bias: self.take(lens[1]),
        }
    }

    fn separable(&mut self, shape: &LayerShape) -> SeparableWeights {
        let lens = shape.kind.section_lens();
        SeparableWeights {
            depthwise: self.take(lens[0]),
            pointwise: self.take(lens[1]),
            bias: self.take(lens[2]),
        }
    }
}

/// One dense, transposed, or head stage's constants.
#[derive(Debug, Clone, Default)]
pub struct LayerWeights {
    pub weights: Vec<Fixed>,
    pub bias: Vec<Fixed>,
}

/// A separable stage's constants.
#[derive(Debug, Clone, Default)]
pub struct SeparableWeights {
    pub depthwise: Vec<Fixed>,
    pub pointwise: Vec<Fixed>,
    pub bias: Vec<Fixed>,
}

/// Every stage's immutable constants for one network instance.
#[derive(Debug, Clone)]
pub struct NetworkWeights {
    pub conv0: LayerWeights,
    pub sep1: SeparableWeights,
    pub sep2: SeparableWeights,
    pub sep3: SeparableWeights,
    pub up4: LayerWeights,
    pub up5: LayerWeights,
    pub up6: LayerWeights,
    pub up7: LayerWeights,
    pub head8: LayerWeights,
}

impl NetworkWeights {
    /// All-zero constants in the correct shapes.
    pub fn zeroed() -> NetworkWeights {
        let flat = vec![Fixed::ZERO; bundle_len()];
        Self::from_flat(&flat).expect("zeroed bundle matches the wiring table")
    }

    /// Split a flat bundle (stage order, weights before bias) into layers.
    pub fn from_flat(values: &[Fixed]) -> Result<NetworkWeights> {
        anyhow::ensure!(
            values.len() == bundle_len(),
            "weight bundle expected {} values, got {}",
            bundle_len(),
            values.len()
        );

        let mut cursor = Cursor { values, pos: 0 };
        let weights = NetworkWeights {
            conv0: cursor.dense(&WEIGHT_LAYERS[0]),
            sep1: cursor.separable(&WEIGHT_LAYERS[1]),
            sep2: cursor.separable(&WEIGHT_LAYERS[2]),
            sep3: cursor.separable(&WEIGHT_LAYERS[3]),
            up4: cursor.dense(&WEIGHT_LAYERS[4]),
            up5: cursor.dense(&WEIGHT_LAYERS[5]),
            up6: cursor.dense(&WEIGHT_LAYERS[6]),
            up7: cursor.dense(&WEIGHT_LAYERS[7]),
            head8: cursor.dense(&WEIGHT_LAYERS[8]),
        };
        weights.validate()?;
        Ok(weights)
    }

    /// Check every section length against the wiring table.
    pub fn validate(&self) -> Result<()> {
        let check = |name: &str, part: &str, got: usize, want: usize| -> Result<()> {
            anyhow::ensure!(
                got == want,
                "{name} {part} expected {want} values, got {got}"
            );
            Ok(())
        };

        for shape in WEIGHT_LAYERS.iter() {
            let lens = shape.kind.section_lens();
            match shape.name {
                "conv0" => {
                    check(shape.name, "weights", self.conv0.weights.len(), lens[0])?;
                    check(shape.name, "bias", self.conv0.bias.len(), lens[1])?;
                }
                "sep1" | "sep2" | "sep3" => {
                    let sep = match shape.name {
                        "sep1" => &self.sep1,
                        "sep2" => &self.sep2,
                        _ => &self.sep3,
                    };
                    check(shape.name, "depthwise", sep.depthwise.len(), lens[0])?;
                    check(shape.name, "pointwise", sep.pointwise.len(), lens[1])?;
                    check(shape.name, "bias", sep.bias.len(), lens[2])?;
                }
                "up4" | "up5" | "up6" | "up7" => {
                    let up = match shape.name {
                        "up4" => &self.up4,
                        "up5" => &self.up5,
                        "up6" => &self.up6,
                        _ => &self.up7,
                    };
                    check(shape.name, "weights", up.weights.len(), lens[0])?;
                    check(shape.name, "bias", up.bias.len(), lens[1])?;
                }
                _ => {
                    check(shape.name, "weights", self.head8.weights.len(), lens[0])?;
                    check(shape.name, "bias", self.head8.bias.len(), lens[1])?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_length_matches_the_table() {
        // conv0 + 3 separable stages + 4 transposed stages + head.
        let expected = (432 + 16)
            + (144 + 512 + 32)
            + (288 + 1536 + 48)
            + (432 + 3072 + 64)
            + (36864 + 64)
            + (27648 + 48)
            + (13824 + 32)
            + (4608 + 16)
            + (48 + 3);
        assert_eq!(bundle_len(), expected);
    }

    #[test]
    fn stage_sizes_follow_the_pool_and_stride_chain() {
        let mut expected_size = INPUT_SIZE;
        for shape in WEIGHT_LAYERS.iter() {
            match shape.kind {
                LayerKind::Conv { size, .. } | LayerKind::Separable { size, .. } => {
                    assert_eq!(size, expected_size, "{} runs at the wrong scale", shape.name);
                    // A pooling stage follows every encoder conv.
                    expected_size /= POOL;
                }
                LayerKind::Transpose { output_size, .. } => {
                    expected_size *= UPSTRIDE;
                    assert_eq!(
                        output_size, expected_size,
                        "{} upsamples to the wrong scale",
                        shape.name
                    );
                }
                LayerKind::Head { size, .. } => {
                    assert_eq!(size, INPUT_SIZE, "the head must run at full scale");
                }
            }
        }
        assert_eq!(expected_size, INPUT_SIZE);
    }

    #[test]
    fn zeroed_bundle_validates() {
        let weights = NetworkWeights::zeroed();
        assert!(weights.validate().is_ok());
        assert_eq!(weights.conv0.weights.len(), 432);
        assert_eq!(weights.head8.bias.len(), CLASS_COUNT);
    }

    #[test]
    fn flat_split_follows_stage_order() {
        let mut flat = vec![Fixed::ZERO; bundle_len()];
        // First value lands in conv0 weights, last in the head bias.
        flat[0] = Fixed::ONE;
        let last = flat.len() - 1;
        flat[last] = Fixed::from_int(2);

        let weights = NetworkWeights::from_flat(&flat).expect("split bundle");
        assert_eq!(weights.conv0.weights[0], Fixed::ONE);
        assert_eq!(weights.head8.bias[CLASS_COUNT - 1], Fixed::from_int(2));
    }

    #[test]
    fn short_bundles_are_rejected() {
        let flat = vec![Fixed::ZERO; bundle_len() - 1];
        assert!(NetworkWeights::from_flat(&flat).is_err());
    }

    #[test]
    fn mutated_sections_fail_validation() {
        let mut weights = NetworkWeights::zeroed();
        weights.sep2.pointwise.pop();
        assert!(weights.validate().is_err());
    }
}
