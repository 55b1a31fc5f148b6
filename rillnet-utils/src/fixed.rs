//! The fixed-point sample type used on every stream edge.
//!
//! Samples are 18-bit two's-complement values with 8 integer bits (sign
//! included) and 10 fraction bits, stored sign-extended in an `i32`. Every
//! arithmetic result wraps modularly back to 18 bits; multiplication and
//! `f32` conversion truncate toward negative infinity. These rules are the
//! binary contract for the whole pipeline: two runs over the same input and
//! weights produce bit-identical streams.

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use bytemuck::{Pod, Zeroable};

/// Total stored width in bits.
pub const TOTAL_BITS: u32 = 18;
/// Integer bits, sign included.
pub const INT_BITS: u32 = 8;
/// Fraction bits.
pub const FRAC_BITS: u32 = TOTAL_BITS - INT_BITS;

const WRAP_SHIFT: u32 = 32 - TOTAL_BITS;

/// An 18-bit fixed-point sample with 10 fraction bits.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Fixed(i32);

impl Fixed {
    /// Zero.
    pub const ZERO: Fixed = Fixed(0);
    /// One (raw `1 << FRAC_BITS`).
    pub const ONE: Fixed = Fixed(1 << FRAC_BITS);
    /// Largest representable value, `(2^17 - 1) / 2^10`.
    pub const MAX: Fixed = Fixed((1 << (TOTAL_BITS - 1)) - 1);
    /// Smallest representable value, `-2^17 / 2^10`.
    pub const MIN: Fixed = Fixed(-(1 << (TOTAL_BITS - 1)));

    /// Build a sample from a raw 18-bit payload, wrapping out-of-range input.
    #[inline]
    pub const fn from_raw(raw: i32) -> Fixed {
        Fixed(wrap(raw))
    }

    /// The sign-extended raw payload.
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Convert from an integer, wrapping values outside the 8 integer bits.
    #[inline]
    pub const fn from_int(value: i32) -> Fixed {
        Fixed(wrap(value.wrapping_shl(FRAC_BITS)))
    }

    /// Quantize an `f32`, truncating toward negative infinity, then wrapping.
    #[inline]
    pub fn from_f32(value: f32) -> Fixed {
        let scaled = (value * (1i32 << FRAC_BITS) as f32).floor();
        Fixed(wrap(scaled as i32))
    }

    /// Widen back to `f32`. Exact: 18 bits always fit an `f32` mantissa.
    #[inline]
    pub fn to_f32(self) -> f32 {
        self.0 as f32 / (1i32 << FRAC_BITS) as f32
    }

    /// `max(self, 0)`, the rectifier applied after every fused bias add.
    #[inline]
    pub fn relu(self) -> Fixed {
        if self.0 < 0 { Fixed::ZERO } else { self }
    }
}

/// Sign-extend the low 18 bits, discarding everything above them.
#[inline]
const fn wrap(raw: i32) -> i32 {
    (raw << WRAP_SHIFT) >> WRAP_SHIFT
}

impl Add for Fixed {
    type Output = Fixed;

    #[inline]
    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(wrap(self.0.wrapping_add(rhs.0)))
    }
}

impl AddAssign for Fixed {
    #[inline]
    fn add_assign(&mut self, rhs: Fixed) {
        *self = *self + rhs;
    }
}

impl Sub for Fixed {
    type Output = Fixed;

    #[inline]
    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(wrap(self.0.wrapping_sub(rhs.0)))
    }
}

impl Neg for Fixed {
    type Output = Fixed;

    #[inline]
    fn neg(self) -> Fixed {
        Fixed(wrap(self.0.wrapping_neg()))
    }
}

impl Mul for Fixed {
    type Output = Fixed;

    /// Full-precision product, then truncation of the extra fraction bits
    /// toward negative infinity (arithmetic shift), then the 18-bit wrap.
    #[inline]
    fn mul(self, rhs: Fixed) -> Fixed {
        let product = self.0 as i64 * rhs.0 as i64;
        Fixed(wrap((product >> FRAC_BITS) as i32))
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed({})", self.to_f32())
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f32())
    }
}
