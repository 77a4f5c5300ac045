//! 17.14 signed fixed-point arithmetic.
//!
//! The 4.4BSD scheduler mode keeps `recent_cpu` and `load_avg` as real
//! numbers, but the kernel has no FPU in scope for this crate (floating
//! point is an external-collaborator concern, not this crate's). Pintos
//! fakes it with a 17.14 fixed-point representation: the low 14 bits are
//! the fraction, so `1` is represented as `1 << 14`.

use core::ops::{Add, Sub};

const FRACTION_BITS: i32 = 14;
const SCALE: i64 = 1 << FRACTION_BITS;

/// A signed 17.14 fixed-point number, stored as a scaled `i64`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Fp(i64);

impl Fp {
    pub const ZERO: Fp = Fp(0);

    pub const fn from_int(n: i32) -> Fp {
        Fp((n as i64) * SCALE)
    }

    pub const fn from_raw(raw: i64) -> Fp {
        Fp(raw)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Truncate toward zero.
    pub const fn to_int_trunc(self) -> i32 {
        (self.0 / SCALE) as i32
    }

    /// Round to nearest, ties away from zero.
    pub const fn to_int_round(self) -> i32 {
        if self.0 >= 0 {
            ((self.0 + SCALE / 2) / SCALE) as i32
        } else {
            ((self.0 - SCALE / 2) / SCALE) as i32
        }
    }

    pub fn mul(self, other: Fp) -> Fp {
        Fp(((self.0 as i128 * other.0 as i128) / SCALE as i128) as i64)
    }

    pub fn div(self, other: Fp) -> Fp {
        Fp(((self.0 as i128 * SCALE as i128) / other.0 as i128) as i64)
    }

    pub const fn mul_int(self, n: i32) -> Fp {
        Fp(self.0 * n as i64)
    }

    pub const fn div_int(self, n: i32) -> Fp {
        Fp(self.0 / n as i64)
    }

    pub const fn add_int(self, n: i32) -> Fp {
        Fp(self.0 + (n as i64) * SCALE)
    }

    pub const fn sub_int(self, n: i32) -> Fp {
        Fp(self.0 - (n as i64) * SCALE)
    }
}

impl Add for Fp {
    type Output = Fp;
    fn add(self, rhs: Fp) -> Fp {
        Fp(self.0 + rhs.0)
    }
}

impl Sub for Fp {
    type Output = Fp;
    fn sub(self, rhs: Fp) -> Fp {
        Fp(self.0 - rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_round_trip() {
        for n in [-100, -1, 0, 1, 42, 1000] {
            assert_eq!(Fp::from_int(n).to_int_trunc(), n);
            assert_eq!(Fp::from_int(n).to_int_round(), n);
        }
    }

    #[test]
    fn rounding_matches_pintos_examples() {
        // 1.5 rounds to 2, -1.5 rounds to -2 (ties away from zero).
        let one_half = Fp::from_int(1).add_int(0) + Fp::from_raw(SCALE / 2);
        assert_eq!(one_half.to_int_round(), 2);
        let neg = Fp::from_int(-1) - Fp::from_raw(SCALE / 2);
        assert_eq!(neg.to_int_round(), -2);
    }

    #[test]
    fn mul_div_are_inverse_ish() {
        let a = Fp::from_int(5);
        let b = Fp::from_int(2);
        let prod = a.mul(b);
        assert_eq!(prod.to_int_trunc(), 10);
        let quot = prod.div(b);
        assert_eq!(quot.to_int_trunc(), 5);
    }

    #[test]
    fn load_avg_decay_shape() {
        // (59/60) * load_avg: with load_avg == 1 and 0 ready threads this
        // should decay toward zero but never go negative.
        let coeff = Fp::from_int(59).div(Fp::from_int(60));
        let load = coeff.mul(Fp::from_int(1));
        assert!(load.raw() > 0);
        assert!(load.to_int_round() <= 1);
    }
}
