use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Modulus of the share ring: 2^32.
pub const MODULUS: u64 = 1 << 32;

/// Element of the ring Z/2^32.
///
/// The value is kept in the low half of a `u64` so that a sum or product of
/// two elements never overflows the intermediate; the high 32 bits are
/// always zero. This is also the representation carried on the wire.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RingElem(u64);

impl RingElem {
    pub const ZERO: RingElem = RingElem(0);
    pub const ONE: RingElem = RingElem(1);

    /// Reduce an arbitrary 64-bit value into the ring.
    pub fn new(value: u64) -> Self {
        RingElem(value % MODULUS)
    }

    /// Raw wire representation (high 32 bits zero).
    pub fn to_u64(self) -> u64 {
        self.0
    }

    /// Uniform element of `[0, 2^32)`.
    pub fn random(rng: &mut impl Rng) -> Self {
        RingElem(rng.gen_range(0..MODULUS))
    }

    /// Uniform element of `[1, 5]`.
    ///
    /// Used for preprocessing masks and generator shares to keep
    /// reconstructed magnitudes bounded across repeated updates.
    pub fn small_random(rng: &mut impl Rng) -> Self {
        RingElem(rng.gen_range(1..=5))
    }

    /// Embed a signed 64-bit integer by its low 32 bits.
    pub fn from_signed(value: i64) -> Self {
        RingElem(value as u64 & (MODULUS - 1))
    }

    /// Two's-complement reading of the low 32 bits. Display only.
    pub fn to_signed(self) -> i64 {
        self.0 as u32 as i32 as i64
    }
}

impl Add for RingElem {
    type Output = RingElem;
    fn add(self, rhs: Self) -> Self::Output {
        RingElem((self.0 + rhs.0) % MODULUS)
    }
}

impl Sub for RingElem {
    type Output = RingElem;
    fn sub(self, rhs: Self) -> Self::Output {
        RingElem((self.0 + MODULUS - rhs.0) % MODULUS)
    }
}

impl Mul for RingElem {
    type Output = RingElem;
    fn mul(self, rhs: Self) -> Self::Output {
        RingElem(self.0 * rhs.0 % MODULUS)
    }
}

impl Neg for RingElem {
    type Output = RingElem;
    fn neg(self) -> Self::Output {
        RingElem::ZERO - self
    }
}

impl fmt::Display for RingElem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RingElem {
    type Err = std::num::ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(RingElem::new(s.parse()?))
    }
}

/// Dot product of two equal-length slices, reduced in the ring.
pub fn dot(a: &[RingElem], b: &[RingElem]) -> RingElem {
    a.iter()
        .zip(b)
        .fold(RingElem::ZERO, |acc, (&x, &y)| acc + x * y)
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn add_sub_round_trip() {
        let mut rng = SmallRng::from_seed([7; 32]);
        for _ in 0..1000 {
            let a = RingElem::random(&mut rng);
            let b = RingElem::random(&mut rng);
            assert_eq!(a + (b - a), b);
            assert_eq!(a - a, RingElem::ZERO);
        }
    }

    #[test]
    fn mul_distributes_over_add() {
        let mut rng = SmallRng::from_seed([8; 32]);
        for _ in 0..1000 {
            let a = RingElem::random(&mut rng);
            let b = RingElem::random(&mut rng);
            let c = RingElem::random(&mut rng);
            assert_eq!(a * (b + c), a * b + a * c);
        }
    }

    #[test]
    fn sub_wraps_without_underflow() {
        let a = RingElem::new(0);
        let b = RingElem::new(1);
        assert_eq!(a - b, RingElem::new(MODULUS - 1));
    }

    #[test]
    fn signed_embedding() {
        assert_eq!(RingElem::from_signed(-1), RingElem::new(MODULUS - 1));
        assert_eq!(RingElem::from_signed(-69), RingElem::new(MODULUS - 69));
        assert_eq!(RingElem::from_signed(-1).to_signed(), -1);
        assert_eq!(RingElem::new(5).to_signed(), 5);
    }

    #[test]
    fn small_random_stays_in_range() {
        let mut rng = SmallRng::from_seed([9; 32]);
        for _ in 0..100 {
            let x = RingElem::small_random(&mut rng).to_u64();
            assert!((1..=5).contains(&x));
        }
    }

    #[test]
    fn parses_decimal_text() {
        assert_eq!("4294967235".parse::<RingElem>().unwrap().to_signed(), -61);
        assert!("x".parse::<RingElem>().is_err());
    }
}
