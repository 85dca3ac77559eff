//! Arithmetic in `GF(p)`, `p = 2^521 - 1`.
//!
//! `p` is a Mersenne prime, which lets reduction avoid general long division:
//! since `2^521 ≡ 1 (mod p)`, any value can be folded by splitting it into a
//! low 521-bit half and a high remainder and adding the two back together,
//! repeating until the result fits in 521 bits.

use std::ops::{Add, Mul, Sub};
use std::sync::OnceLock;

use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::RngCore;

use crate::config::{CHUNK_SIZE, PRIME_BITS};

static PRIME: OnceLock<BigUint> = OnceLock::new();

/// Returns `p = 2^521 - 1`.
pub fn prime() -> &'static BigUint {
    PRIME.get_or_init(|| (BigUint::one() << PRIME_BITS as usize) - BigUint::one())
}

/// An element of `GF(p)`, always held in reduced form (`< p`).
///
/// Field elements are the currency of both polynomial coefficients and
/// share values (§4.1, §4.5 of the design notes). The zero element is a
/// valid `FieldElement` for intermediate arithmetic, but invariant I4 means
/// a *share* or *coefficient* must never actually be the zero element;
/// callers that draw secret values use [`FieldElement::random_nonzero`]
/// rather than [`FieldElement::random`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldElement(BigUint);

impl FieldElement {
    /// Wraps a `BigUint`, reducing it modulo `p` first.
    pub fn new(value: BigUint) -> Self {
        Self(reduce(value))
    }

    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn one() -> Self {
        Self(BigUint::one())
    }

    /// Interprets `id` as a field element, for use as a polynomial x-coordinate.
    pub fn from_share_id(id: u32) -> Self {
        Self(BigUint::from(id))
    }

    /// Big-endian decode of a 64-byte chunk into a field element. 64 bytes
    /// (512 bits) is always `< p` (521 bits), so no reduction is needed.
    pub fn from_chunk_be(bytes: &[u8; CHUNK_SIZE]) -> Self {
        Self(BigUint::from_bytes_be(bytes))
    }

    /// Big-endian encode back to exactly 64 bytes, left-padding with zeros.
    ///
    /// # Panics
    /// Panics if the value does not fit in 64 bytes (512 bits); this cannot
    /// happen for values produced by [`Self::from_chunk_be`] or by
    /// reconstruction of shares split from a 64-byte secret, since both are
    /// always `< 2^512`.
    pub fn to_chunk_be(&self) -> [u8; CHUNK_SIZE] {
        let raw = self.0.to_bytes_be();
        assert!(
            raw.len() <= CHUNK_SIZE,
            "field element does not fit in a {CHUNK_SIZE}-byte chunk"
        );
        let mut out = [0u8; CHUNK_SIZE];
        out[CHUNK_SIZE - raw.len()..].copy_from_slice(&raw);
        out
    }

    /// The element's value as a decimal string, for the vault file's JSON
    /// share representation (§6): this preserves full 521-bit precision
    /// across JSON parsers that would otherwise round-trip large integers
    /// through a lossy `f64`.
    pub fn to_decimal_string(&self) -> String {
        self.0.to_str_radix(10)
    }

    /// Parses a decimal string produced by [`Self::to_decimal_string`].
    pub fn from_decimal_string(s: &str) -> Option<Self> {
        let value = BigUint::parse_bytes(s.as_bytes(), 10)?;
        if value >= *prime() {
            return None;
        }
        Some(Self(value))
    }

    /// Draws a uniformly random element of `[0, p)` using `rng`.
    ///
    /// Implemented by rejection sampling: draw a 521-bit value (the field's
    /// full bit-width), and redraw on the rare occasions it lands exactly on
    /// `p` (the only 521-bit value outside `[0, p)`). This keeps the output
    /// distribution exactly uniform rather than introducing the small bias a
    /// reduce-without-rejection approach would.
    pub fn random<R: RngCore>(rng: &mut R) -> Self {
        let byte_len = (PRIME_BITS as usize).div_ceil(8);
        let mut buf = vec![0u8; byte_len];
        loop {
            rng.fill_bytes(&mut buf);
            // Mask off the high bits beyond PRIME_BITS within the top byte.
            let excess_bits = byte_len * 8 - PRIME_BITS as usize;
            buf[0] &= 0xFFu8 >> excess_bits;
            let candidate = BigUint::from_bytes_be(&buf);
            if candidate < *prime() {
                return Self(candidate);
            }
        }
    }

    /// Draws a uniformly random element of `[1, p)` — used for polynomial
    /// coefficients and garbage shares, neither of which may be zero
    /// (invariant I4).
    pub fn random_nonzero<R: RngCore>(rng: &mut R) -> Self {
        loop {
            let candidate = Self::random(rng);
            if !candidate.is_zero() {
                return candidate;
            }
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Modular exponentiation, `self^exp mod p`, via fixed-width
    /// square-and-multiply: the loop always runs over every bit of `exp`'s
    /// public bit-length, so the control flow does not depend on which bits
    /// of the (potentially secret) base are set — only the publicly-known
    /// exponent shapes the iteration count.
    pub fn pow(&self, exp: &BigUint) -> Self {
        let mut result = FieldElement::one();
        let mut base = self.clone();
        let mut e = exp.clone();
        while !e.is_zero() {
            if e.bit(0) {
                result = result.mul_ref(&base);
            }
            base = base.mul_ref(&base);
            e >>= 1;
        }
        result
    }

    /// Multiplicative inverse via Fermat's little theorem: `a^(p-2) mod p`.
    /// Undefined (returns the zero element) for `a = 0`, which never arises
    /// for real field elements produced by this crate.
    pub fn inverse(&self) -> Self {
        if self.is_zero() {
            return Self::zero();
        }
        let exponent = prime() - BigUint::from(2u8);
        self.pow(&exponent)
    }

    fn mul_ref(&self, other: &Self) -> Self {
        Self(reduce(&self.0 * &other.0))
    }
}

fn reduce(mut value: BigUint) -> BigUint {
    let p = prime();
    while value.bits() > PRIME_BITS as u64 {
        let low = &value & p; // low PRIME_BITS bits (p is all-ones in that width)
        let high = &value >> PRIME_BITS as usize;
        value = low + high;
    }
    if value == *p { BigUint::zero() } else { value }
}

impl Add for FieldElement {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self(reduce(&self.0 + &other.0))
    }
}

impl Add for &FieldElement {
    type Output = FieldElement;
    fn add(self, other: Self) -> FieldElement {
        FieldElement(reduce(&self.0 + &other.0))
    }
}

impl Sub for FieldElement {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        let p = prime();
        if self.0 >= other.0 {
            Self(&self.0 - &other.0)
        } else {
            Self(p - (&other.0 - &self.0))
        }
    }
}

impl Sub for &FieldElement {
    type Output = FieldElement;
    fn sub(self, other: Self) -> FieldElement {
        let p = prime();
        if self.0 >= other.0 {
            FieldElement(&self.0 - &other.0)
        } else {
            FieldElement(p - (&other.0 - &self.0))
        }
    }
}

impl Mul for FieldElement {
    type Output = Self;
    fn mul(self, other: Self) -> Self {
        self.mul_ref(&other)
    }
}

impl Mul for &FieldElement {
    type Output = FieldElement;
    fn mul(self, other: Self) -> FieldElement {
        self.mul_ref(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn addition_wraps_mod_p() {
        let p = prime().clone();
        let a = FieldElement::new(p.clone() - BigUint::from(1u8));
        let b = FieldElement::new(BigUint::from(2u8));
        // (p-1) + 2 = p+1 ≡ 1 (mod p)
        assert_eq!((a + b).0, BigUint::one());
    }

    #[test]
    fn subtraction_wraps_mod_p() {
        let a = FieldElement::zero();
        let b = FieldElement::one();
        let diff = a - b;
        assert_eq!(diff.0, prime() - BigUint::one());
    }

    #[test]
    fn multiplicative_inverse_round_trips() {
        let mut rng = OsRng;
        for _ in 0..8 {
            let a = FieldElement::random_nonzero(&mut rng);
            let inv = a.inverse();
            let product = a * inv;
            assert_eq!(product, FieldElement::one());
        }
    }

    #[test]
    fn random_nonzero_never_zero() {
        let mut rng = OsRng;
        for _ in 0..256 {
            assert!(!FieldElement::random_nonzero(&mut rng).is_zero());
        }
    }

    #[test]
    fn random_is_bounded_by_prime() {
        let mut rng = OsRng;
        for _ in 0..256 {
            let value = FieldElement::random(&mut rng);
            assert!(value.0 < *prime());
        }
    }

    #[test]
    fn chunk_round_trip() {
        let mut bytes = [0u8; CHUNK_SIZE];
        bytes[CHUNK_SIZE - 1] = 0xAB;
        bytes[0] = 0x01;
        let element = FieldElement::from_chunk_be(&bytes);
        assert_eq!(element.to_chunk_be(), bytes);
    }

    #[test]
    fn decimal_string_round_trip() {
        let mut rng = OsRng;
        let a = FieldElement::random(&mut rng);
        let s = a.to_decimal_string();
        let b = FieldElement::from_decimal_string(&s).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn decimal_string_rejects_values_at_or_above_prime() {
        assert!(FieldElement::from_decimal_string(&prime().to_str_radix(10)).is_none());
    }
}
