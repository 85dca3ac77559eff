//! Shamir secret sharing over `GF(p)`, `p = 2^521 - 1` (§4.5).
//!
//! Unlike a threshold `(t, n)` scheme, reconstruction here always consumes
//! every share handed to it: the polynomial's degree is fixed at
//! `active_shares - 1`, and [`reconstruct_chunk`] performs no subset search
//! or threshold negotiation. A caller who supplies the wrong set of shares
//! (the wrong share IDs, or a share count that does not match the degree
//! used at split time) simply gets back the wrong field element — there is
//! no separate "not enough shares" error, which would otherwise leak
//! information about which shares were valid.

use rand::RngCore;

use crate::config::CHUNK_SIZE;
use crate::field::FieldElement;

/// One share of a single 64-byte chunk: a share ID and its field-element
/// value at that ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Share {
    pub share_id: u32,
    pub value: FieldElement,
}

/// Splits one 64-byte chunk into shares at the given `share_ids`.
///
/// Builds a random polynomial of degree `share_ids.len() - 1` with the
/// chunk's value as its constant term, then evaluates it at each share ID.
/// Non-constant coefficients are drawn via [`FieldElement::random_nonzero`]
/// (invariant I4: no coefficient is ever the zero element).
///
/// # Panics
/// Panics if `share_ids` is empty — a chunk always has at least one active
/// share in any vault configuration `VaultParams` accepts.
pub fn split_chunk<R: RngCore>(
    secret: &[u8; CHUNK_SIZE],
    share_ids: &[u32],
    rng: &mut R,
) -> Vec<Share> {
    assert!(!share_ids.is_empty(), "cannot split across zero shares");

    let degree = share_ids.len() - 1;
    let mut coefficients = Vec::with_capacity(degree + 1);
    coefficients.push(FieldElement::from_chunk_be(secret));
    for _ in 0..degree {
        coefficients.push(FieldElement::random_nonzero(rng));
    }

    share_ids
        .iter()
        .map(|&share_id| {
            let x = FieldElement::from_share_id(share_id);
            Share {
                share_id,
                value: evaluate(&coefficients, &x),
            }
        })
        .collect()
}

/// Reconstructs the 64-byte chunk from exactly the shares provided, via
/// Lagrange interpolation at `x = 0`.
///
/// All shares are consumed, in whatever order they arrive in `shares` — the
/// interpolation formula is symmetric in its inputs. Supplying shares from
/// the wrong share IDs, or a share count that does not match the polynomial
/// degree used at split time, silently yields an incorrect chunk rather
/// than an error (see the module's anti-oracle note above).
pub fn reconstruct_chunk(shares: &[Share]) -> [u8; CHUNK_SIZE] {
    let xs: Vec<FieldElement> = shares
        .iter()
        .map(|s| FieldElement::from_share_id(s.share_id))
        .collect();

    let mut acc = FieldElement::zero();
    for (i, share) in shares.iter().enumerate() {
        let coefficient = lagrange_coefficient_at_zero(&xs, i);
        acc = acc + &share.value * &coefficient;
    }
    acc.to_chunk_be()
}

/// Computes `L_i(0)` for the Lagrange basis polynomial built from `xs`:
/// `L_i(0) = product_{j != i} (-x_j) / (x_i - x_j)`.
fn lagrange_coefficient_at_zero(xs: &[FieldElement], i: usize) -> FieldElement {
    let mut numerator = FieldElement::one();
    let mut denominator = FieldElement::one();
    for (j, x_j) in xs.iter().enumerate() {
        if i == j {
            continue;
        }
        numerator = &numerator * &(&FieldElement::zero() - x_j);
        denominator = &denominator * &(&xs[i] - x_j);
    }
    &numerator * &denominator.inverse()
}

/// Horner's method evaluation of `coefficients` (constant term first) at `x`.
fn evaluate(coefficients: &[FieldElement], x: &FieldElement) -> FieldElement {
    let mut acc = FieldElement::zero();
    for coefficient in coefficients.iter().rev() {
        acc = &acc * x + coefficient.clone();
    }
    acc
}

/// Draws a single garbage share value, statistically indistinguishable from
/// a real share (§4.5, invariant I3): both are uniform over `[1, p)`.
pub fn garbage_share<R: RngCore>(rng: &mut R) -> FieldElement {
    FieldElement::random_nonzero(rng)
}
