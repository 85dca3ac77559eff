//! Share-ID space manager (§4.2): partitions the share-ID universe into
//! disjoint A-region, B-region, and unassigned subsets.

use rand::RngCore;
use rand::rngs::OsRng;
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;

use crate::config::VaultParams;

/// The three disjoint share-ID regions produced by [`divide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regions {
    /// Share IDs reserved for document A, in the order fixed at creation
    /// time. This order is significant: it is preserved byte-for-byte
    /// through the partition-map-key codec (§4.3) and consumed positionally
    /// by Stage 2 of the MAP (§4.4).
    pub a_ids: Vec<u32>,
    /// Share IDs reserved for document B.
    pub b_ids: Vec<u32>,
    /// Share IDs that are never assigned to either document.
    pub unassigned_ids: Vec<u32>,
}

/// Draws a uniformly random three-way partition of
/// `{0, 1, ..., 2*partition_size + unassigned_shares - 1}` into an A-region,
/// a B-region, and an unassigned remainder, each of the configured size.
///
/// The partition is drawn by generating the full ordered universe,
/// Fisher–Yates shuffling it with a CSPRNG, and slicing the shuffled order
/// into the three pieces — the slices are never sorted afterward, so the
/// order in which IDs appear within a region is itself part of the secret
/// the partition-map-key protects (see invariant I5).
///
/// # Guarantees
/// - `a_ids ∩ b_ids = ∅` is total (by construction, not by chance): the
///   three slices are disjoint sub-ranges of one shuffled permutation.
/// - Two calls with identical `params` produce different assignments with
///   overwhelming probability, since the CSPRNG reseeds from OS entropy on
///   every call.
pub fn divide(params: &VaultParams) -> Regions {
    divide_with_rng(params, &mut csprng())
}

/// Same as [`divide`] but with an injectable RNG, for deterministic tests.
pub fn divide_with_rng<R: RngCore>(params: &VaultParams, rng: &mut R) -> Regions {
    let partition_size = params.partition_size() as usize;
    let total = params.share_id_space() as usize;

    let mut universe: Vec<u32> = (0..total as u32).collect();
    fisher_yates_shuffle(&mut universe, rng);

    let a_ids = universe[0..partition_size].to_vec();
    let b_ids = universe[partition_size..2 * partition_size].to_vec();
    let unassigned_ids = universe[2 * partition_size..].to_vec();

    Regions {
        a_ids,
        b_ids,
        unassigned_ids,
    }
}

/// Fisher–Yates shuffle using cryptographically secure random indices.
///
/// Used both here (non-deterministic region assignment) and by the Stage-2
/// MAP (deterministic active-slot selection, §4.4) with a seeded PRNG
/// instead of a CSPRNG — the algorithm itself is identical either way.
pub fn fisher_yates_shuffle<T, R: RngCore>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = uniform_below(rng, i as u64 + 1) as usize;
        items.swap(i, j);
    }
}

/// Draws a uniform value in `[0, bound)` from `rng`, via rejection sampling
/// against the smallest power-of-two range that covers `bound`. Avoids the
/// modulo bias a naive `rng.next_u64() % bound` would introduce.
fn uniform_below<R: RngCore>(rng: &mut R, bound: u64) -> u64 {
    if bound == 0 {
        return 0;
    }
    if bound.is_power_of_two() {
        return rng.next_u64() & (bound - 1);
    }
    let limit = u64::MAX - (u64::MAX % bound);
    loop {
        let value = rng.next_u64();
        if value < limit {
            return value % bound;
        }
    }
}

fn csprng() -> ChaCha20Rng {
    ChaCha20Rng::try_from_rng(&mut OsRng).expect("OS entropy source unavailable")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn params() -> VaultParams {
        VaultParams::new(20, 5, 10, 4).unwrap()
    }

    #[test]
    fn regions_are_disjoint_and_correctly_sized() {
        let regions = divide(&params());
        assert_eq!(regions.a_ids.len(), 20);
        assert_eq!(regions.b_ids.len(), 20);
        assert_eq!(regions.unassigned_ids.len(), 10);

        let a: HashSet<_> = regions.a_ids.iter().collect();
        let b: HashSet<_> = regions.b_ids.iter().collect();
        let u: HashSet<_> = regions.unassigned_ids.iter().collect();
        assert!(a.is_disjoint(&b));
        assert!(a.is_disjoint(&u));
        assert!(b.is_disjoint(&u));

        let mut all: Vec<u32> = regions
            .a_ids
            .iter()
            .chain(&regions.b_ids)
            .chain(&regions.unassigned_ids)
            .copied()
            .collect();
        all.sort_unstable();
        let expected: Vec<u32> = (0..50).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn repeated_divides_are_non_deterministic() {
        let p = params();
        let r1 = divide(&p);
        let r2 = divide(&p);
        assert_ne!(r1, r2);
    }

    #[test]
    fn ten_runs_stay_pairwise_disjoint() {
        let p = params();
        for _ in 0..10 {
            let r = divide(&p);
            let a: HashSet<_> = r.a_ids.iter().collect();
            let b: HashSet<_> = r.b_ids.iter().collect();
            assert!(a.is_disjoint(&b));
            assert_eq!(r.a_ids.len(), 20);
            assert_eq!(r.b_ids.len(), 20);
        }
    }

    #[test]
    fn slices_are_not_sorted() {
        // A shuffled slice of 20 distinct u32s being already sorted is
        // astronomically unlikely; treat a sorted result as a bug.
        let regions = divide(&params());
        let mut sorted = regions.a_ids.clone();
        sorted.sort_unstable();
        assert_ne!(sorted, regions.a_ids);
    }

    #[test]
    fn deterministic_rng_reproduces_same_partition() {
        use rand_chacha::ChaCha20Rng;
        let p = params();
        let mut r1 = ChaCha20Rng::seed_from_u64(42);
        let mut r2 = ChaCha20Rng::seed_from_u64(42);
        let a = divide_with_rng(&p, &mut r1);
        let b = divide_with_rng(&p, &mut r2);
        assert_eq!(a, b);
    }
}
