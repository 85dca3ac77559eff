//! Two-stage Message Authentication Path (§4.4): turns a password into the
//! ordered list of share IDs that are "active" for one document.
//!
//! Stage 1 recovers the region's full share-ID list by decrypting the
//! caller-supplied partition-map-key with the password (see
//! [`crate::partition_key`]). Stage 2 derives a deterministic permutation of
//! that list from the *same* password through an independent KDF path, and
//! takes its first `active_shares` entries as the active slots for this read.
//!
//! Running the password through two independent derivations (Argon2id/PBKDF2
//! for Stage 1, a separately-salted Argon2id plus HKDF for Stage 2) keeps the
//! two stages cryptographically unlinked: learning one does not shortcut the
//! other.

use hkdf::Hkdf;
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;
use sha2::Sha256;

use crate::config::{CryptoParams, KDF_OUTPUT_LEN, STAGE2_HKDF_INFO, STAGE2_PURPOSE_SALT};
use crate::error::Result;
use crate::id_space::fisher_yates_shuffle;
use crate::partition_key;
#[cfg(feature = "zeroize")]
use zeroize::Zeroize;

/// The result of walking both MAP stages for one document's password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveMap {
    /// The full region share-ID list recovered in Stage 1, in its original
    /// (unsorted) creation-time order.
    pub region_ids: Vec<u32>,
    /// The `active_shares` share IDs selected by Stage 2, in permutation
    /// order — this order is what [`crate::shamir::reconstruct`] walks.
    pub active_ids: Vec<u32>,
}

/// Runs both MAP stages for a document password.
///
/// # Errors
/// Propagates [`crate::error::VaultError::Decryption`] from Stage 1 if
/// `password` or `partition_map_key` is wrong; Stage 2 cannot itself fail,
/// since it only derives from values already in hand.
///
/// Callers that must preserve the anti-oracle property (see
/// [`resolve_or_pseudo`]) should not call this function directly — it is for
/// the small set of entry points legitimately allowed to raise `Decryption`
/// (the codec itself, and `Vault::update`, where failing closed is required
/// to avoid writing shares into the wrong region).
pub fn resolve(
    password: &[u8],
    partition_map_key: &str,
    active_shares: u32,
    partition_size: u32,
    crypto: &CryptoParams,
) -> Result<ActiveMap> {
    let region_ids =
        partition_key::decode(password, partition_map_key, partition_size as usize, crypto)?;
    let active_ids = stage2_select(password, &region_ids, active_shares, crypto);
    Ok(ActiveMap {
        region_ids,
        active_ids,
    })
}

/// Runs both MAP stages the way [`resolve`] does, except a Stage-1 failure
/// (wrong password, tampered or malformed partition-map-key) never surfaces
/// as an error. Instead it falls back to a deterministic pseudo-region
/// derived from `password` and `partition_map_key` themselves, so the caller
/// always gets *some* `active_shares`-long ID list to read from — almost
/// certainly IDs that don't correspond to the real region, so reconstruction
/// yields garbage, but the call shape is identical either way.
///
/// This is what `Vault::read` uses (§7): a wrong secret must look exactly
/// like reading a vault that happens to hold a different, undecodable
/// document, never like a distinguishable failure.
pub fn resolve_or_pseudo(
    password: &[u8],
    partition_map_key: &str,
    active_shares: u32,
    partition_size: u32,
    share_id_space: u32,
    crypto: &CryptoParams,
) -> ActiveMap {
    match partition_key::decode(password, partition_map_key, partition_size as usize, crypto) {
        Ok(region_ids) => {
            let active_ids = stage2_select(password, &region_ids, active_shares, crypto);
            ActiveMap {
                region_ids,
                active_ids,
            }
        }
        Err(_) => {
            let region_ids =
                pseudo_region_ids(password, partition_map_key, partition_size, share_id_space);
            let active_ids = stage2_select(password, &region_ids, active_shares, crypto);
            ActiveMap {
                region_ids,
                active_ids,
            }
        }
    }
}

/// Derives a deterministic, but not secret-dependent-in-a-meaningful-way,
/// `partition_size`-long subset of `[0, share_id_space)` from `password` and
/// `partition_map_key` — used only on the Stage-1 failure path of
/// [`resolve_or_pseudo`]. The expensive part of Stage 1 (the Argon2id/PBKDF2
/// derivation) has already run and failed inside
/// [`crate::partition_key::decode`] by the time this is reached, so this
/// step is intentionally cheap: it only needs to be deterministic, not
/// costly, for the overall call to cost the same either way.
fn pseudo_region_ids(
    password: &[u8],
    partition_map_key: &str,
    partition_size: u32,
    share_id_space: u32,
) -> Vec<u32> {
    let mut hasher = sha2::Sha256::default();
    use sha2::Digest;
    hasher.update(password);
    hasher.update(partition_map_key.as_bytes());
    let seed: [u8; 32] = hasher.finalize().into();

    let mut rng = ChaCha20Rng::from_seed(seed);
    let mut universe: Vec<u32> = (0..share_id_space).collect();
    fisher_yates_shuffle(&mut universe, &mut rng);
    let take = (partition_size as usize).min(universe.len());
    universe.truncate(take);
    universe
}

/// Stage 2: derive a seed from `password` independent of Stage 1's KDF call,
/// expand it into a PRNG stream, and Fisher–Yates shuffle `region_ids` with
/// it. The shuffle always runs the full `n-1` swaps regardless of
/// `active_shares`, so its cost does not leak how many slots are taken.
pub fn stage2_select(
    password: &[u8],
    region_ids: &[u32],
    active_shares: u32,
    crypto: &CryptoParams,
) -> Vec<u32> {
    let mut processed = stage2_processed_password(password, crypto);
    let hk = Hkdf::<Sha256>::new(Some(STAGE2_PURPOSE_SALT), &processed);
    let mut seed = [0u8; 32];
    hk.expand(STAGE2_HKDF_INFO, &mut seed)
        .expect("32-byte output is within HKDF-SHA256's valid expand length");
    #[cfg(feature = "zeroize")]
    processed.zeroize();

    let mut rng = ChaCha20Rng::from_seed(seed);
    #[cfg(feature = "zeroize")]
    seed.zeroize();
    let mut shuffled = region_ids.to_vec();
    fisher_yates_shuffle(&mut shuffled, &mut rng);

    let take = (active_shares as usize).min(shuffled.len());
    shuffled.truncate(take);
    shuffled
}

/// Derives a processed password distinct from the raw bytes `password`,
/// using a KDF keyed by the fixed [`STAGE2_PURPOSE_SALT`] rather than Stage
/// 1's per-vault salt. This is the purpose-separation step invariant I6
/// requires: Stage 1 and Stage 2 must not be derivable from one another
/// even by an attacker who knows both salts.
fn stage2_processed_password(password: &[u8], crypto: &CryptoParams) -> [u8; KDF_OUTPUT_LEN] {
    let mut out = [0u8; KDF_OUTPUT_LEN];
    let params = argon2::Params::new(
        crypto.argon2_memory_kib,
        crypto.argon2_time_cost,
        crypto.argon2_parallelism,
        Some(KDF_OUTPUT_LEN),
    )
    .expect("crypto params were validated at vault construction time");
    let argon2 = argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
    argon2
        .hash_password_into(password, STAGE2_PURPOSE_SALT, &mut out)
        .expect("fixed-length salt and output are always valid for argon2id");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_crypto() -> CryptoParams {
        CryptoParams {
            argon2_memory_kib: 8,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            ..CryptoParams::default()
        }
    }

    #[test]
    fn stage2_is_deterministic_for_same_password() {
        let crypto = fast_crypto();
        let ids: Vec<u32> = (0..30).collect();
        let a = stage2_select(b"hunter2", &ids, 5, &crypto);
        let b = stage2_select(b"hunter2", &ids, 5, &crypto);
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
    }

    #[test]
    fn stage2_differs_across_passwords() {
        let crypto = fast_crypto();
        let ids: Vec<u32> = (0..30).collect();
        let a = stage2_select(b"password-one", &ids, 5, &crypto);
        let b = stage2_select(b"password-two", &ids, 5, &crypto);
        assert_ne!(a, b);
    }

    #[test]
    fn stage2_selection_is_a_subset_of_region_ids() {
        let crypto = fast_crypto();
        let ids: Vec<u32> = (100..164).collect();
        let selected = stage2_select(b"pw", &ids, 8, &crypto);
        assert_eq!(selected.len(), 8);
        for id in &selected {
            assert!(ids.contains(id));
        }
    }

    #[test]
    fn full_resolve_round_trips_through_stage1_and_stage2() {
        let crypto = fast_crypto();
        let ids = vec![3u32, 1, 4, 1_000_001, 9, 2, 6];
        let key_str = partition_key::encode(b"correct-password", &ids, &crypto).unwrap();

        let map = resolve(b"correct-password", &key_str, 3, ids.len() as u32, &crypto).unwrap();
        assert_eq!(map.region_ids, ids);
        assert_eq!(map.active_ids.len(), 3);

        let map2 = resolve(b"correct-password", &key_str, 3, ids.len() as u32, &crypto).unwrap();
        assert_eq!(map.active_ids, map2.active_ids);
    }

    #[test]
    fn stage1_failure_propagates_as_decryption_error() {
        let crypto = fast_crypto();
        let ids = vec![1u32, 2, 3];
        let key_str = partition_key::encode(b"correct-password", &ids, &crypto).unwrap();
        let result = resolve(b"wrong-password", &key_str, 2, ids.len() as u32, &crypto);
        assert!(result.is_err());
    }

    #[test]
    fn resolve_fails_when_recovered_list_has_the_wrong_partition_size() {
        let crypto = fast_crypto();
        let ids = vec![1u32, 2, 3, 4];
        let key_str = partition_key::encode(b"correct-password", &ids, &crypto).unwrap();
        let result = resolve(b"correct-password", &key_str, 2, ids.len() as u32 + 1, &crypto);
        assert!(result.is_err());
    }

    #[test]
    fn pseudo_path_never_errors_on_wrong_password() {
        let crypto = fast_crypto();
        let ids = vec![1u32, 2, 3, 4, 5];
        let key_str = partition_key::encode(b"correct-password", &ids, &crypto).unwrap();

        let map = resolve_or_pseudo(b"wrong-password", &key_str, 3, 20, 50, &crypto);
        assert_eq!(map.active_ids.len(), 3);
    }

    #[test]
    fn pseudo_path_is_deterministic_for_the_same_wrong_password() {
        let crypto = fast_crypto();
        let ids = vec![1u32, 2, 3, 4, 5];
        let key_str = partition_key::encode(b"correct-password", &ids, &crypto).unwrap();

        let a = resolve_or_pseudo(b"wrong-password", &key_str, 3, 20, 50, &crypto);
        let b = resolve_or_pseudo(b"wrong-password", &key_str, 3, 20, 50, &crypto);
        assert_eq!(a, b);
    }

    #[test]
    fn pseudo_path_differs_across_wrong_passwords() {
        let crypto = fast_crypto();
        let ids = vec![1u32, 2, 3, 4, 5];
        let key_str = partition_key::encode(b"correct-password", &ids, &crypto).unwrap();

        let a = resolve_or_pseudo(b"wrong-one", &key_str, 3, 20, 50, &crypto);
        let b = resolve_or_pseudo(b"wrong-two", &key_str, 3, 20, 50, &crypto);
        assert_ne!(a, b);
    }

    #[test]
    fn correct_password_still_takes_the_real_path_through_resolve_or_pseudo() {
        let crypto = fast_crypto();
        let ids = vec![3u32, 1, 4, 1_000_001, 9, 2, 6];
        let key_str = partition_key::encode(b"correct-password", &ids, &crypto).unwrap();

        let map = resolve_or_pseudo(b"correct-password", &key_str, 3, ids.len() as u32, 2_000_000, &crypto);
        assert_eq!(map.region_ids, ids);
    }
}
