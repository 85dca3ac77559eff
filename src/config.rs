use std::time::Duration;

use crate::error::{Result, VaultError};

/// Bit-length of the prime field modulus `p = 2^521 - 1`.
pub const PRIME_BITS: u32 = 521;

/// Size, in bytes, of one document chunk. 64 bytes (512 bits) fits
/// comfortably inside a 521-bit field element.
pub const CHUNK_SIZE: usize = 64;

/// Fixed, published purpose-separation salt for Stage-2 MAP derivation
/// (see [`crate::map`]). This is a system constant, not a secret: changing
/// it changes the active-slot selection for every existing vault.
pub const STAGE2_PURPOSE_SALT: &[u8] = b"dual-vault/stage2-map/v1";

/// HKDF `info` label used when expanding the Stage-2 processed password into
/// PRNG seed material.
pub const STAGE2_HKDF_INFO: &[u8] = b"dual-vault/stage2-shuffle-seed/v1";

/// Default Argon2id memory cost, in KiB (64 MiB).
pub const ARGON2_MEMORY_KIB: u32 = 65536;
/// Default Argon2id time cost (number of passes).
pub const ARGON2_TIME_COST: u32 = 3;
/// Default Argon2id parallelism.
pub const ARGON2_PARALLELISM: u32 = 4;
/// Default Argon2id/PBKDF2 output length, in bytes.
pub const KDF_OUTPUT_LEN: usize = 32;
/// Minimum PBKDF2-HMAC-SHA256 iteration count used as a fallback when the
/// Argon2id backend is unavailable.
pub const PBKDF2_MIN_ITERATIONS: u32 = 310_000;

/// Default write-ahead-log staleness timeout.
pub const WAL_TIMEOUT: Duration = Duration::from_secs(3600);
/// Default advisory-lock acquisition timeout.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Which key-derivation backend the partition-map-key codec should use.
///
/// Argon2id is the default; PBKDF2-HMAC-SHA256 is a documented fallback for
/// environments where the memory-hard Argon2id backend cannot run (see
/// the design notes on §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum KdfBackend {
    #[default]
    Argon2id,
    Pbkdf2,
}

/// Sizing parameters for one vault's share-ID universe.
///
/// `SHARE_ID_SPACE = 2 * partition_size + unassigned_shares` is derived, not
/// stored redundantly, so the invariant can never drift out of sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultParams {
    /// Number of share IDs reserved for each of the two regions (A and B).
    partition_size: u32,
    /// Number of share IDs, within a region, that actually carry a
    /// document's shares for a given chunk. Must be `<= partition_size`.
    active_shares: u32,
    /// Number of share IDs that are never assigned to either document and
    /// hold only garbage, forever.
    unassigned_shares: u32,
    /// Maximum number of 64-byte chunks either document may encode to. Fixed
    /// at vault-creation time: every chunk index up to this bound exists in
    /// the vault file for both regions, whether or not a given update's
    /// document actually uses all of them.
    chunk_capacity: u32,
}

impl VaultParams {
    /// Builds a validated parameter set.
    ///
    /// # Errors
    /// Returns [`VaultError::InvalidConfig`] if `partition_size`,
    /// `active_shares`, or `chunk_capacity` is zero, or if `active_shares >
    /// partition_size`.
    pub fn new(
        partition_size: u32,
        active_shares: u32,
        unassigned_shares: u32,
        chunk_capacity: u32,
    ) -> Result<Self> {
        if partition_size == 0 {
            return Err(VaultError::InvalidConfig(
                "partition_size must be nonzero".into(),
            ));
        }
        if active_shares == 0 {
            return Err(VaultError::InvalidConfig(
                "active_shares must be nonzero".into(),
            ));
        }
        if active_shares > partition_size {
            return Err(VaultError::InvalidConfig(format!(
                "active_shares ({active_shares}) exceeds partition_size ({partition_size})"
            )));
        }
        if chunk_capacity == 0 {
            return Err(VaultError::InvalidConfig(
                "chunk_capacity must be nonzero".into(),
            ));
        }
        Ok(Self {
            partition_size,
            active_shares,
            unassigned_shares,
            chunk_capacity,
        })
    }

    /// A preset sized for small vaults (tests, demos): `partition_size=30000`,
    /// 4 KiB of encoded document capacity per region.
    pub fn small() -> Self {
        Self::new(30_000, 64, 10_000, 64).expect("built-in preset is valid")
    }

    pub fn partition_size(&self) -> u32 {
        self.partition_size
    }

    pub fn active_shares(&self) -> u32 {
        self.active_shares
    }

    pub fn unassigned_shares(&self) -> u32 {
        self.unassigned_shares
    }

    pub fn chunk_capacity(&self) -> u32 {
        self.chunk_capacity
    }

    /// Total size of the share-ID universe: `2 * partition_size +
    /// unassigned_shares` (invariant I1).
    pub fn share_id_space(&self) -> u64 {
        2 * self.partition_size as u64 + self.unassigned_shares as u64
    }

    /// Total number of share slots stored in the vault file:
    /// `share_id_space * active_shares`.
    pub fn total_slots(&self) -> u64 {
        self.share_id_space() * self.active_shares as u64
    }
}

/// Cryptographic work-factor and timing parameters.
///
/// Threaded explicitly through every public constructor rather than read
/// from a global singleton, so two vaults in the same process can use
/// different cost parameters if the caller wants that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CryptoParams {
    pub kdf_backend: KdfBackend,
    pub argon2_memory_kib: u32,
    pub argon2_time_cost: u32,
    pub argon2_parallelism: u32,
    pub pbkdf2_iterations: u32,
    pub wal_timeout: Duration,
    pub lock_timeout: Duration,
}

impl Default for CryptoParams {
    fn default() -> Self {
        Self {
            kdf_backend: KdfBackend::default(),
            argon2_memory_kib: ARGON2_MEMORY_KIB,
            argon2_time_cost: ARGON2_TIME_COST,
            argon2_parallelism: ARGON2_PARALLELISM,
            pbkdf2_iterations: PBKDF2_MIN_ITERATIONS,
            wal_timeout: WAL_TIMEOUT,
            lock_timeout: LOCK_TIMEOUT,
        }
    }
}

impl CryptoParams {
    /// Validates that cost parameters meet the documented minimums.
    pub fn validate(&self) -> Result<()> {
        if self.pbkdf2_iterations < PBKDF2_MIN_ITERATIONS {
            return Err(VaultError::InvalidConfig(format!(
                "pbkdf2_iterations ({}) below minimum ({PBKDF2_MIN_ITERATIONS})",
                self.pbkdf2_iterations
            )));
        }
        if self.argon2_memory_kib == 0
            || self.argon2_time_cost == 0
            || self.argon2_parallelism == 0
        {
            return Err(VaultError::InvalidConfig(
                "argon2 cost parameters must be nonzero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_partition_size() {
        assert!(VaultParams::new(0, 1, 1, 4).is_err());
    }

    #[test]
    fn rejects_active_shares_exceeding_partition() {
        assert!(VaultParams::new(10, 11, 0, 4).is_err());
    }

    #[test]
    fn rejects_zero_chunk_capacity() {
        assert!(VaultParams::new(10, 5, 0, 0).is_err());
    }

    #[test]
    fn share_id_space_matches_invariant() {
        let p = VaultParams::new(20, 5, 10, 4).unwrap();
        assert_eq!(p.share_id_space(), 50);
        assert_eq!(p.total_slots(), 250);
    }

    #[test]
    fn default_crypto_params_validate() {
        assert!(CryptoParams::default().validate().is_ok());
    }

    #[test]
    fn weak_pbkdf2_iterations_rejected() {
        let mut params = CryptoParams::default();
        params.pbkdf2_iterations = 1000;
        assert!(params.validate().is_err());
    }
}
