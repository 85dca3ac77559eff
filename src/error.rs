use thiserror::Error;

/// Error type for vault operations.
///
/// Variants are deliberately coarse: per the anti-oracle design (see the
/// crate-level docs), a caller must not be able to distinguish "wrong
/// password" from "tampered ciphertext" from "corrupted file" through the
/// error channel alone, except where the vault file itself is unreadable at
/// the filesystem level.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Filesystem access failed: permission denied, file not found, lock
    /// unavailable. The only variant that may carry OS-level detail.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// AEAD tag mismatch when opening a partition-map-key, or a structurally
    /// malformed key. Deliberately carries no detail distinguishing a wrong
    /// password from a tampered key.
    #[error("decryption failed")]
    Decryption,

    /// The document exceeds the encoded-chunk budget for this vault's
    /// `ACTIVE_SHARES`. Raised before any share is touched.
    #[error("document exceeds vault capacity by {overflow_bytes} byte(s)")]
    Capacity { overflow_bytes: usize },

    /// The vault file is not valid JSON or does not have the expected
    /// structure. Distinct from `Decryption`: this signals corruption or a
    /// wrong file, not a wrong secret.
    #[error("vault file is malformed")]
    VaultFormat,

    /// The advisory lock on the vault could not be acquired within the
    /// configured timeout.
    #[error("could not acquire vault lock within {0:?}")]
    Lock(std::time::Duration),

    /// A `VaultParams`/`CryptoParams` value was out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, VaultError>;
