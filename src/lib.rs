//! A multi-plaintext secret-sharing vault.
//!
//! A single on-disk container file holds two independent JSON documents. A
//! caller who knows one `(partition-map-key, password)` pair recovers one
//! document; a caller who knows the other pair recovers the other. Neither
//! pair, nor the file itself, reveals which region of the file belongs to
//! which document, which slots are "real" versus padding, or whether a
//! given key even opens this vault at all — an observer with the full
//! source and the ciphertext but lacking both secrets learns nothing.
//! Security rests entirely in the two secrets, per Kerckhoffs's principle.
//!
//! # Architecture
//!
//! Seven cooperating layers, leaves first:
//!
//! 1. [`field`] — arithmetic in `GF(p)`, `p = 2^521 - 1`.
//! 2. [`id_space`] — partitions the share-ID universe into disjoint A / B /
//!    unassigned regions at vault-creation time.
//! 3. [`partition_key`] — encrypts/decrypts one region's share-ID list under
//!    a password, producing the portable partition-map-key string.
//! 4. [`map`] — the two-stage MAP: from `(partition-map-key, password)`,
//!    deterministically derives the exact ordered share-ID slots one
//!    document occupies.
//! 5. [`shamir`] — splits/reconstructs 64-byte chunks as Shamir shares, and
//!    draws garbage shares that are statistically indistinguishable from
//!    real ones.
//! 6. [`codec`] — encodes a JSON document into a fixed-length chunk stream
//!    and back, with self-describing padding to a configured budget.
//! 7. [`vault`] — ties the above into `create`/`read`/`update`, with a
//!    write-ahead log ([`wal`]) for crash-safe atomic updates and an
//!    advisory file lock ([`lock`]) for cross-process serialization.
//!
//! # Example
//!
//! ```
//! use dual_vault::{CryptoParams, Vault, VaultParams, DecodeOutcome};
//! use serde_json::json;
//! use tempfile::tempdir;
//!
//! let dir = tempdir().unwrap();
//! let path = dir.path().join("vault.json");
//!
//! // Small parameters for a doctest; production callers use
//! // `VaultParams::small()` or larger.
//! let params = VaultParams::new(40, 6, 12, 2).unwrap();
//! let crypto = CryptoParams {
//!     argon2_memory_kib: 8,
//!     argon2_time_cost: 1,
//!     argon2_parallelism: 1,
//!     ..CryptoParams::default()
//! };
//!
//! let outcome = Vault::create(
//!     &path,
//!     &json!({"role": "decoy"}),
//!     &json!({"role": "real", "balance": 1_000_000}),
//!     b"alpha-password",
//!     b"beta-password",
//!     params,
//!     &crypto,
//! ).unwrap();
//!
//! match Vault::read(&path, b"beta-password", &outcome.partition_map_key_b).unwrap() {
//!     DecodeOutcome::Json(doc) => assert_eq!(doc["balance"], 1_000_000),
//!     DecodeOutcome::Opaque(_) => panic!("expected document B to decode cleanly"),
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod field;
pub mod id_space;
pub mod lock;
pub mod map;
pub mod partition_key;
pub mod shamir;
pub mod vault;
pub mod wal;

pub use codec::DecodeOutcome;
pub use config::{CryptoParams, KdfBackend, VaultParams};
pub use error::{Result, VaultError};
pub use vault::{CreateOutcome, Vault};

/// Re-exports the common surface a caller builds a CLI or service on top of.
pub mod prelude {
    pub use super::{
        CreateOutcome, CryptoParams, DecodeOutcome, KdfBackend, Result, Vault, VaultError,
        VaultParams,
    };
}
