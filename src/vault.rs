//! Vault orchestration (§5): ties together the share-ID space, the
//! partition-map-key codec, the two-stage MAP, Shamir splitting, the
//! document codec, advisory locking, and the write-ahead log into the
//! public `create`/`read`/`update` operations.

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{self, DecodeOutcome};
use crate::config::{CryptoParams, VaultParams};
use crate::error::{Result, VaultError};
use crate::field::FieldElement;
use crate::id_space;
use crate::lock::VaultLock;
use crate::map;
use crate::partition_key;
use crate::shamir::{self, Share};
use crate::wal;

/// On-disk vault representation (§6). Every share slot is always populated
/// — real or garbage — so the file's shape betrays nothing about which
/// region holds which document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VaultFile {
    format_version: u32,
    /// Random 16-byte vault salt (§3 data model), base64-encoded. Generated
    /// fresh at `create` time and carried for wire-format parity with the
    /// reference JSON schema (§6); it is not mixed into any key derivation
    /// here, since Stage 1 draws its own per-key salt and Stage 2 uses a
    /// fixed purpose-separation salt (§4.4) — neither depends on a
    /// per-vault value.
    salt: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    share_id_space: u32,
    chunk_capacity: u32,
    active_shares: u32,
    partition_size: u32,
    unassigned_shares: u32,
    kdf_backend: crate::config::KdfBackend,
    argon2_memory_kib: u32,
    argon2_time_cost: u32,
    argon2_parallelism: u32,
    pbkdf2_iterations: u32,
    /// Flat, row-major `[chunk_index][share_id]` grid of field-element
    /// decimal strings, length `chunk_capacity * share_id_space`.
    shares: Vec<String>,
}

const FORMAT_VERSION: u32 = 1;

impl VaultFile {
    fn slot_index(&self, chunk_index: u32, share_id: u32) -> usize {
        chunk_index as usize * self.share_id_space as usize + share_id as usize
    }

    fn get(&self, chunk_index: u32, share_id: u32) -> Result<FieldElement> {
        let idx = self.slot_index(chunk_index, share_id);
        let raw = self.shares.get(idx).ok_or(VaultError::VaultFormat)?;
        FieldElement::from_decimal_string(raw).ok_or(VaultError::VaultFormat)
    }

    fn set(&mut self, chunk_index: u32, share_id: u32, value: &FieldElement) {
        let idx = self.slot_index(chunk_index, share_id);
        self.shares[idx] = value.to_decimal_string();
    }

    fn crypto_params(&self) -> CryptoParams {
        CryptoParams {
            kdf_backend: self.kdf_backend,
            argon2_memory_kib: self.argon2_memory_kib,
            argon2_time_cost: self.argon2_time_cost,
            argon2_parallelism: self.argon2_parallelism,
            pbkdf2_iterations: self.pbkdf2_iterations,
            ..CryptoParams::default()
        }
    }
}

/// The two partition-map-keys produced by [`Vault::create`], one per
/// document. Neither is written to the vault file; the caller is
/// responsible for delivering each to the party who should be able to
/// recover the corresponding document.
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub partition_map_key_a: String,
    pub partition_map_key_b: String,
}

/// A single-file dual-plaintext vault.
pub struct Vault;

impl Vault {
    /// Creates a new vault at `path` containing `document_a` (recoverable
    /// with `password_a`) and `document_b` (recoverable with `password_b`).
    ///
    /// # Errors
    /// [`VaultError::Capacity`] if either document does not fit in
    /// `params.chunk_capacity()` chunks; [`VaultError::Io`] for filesystem
    /// failures; [`VaultError::InvalidConfig`] if `crypto` fails
    /// validation.
    pub fn create(
        path: &Path,
        document_a: &Value,
        document_b: &Value,
        password_a: &[u8],
        password_b: &[u8],
        params: VaultParams,
        crypto: &CryptoParams,
    ) -> Result<CreateOutcome> {
        crypto.validate()?;
        tracing::info!(path = %path.display(), "creating vault");

        let lock = VaultLock::acquire(path, crypto.lock_timeout)?;

        let regions = id_space::divide(&params);
        let chunk_capacity = params.chunk_capacity();

        let active_a = map::stage2_select(password_a, &regions.a_ids, params.active_shares(), crypto);
        let active_b = map::stage2_select(password_b, &regions.b_ids, params.active_shares(), crypto);

        let chunks_a = codec::encode(document_a, chunk_capacity as usize)?;
        let chunks_b = codec::encode(document_b, chunk_capacity as usize)?;

        let share_id_space = params.share_id_space() as u32;
        let total_slots = chunk_capacity as usize * share_id_space as usize;
        let mut rng = OsRng;

        let mut vault_salt = [0u8; 16];
        rng.fill_bytes(&mut vault_salt);

        let mut file = VaultFile {
            format_version: FORMAT_VERSION,
            salt: BASE64.encode(vault_salt),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            share_id_space,
            chunk_capacity,
            active_shares: params.active_shares(),
            partition_size: params.partition_size(),
            unassigned_shares: params.unassigned_shares(),
            kdf_backend: crypto.kdf_backend,
            argon2_memory_kib: crypto.argon2_memory_kib,
            argon2_time_cost: crypto.argon2_time_cost,
            argon2_parallelism: crypto.argon2_parallelism,
            pbkdf2_iterations: crypto.pbkdf2_iterations,
            shares: vec![String::new(); total_slots],
        };

        // Every slot starts as garbage; real shares overwrite their slots
        // below. This ordering guarantees there is no slot left unfilled by
        // the time the file is written, regardless of how small
        // `active_shares` is relative to `share_id_space`.
        for chunk_index in 0..chunk_capacity {
            for share_id in 0..share_id_space {
                let garbage = shamir::garbage_share(&mut rng);
                file.set(chunk_index, share_id, &garbage);
            }
        }

        write_document_shares(&mut file, &chunks_a, &active_a, &mut rng);
        write_document_shares(&mut file, &chunks_b, &active_b, &mut rng);

        persist(path, &file)?;
        drop(lock);

        let partition_map_key_a = partition_key::encode(password_a, &regions.a_ids, crypto)?;
        let partition_map_key_b = partition_key::encode(password_b, &regions.b_ids, crypto)?;

        tracing::info!(path = %path.display(), "vault created");
        Ok(CreateOutcome {
            partition_map_key_a,
            partition_map_key_b,
        })
    }

    /// Recovers the document reachable with `password` and
    /// `partition_map_key`.
    ///
    /// Never raises an error for a wrong password or a tampered
    /// partition-map-key beyond [`VaultError::Decryption`]; an I/O or
    /// format problem with the vault file itself raises the corresponding
    /// variant instead (see the crate-level anti-oracle design notes).
    pub fn read(path: &Path, password: &[u8], partition_map_key: &str) -> Result<DecodeOutcome> {
        tracing::info!(path = %path.display(), "reading vault");
        let lock = VaultLock::acquire(path, CryptoParams::default().lock_timeout)?;

        if let Some(dir) = path.parent() {
            wal::recover(dir, path, CryptoParams::default().wal_timeout)?;
        }

        let file = load(path)?;
        let crypto = file.crypto_params();

        // Never propagate `Decryption` here: a wrong password must look
        // exactly like reading a vault that happens to hold a different,
        // undecodable document (§7 anti-oracle design). `resolve_or_pseudo`
        // substitutes a deterministic pseudo-region on Stage-1 failure so
        // this function always proceeds to reconstruct *something*.
        let active_map = map::resolve_or_pseudo(
            password,
            partition_map_key,
            file.active_shares,
            file.partition_size,
            file.share_id_space,
            &crypto,
        );

        let mut per_chunk_shares = Vec::with_capacity(file.chunk_capacity as usize);
        for chunk_index in 0..file.chunk_capacity {
            let mut shares = Vec::with_capacity(active_map.active_ids.len());
            for &share_id in &active_map.active_ids {
                let value = file.get(chunk_index, share_id)?;
                shares.push(Share { share_id, value });
            }
            per_chunk_shares.push(shares);
        }
        // Each chunk's Lagrange interpolation is independent of every other
        // chunk's, so reconstruction is embarrassingly parallel across
        // chunks (§5) once the per-chunk share lists are in hand.
        let chunks: Vec<[u8; crate::config::CHUNK_SIZE]> = per_chunk_shares
            .par_iter()
            .map(|shares| shamir::reconstruct_chunk(shares))
            .collect();

        drop(lock);
        tracing::info!(path = %path.display(), "vault read complete");
        Ok(codec::decode(&chunks))
    }

    /// Replaces the document reachable with `password`/`partition_map_key`
    /// with `new_document`, leaving the other document and all garbage
    /// slots untouched.
    pub fn update(
        path: &Path,
        password: &[u8],
        partition_map_key: &str,
        new_document: &Value,
    ) -> Result<()> {
        tracing::info!(path = %path.display(), "updating vault");
        let lock = VaultLock::acquire(path, CryptoParams::default().lock_timeout)?;

        if let Some(dir) = path.parent() {
            wal::recover(dir, path, CryptoParams::default().wal_timeout)?;
        }

        let mut file = load(path)?;
        let crypto = file.crypto_params();

        let active_map = map::resolve(
            password,
            partition_map_key,
            file.active_shares,
            file.partition_size,
            &crypto,
        )?;
        let chunks = codec::encode(new_document, file.chunk_capacity as usize)?;

        let mut rng = OsRng;
        write_document_shares(&mut file, &chunks, &active_map.active_ids, &mut rng);
        file.updated_at = Utc::now();

        persist(path, &file)?;
        drop(lock);
        tracing::info!(path = %path.display(), "vault update complete");
        Ok(())
    }
}

fn write_document_shares(
    file: &mut VaultFile,
    chunks: &[[u8; crate::config::CHUNK_SIZE]],
    active_ids: &[u32],
    rng: &mut OsRng,
) {
    // Splitting is independent per chunk, but `rand::rngs::OsRng` can't be
    // shared across threads as a single stream: draw one fresh seed per
    // chunk up front (sequentially, from the caller's RNG) and hand each
    // chunk its own `ChaCha20Rng`, then split across chunks in parallel.
    use rand::RngCore;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    let seeds: Vec<[u8; 32]> = chunks
        .iter()
        .map(|_| {
            let mut seed = [0u8; 32];
            rng.fill_bytes(&mut seed);
            seed
        })
        .collect();

    let all_shares: Vec<Vec<Share>> = chunks
        .par_iter()
        .zip(seeds.par_iter())
        .map(|(chunk, seed)| {
            let mut chunk_rng = ChaCha20Rng::from_seed(*seed);
            shamir::split_chunk(chunk, active_ids, &mut chunk_rng)
        })
        .collect();

    for (chunk_index, shares) in all_shares.into_iter().enumerate() {
        for share in shares {
            file.set(chunk_index as u32, share.share_id, &share.value);
        }
    }
}

fn load(path: &Path) -> Result<VaultFile> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|_| VaultError::VaultFormat)
}

fn persist(path: &Path, file: &VaultFile) -> Result<()> {
    let bytes = serde_json::to_vec(file).expect("VaultFile is always serializable");
    let record = wal::begin(path, &bytes)?;
    wal::commit(record)
}
