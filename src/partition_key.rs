//! Partition-map-key codec (§4.3): encrypts one region's share-ID list under
//! a password, and formats the result as a compact, shareable string that is
//! never stored inside the vault file itself.
//!
//! A partition-map-key carries no indication of which region it opens, or
//! even that it is a `dual_vault` key at all, beyond its length: the wire
//! format is `salt || nonce || ciphertext+tag`, base64url-encoded with no
//! padding and no magic bytes.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::Argon2;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::Hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;

use crate::config::{CryptoParams, KDF_OUTPUT_LEN, KdfBackend};
use crate::error::{Result, VaultError};
#[cfg(feature = "zeroize")]
use zeroize::Zeroizing;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

/// Derived AES-256-GCM key material. With the `zeroize` feature (the
/// crate's default), the buffer is wiped when it goes out of scope — a
/// password-derived key must not linger in process memory longer than the
/// single encrypt/decrypt call that needs it (§5 shared-resource policy).
#[cfg(feature = "zeroize")]
type DerivedKey = Zeroizing<[u8; KDF_OUTPUT_LEN]>;
#[cfg(not(feature = "zeroize"))]
type DerivedKey = [u8; KDF_OUTPUT_LEN];

#[cfg(feature = "zeroize")]
fn into_derived_key(bytes: [u8; KDF_OUTPUT_LEN]) -> DerivedKey {
    Zeroizing::new(bytes)
}
#[cfg(not(feature = "zeroize"))]
fn into_derived_key(bytes: [u8; KDF_OUTPUT_LEN]) -> DerivedKey {
    bytes
}

/// Encodes `share_ids` under `password`, returning a hyphenated base64url
/// string suitable for a user to copy, print, or store in a password
/// manager separately from the vault file.
pub fn encode(password: &[u8], share_ids: &[u32], crypto: &CryptoParams) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let key_bytes = derive_key(password, &salt, crypto)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key_bytes.as_slice()));
    let nonce = Nonce::from_slice(&nonce_bytes);

    let plaintext = encode_id_list(share_ids);
    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_slice())
        .map_err(|_| VaultError::Decryption)?;

    let mut wire = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    wire.extend_from_slice(&salt);
    wire.extend_from_slice(&nonce_bytes);
    wire.extend_from_slice(&ciphertext);

    Ok(hyphenate(&URL_SAFE_NO_PAD.encode(wire)))
}

/// A fixed stand-in salt used only to pay the KDF's cost on a structurally
/// malformed key (bad base64, too-short wire payload), so that failure path
/// costs the same as a well-formed key with a wrong password. Never used to
/// derive a key that is actually trusted for anything.
const DUMMY_SALT: [u8; SALT_LEN] = [0u8; SALT_LEN];

/// Recovers the share-ID list encoded by [`encode`].
///
/// `partition_size` is the expected length of the recovered ID list (§4.3):
/// a list of any other length fails the same way as a wrong password.
///
/// Every failure path here — malformed base64, too-short payload, AEAD tag
/// mismatch, wrong-length decoded ID list — collapses to the single
/// [`VaultError::Decryption`] variant, and all of them run the KDF before
/// returning so none of them is cheaper than the others: a caller who gets
/// this error learns nothing about *why* it failed, including not through
/// timing (see the crate-level anti-oracle design notes).
pub fn decode(
    password: &[u8],
    key_str: &str,
    partition_size: usize,
    crypto: &CryptoParams,
) -> Result<Vec<u32>> {
    let compact: String = key_str.chars().filter(|c| *c != '-').collect();
    let wire = match URL_SAFE_NO_PAD.decode(compact.as_bytes()) {
        Ok(bytes) if bytes.len() >= SALT_LEN + NONCE_LEN => bytes,
        _ => {
            // Structurally malformed: still pay the KDF's cost before
            // failing, so this path is not distinguishable by timing from
            // a well-formed key with a wrong password.
            let _ = derive_key(password, &DUMMY_SALT, crypto);
            return Err(VaultError::Decryption);
        }
    };

    let (salt, rest) = wire.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let key_bytes = derive_key(password, salt, crypto)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key_bytes.as_slice()));
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| VaultError::Decryption)?;

    let ids = decode_id_list(&plaintext).ok_or(VaultError::Decryption)?;
    if ids.len() != partition_size {
        return Err(VaultError::Decryption);
    }
    Ok(ids)
}

/// Inserts a hyphen every 5 characters, purely for human readability when a
/// partition-map-key is transcribed or printed. Cosmetic only: [`decode`]
/// strips hyphens before decoding.
fn hyphenate(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 5);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && i % 5 == 0 {
            out.push('-');
        }
        out.push(c);
    }
    out
}

fn derive_key(password: &[u8], salt: &[u8], crypto: &CryptoParams) -> Result<DerivedKey> {
    let mut out = [0u8; KDF_OUTPUT_LEN];
    match crypto.kdf_backend {
        KdfBackend::Argon2id => {
            let params = argon2::Params::new(
                crypto.argon2_memory_kib,
                crypto.argon2_time_cost,
                crypto.argon2_parallelism,
                Some(KDF_OUTPUT_LEN),
            )
            .map_err(|_| VaultError::InvalidConfig("invalid argon2 parameters".into()))?;
            let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
            argon2
                .hash_password_into(password, salt, &mut out)
                .map_err(|_| VaultError::InvalidConfig("argon2 derivation failed".into()))?;
        }
        KdfBackend::Pbkdf2 => {
            pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, crypto.pbkdf2_iterations, &mut out)
                .map_err(|_| VaultError::InvalidConfig("pbkdf2 derivation failed".into()))?;
        }
    }
    Ok(into_derived_key(out))
}

/// Encodes a share-ID list as: a varint count, followed by each ID's delta
/// from the previous one (zigzag-encoded, since a shuffled list is not
/// sorted and deltas may be negative), varint-encoded. This keeps the
/// plaintext small without requiring the list to be sorted — sorting would
/// destroy the positional order Stage 2 of the MAP depends on.
fn encode_id_list(ids: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ids.len() * 2 + 4);
    write_varint(&mut out, ids.len() as u64);
    let mut prev: i64 = 0;
    for &id in ids {
        let delta = id as i64 - prev;
        write_varint(&mut out, zigzag_encode(delta));
        prev = id as i64;
    }
    out
}

fn decode_id_list(bytes: &[u8]) -> Option<Vec<u32>> {
    let mut cursor = 0usize;
    let count = read_varint(bytes, &mut cursor)?;
    let mut ids = Vec::with_capacity(count as usize);
    let mut prev: i64 = 0;
    for _ in 0..count {
        let zigzag = read_varint(bytes, &mut cursor)?;
        let delta = zigzag_decode(zigzag);
        let value = prev + delta;
        if !(0..=u32::MAX as i64).contains(&value) {
            return None;
        }
        ids.push(value as u32);
        prev = value;
    }
    if cursor != bytes.len() {
        return None;
    }
    Some(ids)
}

fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

fn read_varint(bytes: &[u8], cursor: &mut usize) -> Option<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *bytes.get(*cursor)?;
        *cursor += 1;
        value |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Some(value);
        }
        shift += 7;
        if shift >= 64 {
            return None;
        }
    }
}
