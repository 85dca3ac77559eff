//! Document codec (§4.6): turns a JSON document into a fixed-size byte
//! budget of 64-byte chunks, and back.
//!
//! The encode pipeline is: canonical JSON → UTF-8 bytes → base64 → padding
//! to the chunk budget. The "Latin-1 reinterpretation" step the design notes
//! describe is a no-op at the byte level — reinterpreting UTF-8 bytes as
//! Latin-1 code points and reinterpreting them back is the identity function
//! on the underlying bytes — so this module only performs the base64 and
//! padding stages explicitly.

use serde_json::Value;

use crate::config::CHUNK_SIZE;
use crate::error::{Result, VaultError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Marks the first padding byte after the encoded document; followed by
/// zero bytes out to the chunk budget.
const PADDING_MARKER: u8 = 0x80;

/// What [`decode`] recovered from a chunk sequence.
///
/// Decoding never raises an error for malformed content — only a
/// `VaultFormat`/`Decryption`-class error from *earlier* pipeline stages
/// (AEAD, MAP) can do that. A chunk sequence that fails to parse as the
/// document pipeline produced it is simply [`DecodeOutcome::Opaque`]: this
/// is expected for garbage shares and for documents written by a different
/// `dual_vault` revision.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    /// The chunk sequence decoded cleanly through every pipeline stage to a
    /// JSON value.
    Json(Value),
    /// Decoding failed at some stage; this is the raw byte sequence that
    /// remained once the padding/base64/UTF-8 stages that succeeded were
    /// undone, for callers that want to inspect it.
    Opaque(Vec<u8>),
}

/// Encodes `value` into exactly `target_chunk_count` 64-byte chunks.
///
/// # Errors
/// Returns [`VaultError::Capacity`] if the base64-encoded, padded document
/// does not fit in `target_chunk_count * 64` bytes. This check runs before
/// any share is touched.
pub fn encode(value: &Value, target_chunk_count: usize) -> Result<Vec<[u8; CHUNK_SIZE]>> {
    let json_bytes = serde_json::to_vec(value).map_err(|_| VaultError::VaultFormat)?;
    let payload = maybe_compress(json_bytes);
    let encoded = BASE64.encode(payload);

    let budget = target_chunk_count * CHUNK_SIZE;
    // +1 for the mandatory padding marker, even when encoded already fills
    // the budget exactly: the marker must always be present so decode can
    // tell padding from document content.
    if encoded.len() + 1 > budget {
        return Err(VaultError::Capacity {
            overflow_bytes: encoded.len() + 1 - budget,
        });
    }

    let mut padded = encoded.into_bytes();
    padded.push(PADDING_MARKER);
    padded.resize(budget, 0u8);

    Ok(padded.chunks_exact(CHUNK_SIZE).map(to_array).collect())
}

/// Reverses [`encode`], never raising an error: a chunk sequence that does
/// not decode cleanly produces [`DecodeOutcome::Opaque`] instead.
pub fn decode(chunks: &[[u8; CHUNK_SIZE]]) -> DecodeOutcome {
    let mut raw = Vec::with_capacity(chunks.len() * CHUNK_SIZE);
    for chunk in chunks {
        raw.extend_from_slice(chunk);
    }

    let unpadded = match strip_padding(&raw) {
        Some(bytes) => bytes,
        None => return DecodeOutcome::Opaque(raw),
    };

    let decoded = match BASE64.decode(unpadded) {
        Ok(bytes) => bytes,
        Err(_) => return DecodeOutcome::Opaque(unpadded.to_vec()),
    };

    let decompressed = match maybe_decompress(&decoded) {
        Some(bytes) => bytes,
        None => return DecodeOutcome::Opaque(decoded),
    };

    match serde_json::from_slice::<Value>(&decompressed) {
        Ok(value) => DecodeOutcome::Json(value),
        Err(_) => DecodeOutcome::Opaque(decompressed),
    }
}

/// Fixed compression level used when the `compress` feature is enabled, so
/// the pipeline's cost and output shape never branch on document content
/// (§4.6: compression, if present at all, runs at a fixed level).
#[cfg(feature = "compress")]
const ZSTD_LEVEL: i32 = 3;

#[cfg(feature = "compress")]
fn maybe_compress(bytes: Vec<u8>) -> Vec<u8> {
    zstd::encode_all(bytes.as_slice(), ZSTD_LEVEL).unwrap_or(bytes)
}

#[cfg(not(feature = "compress"))]
fn maybe_compress(bytes: Vec<u8>) -> Vec<u8> {
    bytes
}

/// Reverses [`maybe_compress`]. A failure here folds into the same
/// undecodable-payload outcome as every other stage (§7 error discipline) —
/// it never raises a distinct error, only `None`.
#[cfg(feature = "compress")]
fn maybe_decompress(bytes: &[u8]) -> Option<Vec<u8>> {
    zstd::decode_all(bytes).ok()
}

#[cfg(not(feature = "compress"))]
fn maybe_decompress(bytes: &[u8]) -> Option<Vec<u8>> {
    Some(bytes.to_vec())
}

/// Finds the rightmost non-zero byte; if it is the padding marker, returns
/// everything before it. Any other trailing non-zero byte (or an all-zero
/// buffer) means this is not a validly padded document.
fn strip_padding(raw: &[u8]) -> Option<&[u8]> {
    let last_nonzero = raw.iter().rposition(|&b| b != 0)?;
    if raw[last_nonzero] == PADDING_MARKER {
        Some(&raw[..last_nonzero])
    } else {
        None
    }
}

fn to_array(slice: &[u8]) -> [u8; CHUNK_SIZE] {
    let mut out = [0u8; CHUNK_SIZE];
    out.copy_from_slice(slice);
    out
}
