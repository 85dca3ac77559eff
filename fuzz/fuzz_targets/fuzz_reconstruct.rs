#![no_main]

use dual_vault::field::FieldElement;
use dual_vault::shamir::{self, Share};
use libfuzzer_sys::fuzz_target;

// Fuzzing target for `shamir::reconstruct_chunk`.
//
// Unlike a threshold scheme, reconstruction here consumes every share it is
// given with no subset search (§4.5) — so there is no "invalid" share count
// to reject. The goal is only to confirm that arbitrary share IDs, arbitrary
// (possibly duplicate, possibly out-of-field) values, and arbitrary share
// counts never panic, regardless of how malformed the input is.
fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let num_shares = (data[0] % 32).max(1) as usize;
    let mut offset = 1usize;
    let mut shares = Vec::with_capacity(num_shares);

    for _ in 0..num_shares {
        if offset + 4 > data.len() {
            break;
        }
        let share_id = u32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]);
        offset += 4;

        let mut chunk = [0u8; 64];
        let available = data.len().saturating_sub(offset).min(64);
        chunk[..available].copy_from_slice(&data[offset..offset + available]);
        offset += available;

        shares.push(Share {
            share_id,
            value: FieldElement::from_chunk_be(&chunk),
        });
    }

    // Reconstruction must never panic, including on an empty share list,
    // duplicate share IDs, or share IDs that collide with x=0.
    let _ = shamir::reconstruct_chunk(&shares);
    let _ = shamir::reconstruct_chunk(&[]);

    if shares.len() >= 2 {
        let duplicated = vec![shares[0].clone(), shares[0].clone()];
        let _ = shamir::reconstruct_chunk(&duplicated);
    }
});
