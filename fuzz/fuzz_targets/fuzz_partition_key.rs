#![no_main]

use dual_vault::config::CryptoParams;
use dual_vault::{Result, VaultError};
use libfuzzer_sys::fuzz_target;

fn fast_crypto() -> CryptoParams {
    // Cheap Argon2id cost so the fuzzer can explore quickly; the codec's
    // control flow does not depend on the KDF's cost parameters.
    CryptoParams {
        argon2_memory_kib: 8,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
        ..CryptoParams::default()
    }
}

// Fuzzing target for `partition_key::decode`.
//
// A partition-map-key is attacker-observable: it is handed to whoever holds
// one of the two document secrets, and the codec is stateless with respect
// to region identity (§4.3). This target feeds arbitrary byte strings in as
// both the "password" and the "key string" (after a lossy UTF-8 conversion,
// since the public API takes a `&str`) and asserts only that decoding never
// panics and always collapses to `VaultError::Decryption` on malformed
// input, never some other error variant that would leak a diagnostic.
fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let split = data[0] as usize % data.len().max(1);
    let (password, rest) = data.split_at(split.min(data.len()));
    let key_str = String::from_utf8_lossy(rest);

    let crypto = fast_crypto();
    let partition_size = 20usize;
    let result: Result<Vec<u32>> =
        dual_vault::partition_key::decode(password, &key_str, partition_size, &crypto);
    if let Err(err) = result {
        assert!(matches!(err, VaultError::Decryption));
    }
});
