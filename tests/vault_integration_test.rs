use std::collections::HashSet;

use dual_vault::{CryptoParams, DecodeOutcome, Vault, VaultParams};
use serde_json::json;
use tempfile::tempdir;

fn fast_crypto() -> CryptoParams {
    CryptoParams {
        argon2_memory_kib: 8,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
        ..CryptoParams::default()
    }
}

fn small_params() -> VaultParams {
    VaultParams::new(50, 8, 20, 3).unwrap()
}

#[test]
fn round_trip_recovers_both_documents_independently() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.json");
    let crypto = fast_crypto();

    let doc_a = json!({"role": "decoy", "note": "grocery list"});
    let doc_b = json!({"role": "real", "accounts": [1, 2, 3]});

    let outcome = Vault::create(
        &path,
        &doc_a,
        &doc_b,
        b"alpha-password",
        b"beta-password",
        small_params(),
        &crypto,
    )
    .unwrap();

    match Vault::read(&path, b"alpha-password", &outcome.partition_map_key_a).unwrap() {
        DecodeOutcome::Json(v) => assert_eq!(v, doc_a),
        DecodeOutcome::Opaque(_) => panic!("document A should decode cleanly"),
    }
    match Vault::read(&path, b"beta-password", &outcome.partition_map_key_b).unwrap() {
        DecodeOutcome::Json(v) => assert_eq!(v, doc_b),
        DecodeOutcome::Opaque(_) => panic!("document B should decode cleanly"),
    }
}

#[test]
fn ten_creates_never_reuse_the_same_share_id_assignment() {
    // Disjointness and non-determinism across repeated `create` calls
    // (invariants I1/I2): no two runs should assign document A the same
    // share-ID set, and A/B must stay disjoint within every single run.
    let crypto = fast_crypto();
    let mut seen_a_keys: HashSet<String> = HashSet::new();

    for i in 0..10 {
        let dir = tempdir().unwrap();
        let path = dir.path().join(format!("vault-{i}.json"));
        let outcome = Vault::create(
            &path,
            &json!({"i": i}),
            &json!({"i": i, "flip": true}),
            b"pw-a",
            b"pw-b",
            small_params(),
            &crypto,
        )
        .unwrap();

        assert!(
            seen_a_keys.insert(outcome.partition_map_key_a.clone()),
            "partition-map-key for A repeated across independent creates"
        );

        match Vault::read(&path, b"pw-a", &outcome.partition_map_key_a).unwrap() {
            DecodeOutcome::Json(v) => assert_eq!(v, json!({"i": i})),
            DecodeOutcome::Opaque(_) => panic!("document A should decode cleanly on run {i}"),
        }
    }
}

#[test]
fn updating_one_document_never_disturbs_the_other_across_interleaved_writes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.json");
    let crypto = fast_crypto();

    let outcome = Vault::create(
        &path,
        &json!({"counter": 0}),
        &json!({"counter": 100}),
        b"pw-a",
        b"pw-b",
        small_params(),
        &crypto,
    )
    .unwrap();

    for step in 1..=3 {
        Vault::update(
            &path,
            b"pw-a",
            &outcome.partition_map_key_a,
            &json!({"counter": step}),
        )
        .unwrap();
        Vault::update(
            &path,
            b"pw-b",
            &outcome.partition_map_key_b,
            &json!({"counter": 100 + step}),
        )
        .unwrap();

        match Vault::read(&path, b"pw-a", &outcome.partition_map_key_a).unwrap() {
            DecodeOutcome::Json(v) => assert_eq!(v, json!({"counter": step})),
            DecodeOutcome::Opaque(_) => panic!("document A should decode cleanly at step {step}"),
        }
        match Vault::read(&path, b"pw-b", &outcome.partition_map_key_b).unwrap() {
            DecodeOutcome::Json(v) => assert_eq!(v, json!({"counter": 100 + step})),
            DecodeOutcome::Opaque(_) => panic!("document B should decode cleanly at step {step}"),
        }
    }
}

#[test]
fn wrong_password_and_wrong_partition_map_key_both_look_like_reading_garbage() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.json");
    let crypto = fast_crypto();

    let outcome = Vault::create(
        &path,
        &json!({"a": true}),
        &json!({"b": true}),
        b"pw-a",
        b"pw-b",
        small_params(),
        &crypto,
    )
    .unwrap();

    // Wrong password, correct partition-map-key.
    let r1 = Vault::read(&path, b"totally-wrong", &outcome.partition_map_key_a);
    assert!(r1.is_ok(), "a wrong password must not raise Decryption from read");

    // Correct password, garbage partition-map-key.
    let r2 = Vault::read(&path, b"pw-a", "not-a-real-partition-map-key");
    assert!(
        r2.is_ok(),
        "a garbage partition-map-key must not raise Decryption from read either"
    );
}

#[test]
fn unassigned_share_ids_never_overlap_either_document_region() {
    // A three-run smoke test that no A/B partition-map-key ever accidentally
    // decodes to a region overlapping the other region. Exercised indirectly:
    // document A updates must never corrupt document B's bytes.
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.json");
    let crypto = fast_crypto();

    let big_b_doc = json!({"payload": "b".repeat(40)});
    let outcome = Vault::create(
        &path,
        &json!({"payload": "a"}),
        &big_b_doc,
        b"pw-a",
        b"pw-b",
        small_params(),
        &crypto,
    )
    .unwrap();

    for n in 0..5 {
        Vault::update(
            &path,
            b"pw-a",
            &outcome.partition_map_key_a,
            &json!({"payload": format!("a-{n}")}),
        )
        .unwrap();
    }

    match Vault::read(&path, b"pw-b", &outcome.partition_map_key_b).unwrap() {
        DecodeOutcome::Json(v) => assert_eq!(v, big_b_doc),
        DecodeOutcome::Opaque(_) => panic!("document B must survive repeated A-side updates"),
    }
}

#[test]
fn update_with_wrong_password_fails_closed_rather_than_writing_garbage() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.json");
    let crypto = fast_crypto();

    let outcome = Vault::create(
        &path,
        &json!({"v": 1}),
        &json!({"v": 2}),
        b"pw-a",
        b"pw-b",
        small_params(),
        &crypto,
    )
    .unwrap();

    let result = Vault::update(
        &path,
        b"wrong-password",
        &outcome.partition_map_key_a,
        &json!({"v": 999}),
    );
    assert!(result.is_err(), "update must fail closed on a wrong password");

    // Both documents must be untouched after the failed update attempt.
    match Vault::read(&path, b"pw-a", &outcome.partition_map_key_a).unwrap() {
        DecodeOutcome::Json(v) => assert_eq!(v, json!({"v": 1})),
        DecodeOutcome::Opaque(_) => panic!("document A should be unaffected by a failed update"),
    }
    match Vault::read(&path, b"pw-b", &outcome.partition_map_key_b).unwrap() {
        DecodeOutcome::Json(v) => assert_eq!(v, json!({"v": 2})),
        DecodeOutcome::Opaque(_) => panic!("document B should be unaffected by a failed update"),
    }
}

#[test]
fn vault_file_never_contains_plaintext_document_content() {
    // Statistical-indistinguishability smoke test: the raw on-disk bytes
    // must not contain any substring of either plaintext document, since
    // every slot (real or garbage) is stored only as a field-element
    // decimal string.
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.json");
    let crypto = fast_crypto();

    let secret_marker_a = "xyzzy-alpha-marker-does-not-appear-raw";
    let secret_marker_b = "plugh-beta-marker-does-not-appear-raw";

    Vault::create(
        &path,
        &json!({"marker": secret_marker_a}),
        &json!({"marker": secret_marker_b}),
        b"pw-a",
        b"pw-b",
        small_params(),
        &crypto,
    )
    .unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(!raw.contains(secret_marker_a));
    assert!(!raw.contains(secret_marker_b));
}
