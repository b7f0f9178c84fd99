//! Property and scenario tests across the whole vault.

use std::future::Future;
use std::sync::Arc;

use proptest::prelude::*;
use vaultify::{EnvelopeEngine, VaultError};
use vaultify_core::{CryptoError, LedgerAction};
use vaultify_ledger::LedgerAnchor;
use vaultify_share::verifier::{MSG_EXPIRED, MSG_LEDGER_OFFLINE, MSG_REVOKED};
use vaultify_share::{InvalidToken, Layer, TokenValidation};
use vaultify_store::MemoryBlobStore;
use vaultify_testkit::generators::{flip_bit, plaintext, timestamp, ttl_hours, SignedField};
use vaultify_testkit::{keypair, other_keypair, ShareFixture, TestVault};

const MINUTE: i64 = 60_000;
const HOUR: i64 = 60 * MINUTE;
const T0: i64 = 1_700_000_000_000;

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn engine() -> (EnvelopeEngine, Arc<MemoryBlobStore>) {
    let blobs = Arc::new(MemoryBlobStore::new());
    (EnvelopeEngine::new(blobs.clone()), blobs)
}

// ─────────────────────────────────────────────────────────────────────────────
// Envelope encryption
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_store_then_retrieve_is_identity(data in plaintext(4096)) {
        let (engine, _) = engine();
        let out = block_on(async {
            let cred = engine.store(&data, "p", keypair().public_key(), 1, 0).await.unwrap();
            engine.retrieve(&cred, keypair().private_key()).await.unwrap()
        });
        prop_assert_eq!(out, data);
    }

    #[test]
    fn prop_any_bit_flip_is_detected(data in plaintext(512), index: usize, bit: u8) {
        let (engine, blobs) = engine();
        let result = block_on(async {
            let cred = engine.store(&data, "p", keypair().public_key(), 1, 0).await.unwrap();
            blobs.tamper(&cred.id, |b| flip_bit(b, index, bit)).unwrap();
            engine.retrieve(&cred, keypair().private_key()).await
        });
        prop_assert!(matches!(result, Err(VaultError::Crypto(CryptoError::Decryption))));
    }

    #[test]
    fn prop_mismatched_key_never_decrypts(data in plaintext(512)) {
        let (engine, _) = engine();
        let result = block_on(async {
            let cred = engine.store(&data, "p", keypair().public_key(), 1, 0).await.unwrap();
            engine.retrieve(&cred, other_keypair().private_key()).await
        });
        prop_assert!(matches!(result, Err(VaultError::Crypto(CryptoError::Decryption))));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Certificates
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_mutating_a_signed_field_fails_integrity(field: SignedField, salt: u8) {
        let verdict = block_on(async {
            let fixture = ShareFixture::new().await;
            let (token, issued) = fixture.share(1, T0).await;
            let mut cert = issued.certificate.clone();
            field.mutate(&mut cert, salt);
            fixture.verifier.verify(&cert, &token.value, T0).await.unwrap()
        });
        prop_assert!(!verdict.valid);
        prop_assert_eq!(verdict.failed_layer, Some(Layer::Integrity));
    }

    #[test]
    fn prop_revoked_is_terminal(
        ttl in ttl_hours(),
        later in prop::collection::vec(timestamp(), 1..8),
    ) {
        let outcomes = block_on(async {
            let fixture = ShareFixture::new().await;
            let (token, _) = fixture.share(ttl, T0).await;
            fixture.tokens.revoke(&token.value).await.unwrap();
            // A sweep far in the future must not forget the revocation.
            fixture.tokens.sweep_expired(i64::MAX).await.unwrap();

            let mut outcomes = Vec::new();
            for now in later.iter().copied().chain([T0, T0 + 1]) {
                outcomes.push(fixture.tokens.validate(&token.value, now).await.unwrap());
            }
            outcomes
        });
        for outcome in outcomes {
            prop_assert_eq!(outcome, TokenValidation::Invalid(InvalidToken::Revoked));
        }
    }

    #[test]
    fn prop_validity_flips_exactly_at_expiry(t0 in timestamp(), ttl in ttl_hours()) {
        let (before, at, token) = block_on(async {
            let fixture = ShareFixture::new().await;
            let (token, _) = fixture.share(ttl, t0).await;
            let expiry = t0 + ttl * HOUR;
            (
                fixture.tokens.validate(&token.value, expiry - 1).await.unwrap(),
                fixture.tokens.validate(&token.value, expiry).await.unwrap(),
                token,
            )
        });
        prop_assert_eq!(token.expiry, t0 + ttl * HOUR);
        prop_assert!(before.is_valid());
        prop_assert_eq!(at, TokenValidation::Invalid(InvalidToken::Expired));
        prop_assert!(token.is_valid(token.expiry - 1));
        prop_assert!(!token.is_valid(token.expiry));
    }
}

#[tokio::test]
async fn test_expiry_boundary_around_now() {
    let fixture = ShareFixture::new().await;
    let (token, _) = fixture.share(1, T0).await;

    // Seen from one hour later, expiry is now - 0; one ms earlier it is now + 1.
    let now = token.expiry;
    assert!(!token.is_valid(now));
    assert!(token.is_valid(now - 1));
    assert!(token.is_valid(T0));
    assert_eq!(
        fixture.tokens.validate(&token.value, now + 1).await.unwrap(),
        TokenValidation::Invalid(InvalidToken::Expired)
    );
}

#[tokio::test]
async fn test_raw_token_never_persisted() {
    let t = TestVault::new().await;
    let alice = t.user("alice").await;
    let cred = t
        .vault
        .add_credential(&alice, "github.txt", b"ghp_xxx")
        .await
        .unwrap();

    let mut values = Vec::new();
    for ttl in [1, 24, 48] {
        let grant = t.vault.share(&alice, cred.record_id, Some(ttl)).await.unwrap();
        let file = tokio::fs::read_to_string(&grant.certificate_path).await.unwrap();
        assert!(!file.contains(&grant.token.value));
        assert!(file.contains(&grant.token.hash()));

        let record = t.ledger.get_certificate(&grant.token.hash()).await.unwrap();
        assert!(!serde_json::to_string(&record).unwrap().contains(&grant.token.value));
        values.push(grant.token.value);
    }
    t.vault.revoke_share(&alice, &values[0]).await.unwrap();
    t.vault.flush_background().await;

    let blocks = serde_json::to_string(&t.ledger.get_all_blocks().await).unwrap();
    for value in &values {
        assert!(!blocks.contains(value.as_str()));
    }
    assert!(t.vault.shutdown().await);
    let log = std::fs::read_to_string(t.vault.config().activity_log_path()).unwrap();
    for value in &values {
        assert!(!log.contains(value.as_str()));
    }
}

#[tokio::test]
async fn test_degraded_issuance() {
    let fixture = ShareFixture::new().await;
    fixture.ledger.set_available(false);
    let (token, issued) = fixture.share(1, T0).await;

    assert_eq!(issued.certificate.ledger_block_hash, "");
    assert_eq!(fixture.ledger.len(), 1);

    let verdict = fixture.verify(&issued, &token.value, T0 + 30 * MINUTE).await;
    assert!(verdict.valid, "{verdict}");
    assert_eq!(verdict.warnings, vec![MSG_LEDGER_OFFLINE.to_string()]);

    // Layers 1, 2 and 4 still run.
    let wrong = fixture
        .verify(&issued, "ffffffffffffffffffffffffffffffff", T0)
        .await;
    assert_eq!(wrong.failed_layer, Some(Layer::TokenBinding));
    let late = fixture.verify(&issued, &token.value, T0 + 2 * HOUR).await;
    assert_eq!(late.failed_layer, Some(Layer::Expiry));

    // Once the ledger is back, the unanchored certificate no longer passes.
    fixture.ledger.set_available(true);
    let online = fixture.verify(&issued, &token.value, T0).await;
    assert_eq!(online.failed_layer, Some(Layer::Anchoring));
}

#[tokio::test]
async fn test_issue_verify_expire_revoke_scenario() {
    let fixture = ShareFixture::new().await;
    let (token, issued) = fixture.share(1, T0).await;

    let blocks = fixture.ledger.get_all_blocks().await;
    let anchor = blocks.last().unwrap();
    assert_eq!(anchor.action, LedgerAction::CertGenerated.as_str());
    assert_eq!(anchor.hash, issued.certificate.ledger_block_hash);

    let at_30m = fixture.verify(&issued, &token.value, T0 + 30 * MINUTE).await;
    assert!(at_30m.valid, "{at_30m}");
    assert!(at_30m.warnings.is_empty());

    let at_61m = fixture.verify(&issued, &token.value, T0 + 61 * MINUTE).await;
    assert!(!at_61m.valid);
    assert_eq!(at_61m.failed_layer, Some(Layer::Expiry));
    assert_eq!(at_61m.message, MSG_EXPIRED);

    fixture.tokens.revoke(&token.value).await.unwrap();
    let at_10m = fixture.verify(&issued, &token.value, T0 + 10 * MINUTE).await;
    assert!(!at_10m.valid);
    assert_eq!(at_10m.failed_layer, Some(Layer::Anchoring));
    assert_eq!(at_10m.message, MSG_REVOKED);
}
