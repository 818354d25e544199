//! Store/get behaviour of the one-time store over the in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use secretdrop::secrets::{MemoryCredentialBackend, OneTimeSecretStore, SecretStore, SecretsError};
use secretdrop::validation::ValidationError;

fn store() -> OneTimeSecretStore {
    OneTimeSecretStore::new(Arc::new(MemoryCredentialBackend::new()))
}

#[tokio::test]
async fn hello_is_read_exactly_once() {
    let store = store();

    let token = store.store("hello", "1h").await.unwrap();
    assert_eq!(store.get(&token).await.unwrap().expose_secret(), "hello");
    assert!(matches!(store.get(&token).await, Err(SecretsError::NotFound)));
}

#[tokio::test]
async fn out_of_range_ttls_never_reach_the_backend() {
    let backend = Arc::new(MemoryCredentialBackend::new());
    let store = OneTimeSecretStore::new(backend.clone());

    for ttl in ["30s", "169h", "0h", "invalid", "-1h"] {
        let err = store.store("secret", ttl).await.unwrap_err();
        assert!(matches!(err, SecretsError::Validation(_)), "{ttl}");
    }
    assert!(backend.is_empty());
}

#[tokio::test]
async fn ttl_error_kinds() {
    let store = store();

    let err = store.store("secret", "invalid").await.unwrap_err();
    assert!(matches!(err, SecretsError::Validation(ValidationError::InvalidFormat { .. })));

    let err = store.store("secret", "30s").await.unwrap_err();
    assert!(matches!(err, SecretsError::Validation(ValidationError::OutOfRange)));
}

#[tokio::test]
async fn concurrent_reads_have_one_winner() {
    let store = Arc::new(store());
    let token = store.store("race me", "1h").await.unwrap();

    let readers: Vec<_> = (0..16)
        .map(|_| {
            let store = Arc::clone(&store);
            let token = token.clone();
            tokio::spawn(async move { store.get(&token).await })
        })
        .collect();

    let mut winners = 0;
    for reader in readers {
        match reader.await.unwrap() {
            Ok(secret) => {
                assert_eq!(secret.expose_secret(), "race me");
                winners += 1;
            }
            Err(err) => assert!(err.is_not_found()),
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test(start_paused = true)]
async fn unread_secret_expires_with_its_ttl() {
    let store = store();
    let token = store.store("short lived", "1m").await.unwrap();

    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(store.get(&token).await.unwrap_err().is_not_found());
}

#[tokio::test(start_paused = true)]
async fn secret_is_readable_before_expiry() {
    let store = store();
    let token = store.store("still here", "2h").await.unwrap();

    tokio::time::advance(Duration::from_secs(60 * 60)).await;
    assert_eq!(store.get(&token).await.unwrap().expose_secret(), "still here");
}

#[tokio::test]
async fn empty_ttl_uses_default() {
    let store = store();
    let token = store.store("default ttl", "").await.unwrap();
    assert_eq!(store.get(&token).await.unwrap().expose_secret(), "default ttl");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_ttl_in_range_round_trips(minutes in 1u64..=168 * 60, secret in "[ -~]{1,64}") {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let retrieved = runtime.block_on(async {
            let store = store();
            let token = store.store(&secret, &format!("{minutes}m")).await.unwrap();
            store.get(&token).await.unwrap().into_inner()
        });
        prop_assert_eq!(retrieved, secret);
    }
}
