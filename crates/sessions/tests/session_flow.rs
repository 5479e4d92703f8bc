//! End-to-end flows through the store and directory over the in-memory
//! backend: payload merging, soft deletion, tenant-partitioned
//! find-or-create, and the reuse window.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use ar_domain::config::SessionsConfig;
use ar_sessions::{
    AppSession, AuthMethod, CreateOutcome, Identity, MemoryBackend, SessionDirectory,
    SessionStore, UserType,
};

fn setup() -> (Arc<MemoryBackend>, Arc<SessionStore>, SessionDirectory) {
    let backend = Arc::new(MemoryBackend::new());
    let store = Arc::new(SessionStore::new(
        backend.clone(),
        SessionsConfig::default(),
    ));
    let directory = SessionDirectory::new(store.clone(), &SessionsConfig::default());
    (backend, store, directory)
}

fn identity(user_id: &str) -> Identity {
    Identity {
        user_id: user_id.to_owned(),
        user_type: UserType::Individual,
        auth_method: AuthMethod::Jwt,
        metadata: HashMap::new(),
    }
}

fn payload(pairs: &[(&str, serde_json::Value)]) -> serde_json::Map<String, serde_json::Value> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.clone()))
        .collect()
}

#[tokio::test]
async fn create_get_update_merges_payload() {
    let (_, store, _) = setup();

    let outcome = store
        .create(
            "s1",
            "client-1",
            "hash-1",
            UserType::Individual,
            payload(&[("a", json!(1))]),
        )
        .await
        .unwrap();
    assert_eq!(outcome, CreateOutcome::Created);

    // Second create under the same id leaves the record untouched.
    let again = store
        .create("s1", "other", "other", UserType::Anonymous, payload(&[]))
        .await
        .unwrap();
    assert_eq!(again, CreateOutcome::AlreadyExists);

    let updated = store
        .update("s1", &payload(&[("b", json!(2))]))
        .await
        .unwrap()
        .expect("session present");
    assert_eq!(updated.payload.get("a"), Some(&json!(1)));
    assert_eq!(updated.payload.get("b"), Some(&json!(2)));
    assert_eq!(updated.client_id, "client-1");

    assert!(store.update("absent", &payload(&[])).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_is_idempotent() {
    let (_, store, _) = setup();
    store
        .create("s1", "c", "h", UserType::Individual, payload(&[]))
        .await
        .unwrap();
    assert!(store.delete("s1").await.unwrap());
    assert!(!store.delete("s1").await.unwrap());
    assert!(!store.delete("never-existed").await.unwrap());
}

#[tokio::test]
async fn deactivated_session_survives_grace_then_expires() {
    let (backend, store, _) = setup();
    store
        .create("s1", "c", "h", UserType::Individual, payload(&[]))
        .await
        .unwrap();
    assert!(store.deactivate("s1").await.unwrap());

    // Within the grace window the inactive record is still readable.
    let session = store.get("s1").await.unwrap().expect("within grace");
    assert!(!session.is_active);

    backend.advance(std::time::Duration::from_secs(301));
    assert!(store.get("s1").await.unwrap().is_none());
}

#[tokio::test]
async fn find_or_create_is_stable_for_same_caller() {
    let (_, _, directory) = setup();
    let alice = identity("alice");

    let first = directory
        .find_or_create("sess-a", &alice, payload(&[("step", json!(1))]))
        .await
        .unwrap();
    let second = directory
        .find_or_create("sess-a", &alice, payload(&[("step", json!(2))]))
        .await
        .unwrap();

    assert_eq!(first.session_id, "sess-a");
    assert_eq!(second.session_id, "sess-a");
    assert_eq!(second.identity_hash, alice.hash());
    assert_eq!(second.payload.get("step"), Some(&json!(2)));
    assert_eq!(
        second.client_id,
        format!("mcp_client_individual_{}", &alice.hash()[..8])
    );
}

#[tokio::test]
async fn foreign_tenant_id_collision_mints_suffixed_id() {
    let (_, _, directory) = setup();
    let alice = identity("alice");
    let bob = identity("bob");

    let a = directory
        .find_or_create("shared-id", &alice, payload(&[]))
        .await
        .unwrap();
    let b = directory
        .find_or_create("shared-id", &bob, payload(&[]))
        .await
        .unwrap();

    assert_eq!(a.session_id, "shared-id");
    assert_eq!(b.session_id, format!("shared-id-{}", &bob.hash()[..8]));
    assert_eq!(b.identity_hash, bob.hash());

    // Alice's record is untouched by Bob's create.
    let a_again = directory
        .find_or_create("shared-id", &alice, payload(&[]))
        .await
        .unwrap();
    assert_eq!(a_again.identity_hash, alice.hash());
}

async fn seed_session(store: &SessionStore, id: &str, identity: &Identity, idle: Duration) {
    let now = Utc::now();
    let session = AppSession {
        session_id: id.to_owned(),
        identity_hash: identity.hash(),
        user_type: identity.user_type,
        client_id: format!("mcp_client_individual_{}", &identity.hash()[..8]),
        created_at: now - idle,
        last_accessed: now - idle,
        payload: Default::default(),
        is_active: true,
    };
    store.save(&session).await.unwrap();
    store.index_add(&identity.hash(), id).await.unwrap();
}

#[tokio::test]
async fn recent_session_reused_under_new_presented_id() {
    let (_, store, directory) = setup();
    let alice = identity("alice");
    seed_session(&store, "old-sess", &alice, Duration::seconds(100)).await;

    let session = directory
        .find_or_create("fresh-presented-id", &alice, payload(&[]))
        .await
        .unwrap();
    assert_eq!(session.session_id, "old-sess");
    // Nothing was created under the presented id.
    assert!(store.get("fresh-presented-id").await.unwrap().is_none());
}

#[tokio::test]
async fn stale_session_not_reused_past_window() {
    let (_, store, directory) = setup();
    let alice = identity("alice");
    seed_session(&store, "old-sess", &alice, Duration::seconds(301)).await;

    let session = directory
        .find_or_create("fresh-presented-id", &alice, payload(&[]))
        .await
        .unwrap();
    assert_eq!(session.session_id, "fresh-presented-id");
}

#[tokio::test]
async fn session_idle_exactly_the_window_is_not_reused() {
    let (_, _, directory) = setup();
    let alice = identity("alice");
    // The window is exclusive: exactly reuse_window idle means a new
    // session, not a reused one.
    seed_session(directory.store(), "old-sess", &alice, Duration::seconds(300)).await;

    let session = directory
        .find_or_create("fresh-presented-id", &alice, payload(&[]))
        .await
        .unwrap();
    assert_eq!(session.session_id, "fresh-presented-id");
}

#[tokio::test]
async fn reuse_tie_breaks_to_smaller_id() {
    let (_, _, directory) = setup();
    let alice = identity("alice");
    let now = Utc::now();
    for id in ["sess-b", "sess-a"] {
        let session = AppSession {
            session_id: id.to_owned(),
            identity_hash: alice.hash(),
            user_type: alice.user_type,
            client_id: "c".into(),
            created_at: now,
            last_accessed: now,
            payload: Default::default(),
            is_active: true,
        };
        directory.store().save(&session).await.unwrap();
        directory.store().index_add(&alice.hash(), id).await.unwrap();
    }

    let session = directory
        .find_or_create("presented", &alice, payload(&[]))
        .await
        .unwrap();
    assert_eq!(session.session_id, "sess-a");
}

#[tokio::test]
async fn deactivate_checks_ownership() {
    let (_, store, directory) = setup();
    let alice = identity("alice");
    let bob = identity("bob");

    directory
        .find_or_create("sess-a", &alice, payload(&[]))
        .await
        .unwrap();

    assert!(!directory.deactivate("sess-a", &bob).await.unwrap());
    assert!(store.get("sess-a").await.unwrap().unwrap().is_active);

    assert!(directory.deactivate("sess-a", &alice).await.unwrap());
    assert!(!store.get("sess-a").await.unwrap().unwrap().is_active);

    // Deactivated sessions are not returned by find_or_create; the caller
    // gets a fresh one under the presented id.
    let replacement = directory
        .find_or_create("sess-b", &alice, payload(&[]))
        .await
        .unwrap();
    assert_eq!(replacement.session_id, "sess-b");
}
