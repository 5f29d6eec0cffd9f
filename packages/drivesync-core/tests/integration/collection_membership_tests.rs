//! Collection membership tests
//!
//! Collections registered as roots contribute their members (which are not
//! path descendants) to sequence polls.

#[path = "../common/mod.rs"]
mod common;
use common::*;

use drivesync_core::config::constants::document::LOCALLY_EDITED_COLLECTION_NAME;
use drivesync_core::CoordinatorConfig;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_members_of_synchronized_collections_are_indexed() {
    let h = Harness::with_config(
        &["default"],
        CoordinatorConfig {
            collection_page_size: 3,
            ..CoordinatorConfig::default()
        },
    );
    let favorites = h.add(collection("default", "favorites", "/collections/favorites"));
    let mut expected = Vec::new();
    for i in 0..7 {
        let doc = h.add(folder("default", &format!("m{}", i), &format!("/ws/m{}", i)));
        h.store.add_member("default", &favorites.doc_ref, &doc.doc_ref).unwrap();
        expected.push(doc.doc_ref.to_string());
    }
    h.register("alice", &favorites).await;

    let ids = h
        .coordinator
        .get_collection_sync_root_member_ids("alice")
        .await
        .unwrap();

    let members: Vec<String> = ids["default"].iter().map(|r| r.to_string()).collect();
    assert_eq!(members, expected);
}

#[tokio::test]
async fn test_unsynchronized_collections_are_ignored() {
    let h = Harness::new(&["default"]);
    let favorites = h.add(collection("default", "favorites", "/collections/favorites"));
    let doc = h.add(folder("default", "doc", "/ws/doc"));
    h.store.add_member("default", &favorites.doc_ref, &doc.doc_ref).unwrap();
    let ws = h.add(folder("default", "ws", "/ws"));
    h.register("alice", &ws).await;

    let ids = h
        .coordinator
        .get_collection_sync_root_member_ids("alice")
        .await
        .unwrap();

    assert!(ids.is_empty());
}

#[tokio::test]
async fn test_unregistering_collection_drops_members() {
    let h = Harness::new(&["default"]);
    let favorites = h.add(collection("default", "favorites", "/collections/favorites"));
    let doc = h.add(folder("default", "doc", "/ws/doc"));
    h.store.add_member("default", &favorites.doc_ref, &doc.doc_ref).unwrap();
    h.register("alice", &favorites).await;
    assert!(!h
        .coordinator
        .get_collection_sync_root_member_ids("alice")
        .await
        .unwrap()
        .is_empty());

    h.unregister("alice", &favorites).await;

    let ids = h
        .coordinator
        .get_collection_sync_root_member_ids("alice")
        .await
        .unwrap();
    assert!(ids.is_empty());
}

#[tokio::test]
async fn test_member_cache_invalidation_hooks() {
    let h = Harness::new(&["default"]);
    let favorites = h.add(collection("default", "favorites", "/collections/favorites"));
    h.register("alice", &favorites).await;
    h.coordinator
        .get_collection_sync_root_member_ids("alice")
        .await
        .unwrap();

    let late = h.add(folder("default", "late", "/ws/late"));
    h.store.add_member("default", &favorites.doc_ref, &late.doc_ref).unwrap();
    let cached = h
        .coordinator
        .get_collection_sync_root_member_ids("alice")
        .await
        .unwrap();
    assert!(cached.is_empty());

    h.coordinator.invalidate_collection_member_cache("alice").await;
    let refreshed = h
        .coordinator
        .get_collection_sync_root_member_ids("alice")
        .await
        .unwrap();
    assert!(refreshed["default"].contains(&late.doc_ref));

    let later = h.add(folder("default", "later", "/ws/later"));
    h.store.add_member("default", &favorites.doc_ref, &later.doc_ref).unwrap();
    h.coordinator.invalidate_collection_member_cache_all();
    let refreshed = h
        .coordinator
        .get_collection_sync_root_member_ids("alice")
        .await
        .unwrap();
    assert!(refreshed["default"].contains(&later.doc_ref));
}

// ═══════════════════════════════════════════════════════════════════════════
// Locally edited collection
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_locally_edited_collection_is_created_and_registered() {
    let h = Harness::new(&["default"]);
    let doc = h.add(folder("default", "doc", "/ws/doc"));
    let session = h.session("default", "alice");

    let collection = h
        .coordinator
        .add_to_locally_edited_collection(&*session, &doc)
        .await
        .unwrap();

    assert_eq!(collection.name(), LOCALLY_EDITED_COLLECTION_NAME);
    assert!(collection.is_collection());
    assert!(h
        .coordinator
        .is_synchronization_root("alice", &collection)
        .await
        .unwrap());
    let ids = h
        .coordinator
        .get_collection_sync_root_member_ids("alice")
        .await
        .unwrap();
    assert!(ids["default"].contains(&doc.doc_ref));
}

#[tokio::test]
async fn test_locally_edited_collection_is_reused() {
    let h = Harness::new(&["default"]);
    let first = h.add(folder("default", "first", "/ws/first"));
    let second = h.add(folder("default", "second", "/ws/second"));
    let session = h.session("default", "alice");

    let created = h
        .coordinator
        .add_to_locally_edited_collection(&*session, &first)
        .await
        .unwrap();
    h.coordinator
        .get_collection_sync_root_member_ids("alice")
        .await
        .unwrap();
    h.emitter.clear();
    let reused = h
        .coordinator
        .add_to_locally_edited_collection(&*session, &second)
        .await
        .unwrap();

    assert_eq!(reused.doc_ref, created.doc_ref);
    assert!(h.emitter.signals().is_empty());
    assert_eq!(
        h.store.members_of("default", &created.doc_ref),
        vec![first.doc_ref.clone(), second.doc_ref.clone()]
    );
    let ids = h
        .coordinator
        .get_collection_sync_root_member_ids("alice")
        .await
        .unwrap();
    assert!(ids["default"].contains(&second.doc_ref));
}

#[tokio::test]
async fn test_locally_edited_collection_is_per_user() {
    let h = Harness::new(&["default"]);
    let doc = h.add(folder("default", "doc", "/ws/doc"));

    let for_alice = h
        .coordinator
        .add_to_locally_edited_collection(&*h.session("default", "alice"), &doc)
        .await
        .unwrap();
    let for_bob = h
        .coordinator
        .add_to_locally_edited_collection(&*h.session("default", "bob"), &doc)
        .await
        .unwrap();

    assert_ne!(for_alice.doc_ref, for_bob.doc_ref);
    assert!(!h
        .coordinator
        .is_synchronization_root("alice", &for_bob)
        .await
        .unwrap());
}
