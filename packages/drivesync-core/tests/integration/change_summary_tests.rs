//! Change summary tests
//!
//! Both cursor modes, bound handling, repository ordering and the
//! all-or-overflow contract.

#[path = "../common/mod.rs"]
mod common;
use common::*;

use drivesync_core::config::constants::document::COLLECTION_FACET;
use drivesync_core::domain::CursorMode;
use drivesync_core::{ChangeCursor, CoordinatorConfig, ErrorKind, RootRefs};
use pretty_assertions::assert_eq;

fn ids(summary: &drivesync_core::ChangeSummary) -> Vec<String> {
    summary.changes.iter().map(|c| c.doc_ref.to_string()).collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// First poll
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_first_poll_returns_fresh_cursor_without_changes() {
    let h = Harness::new(&["default"]);
    let ws = h.add(folder("default", "ws", "/ws"));
    h.register("alice", &ws).await;
    h.finder.record_change("default", "ws", "documentCreated");

    let first = h
        .coordinator
        .get_change_summary("alice", &RootRefs::new(), ChangeCursor::NONE)
        .await
        .unwrap();
    let second = h
        .coordinator
        .get_change_summary("alice", &RootRefs::new(), ChangeCursor::NONE)
        .await
        .unwrap();

    assert!(first.changes.is_empty());
    assert!(!first.has_too_many_changes);
    assert_eq!(first.cursor.mode(), CursorMode::Time);
    assert!(second.cursor > first.cursor);
    assert!(h.finder.calls().is_empty());
}

#[tokio::test]
async fn test_first_poll_by_sequence_seeds_cursor() {
    let h = Harness::new(&["default"]);
    let ws = h.add(folder("default", "ws", "/ws"));
    h.register("alice", &ws).await;
    h.finder.record_change("default", "ws", "documentCreated");
    h.finder.record_change("default", "ws", "documentModified");

    let summary = h
        .coordinator
        .get_change_summary_by_sequence("alice", &RootRefs::new(), -1)
        .await
        .unwrap();

    assert!(summary.changes.is_empty());
    assert_eq!(summary.cursor, ChangeCursor::Sequence(2));
    assert_eq!(summary.sync_date % 1000, 0);
    assert!(h.finder.calls().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// Incremental polls
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_time_poll_returns_changes_since_cursor() {
    let h = Harness::new(&["default"]);
    let ws = h.add(folder("default", "ws", "/ws"));
    h.register("alice", &ws).await;
    h.finder.record_change("default", "before", "documentCreated");

    let seed = h
        .coordinator
        .get_change_summary("alice", &RootRefs::new(), -1)
        .await
        .unwrap();
    h.finder.record_change("default", "after-1", "documentCreated");
    h.finder.record_change("default", "after-2", "documentModified");

    let summary = h
        .coordinator
        .get_change_summary("alice", &seed.active_roots, seed.cursor.value())
        .await
        .unwrap();

    assert_eq!(ids(&summary), vec!["after-1", "after-2"]);
    assert_eq!(summary.sync_date, summary.cursor.value());
    let calls = h.finder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].mode, CursorMode::Time);
    assert_eq!(calls[0].lower_bound, seed.cursor.value());
    assert!(calls[0].current_roots.contains(&ws.doc_ref));
    assert!(calls[0].collection_members.is_empty());
}

#[tokio::test]
async fn test_sequence_poll_passes_collection_members() {
    let h = Harness::new(&["default"]);
    let favorites = h.add(collection("default", "favorites", "/collections/favorites"));
    let member = h.add(folder("default", "member", "/elsewhere/member"));
    h.store
        .add_member("default", &favorites.doc_ref, &member.doc_ref)
        .unwrap();
    h.register("alice", &favorites).await;
    assert!(favorites.has_facet(COLLECTION_FACET));

    h.finder.record_change("default", "member", "documentModified");
    let summary = h
        .coordinator
        .get_change_summary_by_sequence("alice", &RootRefs::new(), 0)
        .await
        .unwrap();

    assert_eq!(ids(&summary), vec!["member"]);
    assert_eq!(summary.cursor, ChangeCursor::Sequence(1));
    let calls = h.finder.calls();
    assert_eq!(calls[0].mode, CursorMode::Sequence);
    assert!(calls[0].collection_members.contains(&member.doc_ref));
}

#[tokio::test]
async fn test_no_progress_skips_scan() {
    let h = Harness::new(&["default"]);
    let ws = h.add(folder("default", "ws", "/ws"));
    h.register("alice", &ws).await;
    h.finder.record_change("default", "ws", "documentModified");

    let summary = h
        .coordinator
        .get_change_summary_by_sequence("alice", &RootRefs::new(), 1)
        .await
        .unwrap();

    assert!(summary.changes.is_empty());
    assert_eq!(summary.cursor, ChangeCursor::Sequence(1));
    assert!(h.finder.calls().is_empty());
}

#[tokio::test]
async fn test_user_without_roots_scans_nothing() {
    let h = Harness::new(&["default"]);
    h.finder.record_change("default", "x", "documentModified");

    let summary = h
        .coordinator
        .get_change_summary_by_sequence("alice", &RootRefs::new(), 0)
        .await
        .unwrap();

    assert!(summary.changes.is_empty());
    assert!(h.finder.calls().is_empty());
    assert!(summary.active_roots.values().all(|refs| refs.is_empty()));
}

#[tokio::test]
async fn test_previously_active_repository_is_still_scanned() {
    let h = Harness::new(&["default", "archive"]);
    let ws = h.add(folder("default", "ws", "/ws"));
    let old = h.add(folder("archive", "old", "/old"));
    h.register("alice", &ws).await;
    h.register("alice", &old).await;
    let seed = h
        .coordinator
        .get_change_summary_by_sequence("alice", &RootRefs::new(), -1)
        .await
        .unwrap();

    h.unregister("alice", &old).await;
    h.finder.record_change("archive", "old", "rootUnregistered");

    let summary = h
        .coordinator
        .get_change_summary_by_sequence("alice", &seed.active_roots, seed.cursor.value())
        .await
        .unwrap();

    let calls = h.finder.calls();
    let scanned: Vec<&str> = calls.iter().map(|c| c.repository.as_str()).collect();
    assert_eq!(scanned, vec!["archive", "default"]);
    assert_eq!(ids(&summary), vec!["old"]);
    let archive_call = &calls[0];
    assert!(archive_call.previous_roots.contains(&old.doc_ref));
    assert!(archive_call.current_roots.is_empty());
}

#[tokio::test]
async fn test_repositories_are_scanned_in_lexicographic_order() {
    let h = Harness::new(&["zeta", "alpha", "mid"]);
    for repository in ["zeta", "alpha", "mid"] {
        let root = h.add(folder(repository, &format!("{}-root", repository), "/root"));
        h.register("alice", &root).await;
        h.finder
            .record_change(repository, format!("{}-doc", repository), "documentModified");
    }

    let summary = h
        .coordinator
        .get_change_summary_by_sequence("alice", &RootRefs::new(), 0)
        .await
        .unwrap();

    assert_eq!(ids(&summary), vec!["alpha-doc", "mid-doc", "zeta-doc"]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Overflow
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_overflow_in_second_repository_discards_everything() {
    let h = Harness::new(&["repo-a", "repo-b", "repo-c"]);
    for repository in ["repo-a", "repo-b", "repo-c"] {
        let root = h.add(folder(repository, &format!("{}-root", repository), "/root"));
        h.register("alice", &root).await;
        h.finder
            .record_change(repository, format!("{}-doc", repository), "documentModified");
    }
    h.finder.set_overflowing("repo-b", true);

    let summary = h
        .coordinator
        .get_change_summary_by_sequence("alice", &RootRefs::new(), 0)
        .await
        .unwrap();

    assert!(summary.changes.is_empty());
    assert!(summary.has_too_many_changes);
    let scanned: Vec<String> = h.finder.calls().iter().map(|c| c.repository.clone()).collect();
    assert_eq!(scanned, vec!["repo-a", "repo-b"]);
    assert_eq!(summary.active_roots.len(), 3);
}

#[tokio::test]
async fn test_change_limit_triggers_overflow() {
    let config = CoordinatorConfig {
        change_limit: 2,
        ..CoordinatorConfig::default()
    };
    let h = Harness::with_config(&["default"], config);
    let ws = h.add(folder("default", "ws", "/ws"));
    h.register("alice", &ws).await;
    for id in ["a", "b", "c"] {
        h.finder.record_change("default", id, "documentModified");
    }

    let summary = h
        .coordinator
        .get_change_summary_by_sequence("alice", &RootRefs::new(), 0)
        .await
        .unwrap();

    assert!(summary.has_too_many_changes);
    assert!(summary.changes.is_empty());
    assert_eq!(h.finder.calls()[0].limit, 2);
}

/// The fresh upper bound is returned even when the change list was
/// discarded; a client persisting it skips the overflowing window.
#[tokio::test]
async fn test_overflow_still_returns_fresh_cursor() {
    let h = Harness::new(&["default"]);
    let ws = h.add(folder("default", "ws", "/ws"));
    h.register("alice", &ws).await;
    for id in ["a", "b", "c"] {
        h.finder.record_change("default", id, "documentModified");
    }
    h.finder.set_overflowing("default", true);

    let summary = h
        .coordinator
        .get_change_summary_by_sequence("alice", &RootRefs::new(), 0)
        .await
        .unwrap();

    assert!(summary.has_too_many_changes);
    assert_eq!(summary.cursor, ChangeCursor::Sequence(3));
}

#[tokio::test]
async fn test_active_roots_match_current_roots_regardless_of_overflow() {
    let h = Harness::new(&["default", "archive"]);
    let ws = h.add(folder("default", "ws", "/ws"));
    let docs = h.add(folder("default", "docs", "/docs"));
    let old = h.add(folder("archive", "old", "/old"));
    for root in [&ws, &docs, &old] {
        h.register("alice", root).await;
    }
    h.finder.record_change("default", "ws", "documentModified");

    let expected = root_refs(&[("archive", "old"), ("default", "docs"), ("default", "ws")]);

    let ok = h
        .coordinator
        .get_change_summary_by_sequence("alice", &RootRefs::new(), 0)
        .await
        .unwrap();
    h.finder.set_overflowing("archive", true);
    let overflow = h
        .coordinator
        .get_change_summary_by_sequence("alice", &RootRefs::new(), 0)
        .await
        .unwrap();

    assert!(!ok.has_too_many_changes);
    assert!(overflow.has_too_many_changes);
    assert_eq!(ok.active_roots, expected);
    assert_eq!(overflow.active_roots, expected);
}

// ═══════════════════════════════════════════════════════════════════════════
// Failures
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_finder_failure_propagates() {
    let h = Harness::new(&["default", "other"]);
    let ws = h.add(folder("default", "ws", "/ws"));
    let other = h.add(folder("other", "o", "/o"));
    h.register("alice", &ws).await;
    h.register("alice", &other).await;
    h.finder.record_change("default", "ws", "documentModified");
    h.finder.set_failing("other", true);

    let err = h
        .coordinator
        .get_change_summary_by_sequence("alice", &RootRefs::new(), 0)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Storage);
}

#[tokio::test]
async fn test_explicit_cursor_selects_mode() {
    let h = Harness::new(&["default"]);
    let ws = h.add(folder("default", "ws", "/ws"));
    h.register("alice", &ws).await;

    let summary = h
        .coordinator
        .get_change_summary_since(
            "alice",
            &RootRefs::new(),
            ChangeCursor::initial(CursorMode::Sequence),
        )
        .await
        .unwrap();

    assert_eq!(summary.cursor.mode(), CursorMode::Sequence);
}
