use bytes::Bytes;

use super::*;
use crate::watch::EventType;
use crate::watch::WatchTrigger;
use crate::CoordinationError;

const NOW: u64 = 1_700_000_000_000;
const SESSION: u64 = 7;

/// Runs `f` as one commit, rolling back on failure
fn apply<T>(
    store: &mut NodeStore,
    f: impl FnOnce(&mut NodeStore, &mut Mutation) -> Result<T, CoordinationError>,
) -> (Result<T, CoordinationError>, Vec<WatchTrigger>) {
    let mut mutation = store.begin(NOW);
    match f(store, &mut mutation) {
        Ok(v) => {
            let triggers = store.commit(mutation);
            (Ok(v), triggers)
        }
        Err(e) => {
            store.rollback(mutation);
            (Err(e), Vec::new())
        }
    }
}

fn create(
    store: &mut NodeStore,
    path: &str,
    mode: CreateMode,
) -> Result<String, CoordinationError> {
    apply(store, |s, m| {
        s.create(m, path, Bytes::from_static(b"data"), mode, SESSION, false)
    })
    .0
}

#[test]
fn test_new_store_holds_only_root() {
    let store = NodeStore::new();
    assert!(store.exists("/"));
    assert_eq!(store.node_count(), 1);
    assert_eq!(store.last_zxid(), 0);
    assert_eq!(store.children("/").unwrap(), Vec::<String>::new());
}

#[test]
fn test_create_then_get_returns_data_and_initial_versions() {
    let mut store = NodeStore::new();
    let (res, triggers) = apply(&mut store, |s, m| {
        s.create(
            m,
            "/curator",
            Bytes::from_static(b"curator data"),
            CreateMode::Persistent,
            SESSION,
            false,
        )
    });
    assert_eq!(res.unwrap(), "/curator");

    let (data, stat) = store.get("/curator").unwrap();
    assert_eq!(data, Bytes::from_static(b"curator data"));
    assert_eq!(stat.version, 0);
    assert_eq!(stat.cversion, 0);
    assert_eq!(stat.czxid, 1);
    assert_eq!(stat.ctime, NOW);
    assert_eq!(stat.ephemeral_owner, None);
    assert_eq!(stat.data_length, 12);
    assert_eq!(store.last_zxid(), 1);

    assert_eq!(
        triggers,
        vec![
            WatchTrigger::new("/curator", EventType::NodeCreated),
            WatchTrigger::new("/", EventType::NodeChildrenChanged),
        ]
    );
    assert_eq!(store.stat("/").unwrap().cversion, 1);
    assert_eq!(store.stat("/").unwrap().pzxid, 1);
}

#[test]
fn test_create_existing_path_fails() {
    let mut store = NodeStore::new();
    create(&mut store, "/a", CreateMode::Persistent).unwrap();

    assert_eq!(
        create(&mut store, "/a", CreateMode::Persistent),
        Err(CoordinationError::NodeExists { path: "/a".into() })
    );
    assert_eq!(
        create(&mut store, "/", CreateMode::Persistent),
        Err(CoordinationError::NodeExists { path: "/".into() })
    );
    // A failed commit does not consume a zxid
    assert_eq!(store.last_zxid(), 1);
}

#[test]
fn test_create_without_parent_fails_unless_requested() {
    let mut store = NodeStore::new();
    assert_eq!(
        create(&mut store, "/curator/del_key1", CreateMode::Persistent),
        Err(CoordinationError::NoParent {
            path: "/curator/del_key1".into()
        })
    );

    let (res, triggers) = apply(&mut store, |s, m| {
        s.create(m, "/curator/x/del_key1", Bytes::new(), CreateMode::Ephemeral, SESSION, true)
    });
    assert_eq!(res.unwrap(), "/curator/x/del_key1");
    assert!(store.exists("/curator"));
    assert!(store.exists("/curator/x"));

    // Created ancestors are persistent, the target keeps its mode
    assert_eq!(store.stat("/curator").unwrap().ephemeral_owner, None);
    assert_eq!(
        store.stat("/curator/x/del_key1").unwrap().ephemeral_owner,
        Some(SESSION)
    );
    // All in one commit
    assert_eq!(store.stat("/curator").unwrap().czxid, 1);
    assert_eq!(store.stat("/curator/x/del_key1").unwrap().czxid, 1);
    assert_eq!(triggers.len(), 6);
}

#[test]
fn test_failed_create_rolls_back_created_ancestors() {
    let mut store = NodeStore::new();

    let (res, triggers) = apply(&mut store, |s, m| {
        s.create(m, "/a/b/e", Bytes::new(), CreateMode::Ephemeral, SESSION, true)?;
        s.create(m, "/a/b/e/child", Bytes::new(), CreateMode::Persistent, SESSION, true)
    });

    assert_eq!(
        res,
        Err(CoordinationError::NoChildrenForEphemerals {
            path: "/a/b/e".into()
        })
    );
    assert!(triggers.is_empty());
    assert!(!store.exists("/a"));
    assert!(!store.exists("/a/b"));
    assert_eq!(store.node_count(), 1);
    assert!(store.ephemerals_of(SESSION).is_empty());
    assert_eq!(store.stat("/").unwrap().cversion, 0);
    assert_eq!(store.last_zxid(), 0);

    // Same batch again, this time failing on an existing target
    let (res, _) = apply(&mut store, |s, m| {
        s.create(m, "/x/y/z", Bytes::new(), CreateMode::Persistent, SESSION, true)?;
        s.create(m, "/x/y/z", Bytes::new(), CreateMode::Persistent, SESSION, true)
    });
    assert_eq!(res, Err(CoordinationError::NodeExists { path: "/x/y/z".into() }));
    assert!(!store.exists("/x"));
    assert_eq!(store.children("/").unwrap(), Vec::<String>::new());
}

#[test]
fn test_ephemeral_node_cannot_have_children() {
    let mut store = NodeStore::new();
    create(&mut store, "/e", CreateMode::Ephemeral).unwrap();

    assert_eq!(
        create(&mut store, "/e/child", CreateMode::Persistent),
        Err(CoordinationError::NoChildrenForEphemerals { path: "/e".into() })
    );
}

#[test]
fn test_sequential_names_are_gapless_per_parent() {
    let mut store = NodeStore::new();
    create(&mut store, "/q", CreateMode::Persistent).unwrap();
    create(&mut store, "/other", CreateMode::Persistent).unwrap();

    let first = create(&mut store, "/q/item-", CreateMode::PersistentSequential).unwrap();
    // Non-sequential children do not advance the counter
    create(&mut store, "/q/plain", CreateMode::Persistent).unwrap();
    let second = create(&mut store, "/q/item-", CreateMode::EphemeralSequential).unwrap();
    let elsewhere = create(&mut store, "/other/item-", CreateMode::PersistentSequential).unwrap();

    assert_eq!(first, "/q/item-0000000000");
    assert_eq!(second, "/q/item-0000000001");
    assert_eq!(elsewhere, "/other/item-0000000000");
}

#[test]
fn test_failed_sequential_create_does_not_consume_counter() {
    let mut store = NodeStore::new();
    create(&mut store, "/q", CreateMode::Persistent).unwrap();
    create(&mut store, "/q/n0000000000", CreateMode::Persistent).unwrap();

    assert_eq!(
        create(&mut store, "/q/n", CreateMode::PersistentSequential),
        Err(CoordinationError::NodeExists {
            path: "/q/n0000000000".into()
        })
    );
    assert_eq!(
        create(&mut store, "/q/m", CreateMode::PersistentSequential).unwrap(),
        "/q/m0000000000"
    );
}

#[test]
fn test_set_data_checks_version_and_increments() {
    let mut store = NodeStore::new();
    create(&mut store, "/a", CreateMode::Persistent).unwrap();

    let (res, triggers) =
        apply(&mut store, |s, m| s.set_data(m, "/a", Bytes::from_static(b"v1"), Some(0)));
    let stat = res.unwrap();
    assert_eq!(stat.version, 1);
    assert_eq!(stat.mzxid, 2);
    assert_eq!(triggers, vec![WatchTrigger::new("/a", EventType::NodeDataChanged)]);

    let (res, _) = apply(&mut store, |s, m| {
        s.set_data(m, "/a", Bytes::from_static(b"v2"), Some(0))
    });
    assert_eq!(
        res,
        Err(CoordinationError::VersionConflict {
            path: "/a".into(),
            expected: 0,
            actual: 1
        })
    );
    assert_eq!(store.get("/a").unwrap().0, Bytes::from_static(b"v1"));

    let (res, _) = apply(&mut store, |s, m| s.set_data(m, "/a", Bytes::from_static(b"v3"), None));
    assert_eq!(res.unwrap().version, 2);

    let (res, _) = apply(&mut store, |s, m| s.set_data(m, "/missing", Bytes::new(), None));
    assert_eq!(res, Err(CoordinationError::NoNode { path: "/missing".into() }));
}

#[test]
fn test_delete_rules() {
    let mut store = NodeStore::new();
    create(&mut store, "/a", CreateMode::Persistent).unwrap();
    create(&mut store, "/a/b", CreateMode::Persistent).unwrap();

    let (res, _) = apply(&mut store, |s, m| s.delete(m, "/a", None, false));
    assert_eq!(res, Err(CoordinationError::NotEmpty { path: "/a".into() }));

    let (res, _) = apply(&mut store, |s, m| s.delete(m, "/a/b", Some(3), false));
    assert!(matches!(res, Err(CoordinationError::VersionConflict { .. })));

    let (res, _) = apply(&mut store, |s, m| s.delete(m, "/", None, true));
    assert!(matches!(res, Err(CoordinationError::InvalidPath { .. })));

    let (res, triggers) = apply(&mut store, |s, m| s.delete(m, "/a/b", Some(0), false));
    assert!(res.is_ok());
    assert!(!store.exists("/a/b"));
    assert_eq!(
        triggers,
        vec![
            WatchTrigger::new("/a/b", EventType::NodeDeleted),
            WatchTrigger::new("/a", EventType::NodeChildrenChanged),
        ]
    );
    assert_eq!(store.stat("/a").unwrap().cversion, 2);
}

#[test]
fn test_recursive_delete_removes_subtree_deepest_first() {
    let mut store = NodeStore::new();
    for p in ["/t", "/t/a", "/t/a/x", "/t/b"] {
        create(&mut store, p, CreateMode::Persistent).unwrap();
    }
    let before = store.node_count();

    let (res, triggers) = apply(&mut store, |s, m| s.delete(m, "/t", None, true));
    assert!(res.is_ok());
    assert_eq!(store.node_count(), before - 4);
    assert!(store.children("/").unwrap().is_empty());

    let deleted: Vec<&str> = triggers
        .iter()
        .filter(|t| t.event_type == EventType::NodeDeleted)
        .map(|t| t.path.as_str())
        .collect();
    assert_eq!(deleted, vec!["/t/a/x", "/t/a", "/t/b", "/t"]);
}

#[test]
fn test_rollback_restores_every_touched_node() {
    let mut store = NodeStore::new();
    create(&mut store, "/p", CreateMode::Persistent).unwrap();
    let parent_before = store.get("/p").unwrap();

    let (res, _) = apply(&mut store, |s, m| {
        s.create(m, "/p/seq-", Bytes::new(), CreateMode::EphemeralSequential, SESSION, false)?;
        s.set_data(m, "/p", Bytes::from_static(b"changed"), None)?;
        s.delete(m, "/p", None, false)
    });
    assert_eq!(res, Err(CoordinationError::NotEmpty { path: "/p".into() }));

    assert_eq!(store.get("/p").unwrap(), parent_before);
    assert!(store.children("/p").unwrap().is_empty());
    assert!(store.ephemerals_of(SESSION).is_empty());
    assert_eq!(store.last_zxid(), 1);

    // The sequential counter was restored too
    assert_eq!(
        create(&mut store, "/p/seq-", CreateMode::PersistentSequential).unwrap(),
        "/p/seq-0000000000"
    );
}

#[test]
fn test_ephemeral_index_tracks_owner() {
    let mut store = NodeStore::new();
    create(&mut store, "/e1", CreateMode::Ephemeral).unwrap();
    create(&mut store, "/e2", CreateMode::EphemeralSequential).unwrap();
    create(&mut store, "/p", CreateMode::Persistent).unwrap();

    assert_eq!(store.ephemerals_of(SESSION), vec!["/e1", "/e20000000000"]);

    apply(&mut store, |s, m| s.delete(m, "/e1", None, false)).0.unwrap();
    assert_eq!(store.ephemerals_of(SESSION), vec!["/e20000000000"]);
    assert!(store.ephemerals_of(SESSION + 1).is_empty());
}

#[test]
fn test_find_child_with_prefix() {
    let mut store = NodeStore::new();
    create(&mut store, "/c", CreateMode::Persistent).unwrap();
    create(&mut store, "/c/_c_tok-lock", CreateMode::PersistentSequential).unwrap();

    assert_eq!(
        store.find_child_with_prefix("/c", "_c_tok-"),
        Some("/c/_c_tok-lock0000000000".to_string())
    );
    assert_eq!(store.find_child_with_prefix("/c", "_c_other-"), None);
    assert_eq!(store.find_child_with_prefix("/missing", "_c_tok-"), None);
}

#[test]
fn test_snapshot_round_trip_drops_ephemerals() {
    let mut store = NodeStore::new();
    create(&mut store, "/p", CreateMode::Persistent).unwrap();
    create(&mut store, "/p/keep", CreateMode::Persistent).unwrap();
    create(&mut store, "/p/lease", CreateMode::Ephemeral).unwrap();

    let bytes = store.snapshot().unwrap();
    let restored = NodeStore::restore(&bytes).unwrap();

    assert_eq!(restored.last_zxid(), store.last_zxid());
    assert_eq!(restored.get("/p/keep"), store.get("/p/keep"));
    assert!(!restored.exists("/p/lease"));
    assert_eq!(restored.children("/p").unwrap(), vec!["keep"]);
    assert!(restored.ephemerals_of(SESSION).is_empty());
}

#[test]
fn test_restore_rejects_garbage() {
    assert!(NodeStore::restore(b"not a snapshot").is_err());
}
