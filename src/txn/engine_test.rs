use bytes::Bytes;

use super::*;
use crate::storage::CreateMode;
use crate::storage::NodeStore;
use crate::watch::EventType;
use crate::watch::WatchTrigger;
use crate::CoordinationError;

const SESSION: u64 = 3;
const NOW: u64 = 1_700_000_000_000;

fn store_with(paths: &[&str]) -> NodeStore {
    let mut store = NodeStore::new();
    let ops: Vec<Op> = paths
        .iter()
        .map(|p| Op::create(*p, Bytes::from_static(b"init"), CreateMode::Persistent))
        .collect();
    TransactionEngine::apply(&mut store, &ops, SESSION, NOW).unwrap();
    store
}

#[test]
fn test_batch_commits_under_one_zxid() {
    let mut store = store_with(&["/app"]);
    let before = store.last_zxid();

    let committed = TransactionEngine::apply(
        &mut store,
        &[
            Op::create("/app/a", "a", CreateMode::Persistent),
            Op::set_data("/app", "updated", Some(0)),
            Op::check("/app/a", 0),
        ],
        SESSION,
        NOW,
    )
    .unwrap();

    assert_eq!(committed.zxid, before + 1);
    assert_eq!(store.last_zxid(), before + 1);
    assert_eq!(store.stat("/app/a").unwrap().czxid, committed.zxid);
    assert_eq!(store.stat("/app").unwrap().mzxid, committed.zxid);

    let types: Vec<String> = committed.results.iter().map(|r| r.op_type().to_string()).collect();
    assert_eq!(types, vec!["CREATE", "SET_DATA", "CHECK"]);
    assert_eq!(committed.results[0].for_path(), "/app/a");
}

#[test]
fn test_failed_op_rolls_back_whole_batch() {
    let mut store = store_with(&["/app", "/app/existing"]);
    let before = store.last_zxid();
    let (data_before, stat_before) = store.get("/app").unwrap();

    let err = TransactionEngine::apply(
        &mut store,
        &[
            Op::create("/app/new", "x", CreateMode::Persistent),
            Op::set_data("/app", "changed", None),
            Op::delete("/app/existing", None),
            Op::create("/app/existing2/child", "y", CreateMode::Persistent),
        ],
        SESSION,
        NOW,
    )
    .unwrap_err();

    assert_eq!(
        err,
        CoordinationError::TransactionAborted {
            index: 3,
            source: Box::new(CoordinationError::NoParent {
                path: "/app/existing2/child".into()
            }),
        }
    );
    assert!(!store.exists("/app/new"));
    assert!(store.exists("/app/existing"));
    assert_eq!(store.get("/app").unwrap(), (data_before, stat_before));
    assert_eq!(store.last_zxid(), before);
}

#[test]
fn test_version_conflict_aborts_without_effect() {
    let mut store = store_with(&["/cfg"]);

    let err = TransactionEngine::apply(
        &mut store,
        &[
            Op::set_data("/cfg", "v1", Some(0)),
            Op::set_data("/cfg", "v2", Some(0)),
        ],
        SESSION,
        NOW,
    )
    .unwrap_err();

    assert!(matches!(
        err,
        CoordinationError::TransactionAborted { index: 1, ref source }
            if **source == CoordinationError::VersionConflict {
                path: "/cfg".into(),
                expected: 0,
                actual: 1,
            }
    ));
    assert_eq!(store.stat("/cfg").unwrap().version, 0);
    assert_eq!(store.get("/cfg").unwrap().0, Bytes::from_static(b"init"));
}

#[test]
fn test_sequential_counter_restored_on_abort() {
    let mut store = store_with(&["/q"]);

    let err = TransactionEngine::apply(
        &mut store,
        &[
            Op::create("/q/item-", "", CreateMode::PersistentSequential),
            Op::check("/q", 99),
        ],
        SESSION,
        NOW,
    );
    assert!(err.is_err());

    let committed = TransactionEngine::apply(
        &mut store,
        &[Op::create("/q/item-", "", CreateMode::PersistentSequential)],
        SESSION,
        NOW,
    )
    .unwrap();
    assert_eq!(committed.results[0].for_path(), "/q/item-0000000000");
}

#[test]
fn test_ops_see_effects_of_earlier_ops() {
    let mut store = NodeStore::new();

    let committed = TransactionEngine::apply(
        &mut store,
        &[
            Op::create("/a", "", CreateMode::Persistent),
            Op::create("/a/b", "", CreateMode::Persistent),
            Op::set_data("/a/b", "x", Some(0)),
            Op::check("/a/b", 1),
            Op::delete("/a/b", Some(1)),
        ],
        SESSION,
        NOW,
    )
    .unwrap();

    assert_eq!(committed.results.len(), 5);
    assert!(store.exists("/a"));
    assert!(!store.exists("/a/b"));
}

#[test]
fn test_triggers_follow_op_order() {
    let mut store = store_with(&["/w"]);

    let committed = TransactionEngine::apply(
        &mut store,
        &[
            Op::create("/w/a", "", CreateMode::Persistent),
            Op::set_data("/w", "x", None),
        ],
        SESSION,
        NOW,
    )
    .unwrap();

    assert_eq!(
        committed.triggers,
        vec![
            WatchTrigger::new("/w/a", EventType::NodeCreated),
            WatchTrigger::new("/w", EventType::NodeChildrenChanged),
            WatchTrigger::new("/w", EventType::NodeDataChanged),
        ]
    );
}

#[test]
fn test_empty_batch_consumes_no_zxid() {
    let mut store = NodeStore::new();

    let committed = TransactionEngine::apply(&mut store, &[], SESSION, NOW).unwrap();

    assert!(committed.results.is_empty());
    assert_eq!(store.last_zxid(), 0);
}

#[test]
fn test_with_tree_applies_to_create_and_delete() {
    let mut store = NodeStore::new();

    TransactionEngine::apply(
        &mut store,
        &[Op::create("/deep/er/node", "", CreateMode::Persistent).with_tree()],
        SESSION,
        NOW,
    )
    .unwrap();
    assert!(store.exists("/deep/er"));

    TransactionEngine::apply(&mut store, &[Op::delete("/deep", None).with_tree()], SESSION, NOW)
        .unwrap();
    assert!(!store.exists("/deep"));
    assert_eq!(store.node_count(), 1);
}
