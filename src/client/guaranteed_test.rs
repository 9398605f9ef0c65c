use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use mockall::Sequence;
use tracing_test::traced_test;

use super::*;
use crate::config::BackoffPolicy;
use crate::CoordinationError;

const SESSION: u64 = 5;

fn policy(max_retries: usize) -> BackoffPolicy {
    BackoffPolicy {
        max_retries,
        base_delay_ms: 10,
        max_delay_ms: 100,
    }
}

#[tokio::test(start_paused = true)]
async fn test_delete_succeeds_first_time() {
    let mut api = MockKeeperApi::new();
    api.expect_delete().times(1).returning(|_, _, _, _| Ok(()));

    let outcome = GuaranteedDelete::new(Arc::new(api), policy(3))
        .delete(SESSION, "/a", None, false)
        .await
        .unwrap();

    assert!(matches!(outcome, DeleteOutcome::Deleted));
}

#[tokio::test(start_paused = true)]
async fn test_no_node_after_lost_reply_counts_as_deleted() {
    let mut api = MockKeeperApi::new();
    let mut seq = Sequence::new();
    api.expect_delete()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _, _| Err(CoordinationError::ConnectionLoss));
    api.expect_delete()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, path, _, _| {
            Err(CoordinationError::NoNode {
                path: path.to_string(),
            })
        });

    let outcome = GuaranteedDelete::new(Arc::new(api), policy(3))
        .delete(SESSION, "/a", Some(2), true)
        .await
        .unwrap();

    assert!(matches!(outcome, DeleteOutcome::Deleted));
}

#[tokio::test(start_paused = true)]
async fn test_no_node_on_first_attempt_is_an_error() {
    let mut api = MockKeeperApi::new();
    api.expect_delete().times(1).returning(|_, path, _, _| {
        Err(CoordinationError::NoNode {
            path: path.to_string(),
        })
    });

    let err = GuaranteedDelete::new(Arc::new(api), policy(3))
        .delete(SESSION, "/a", None, false)
        .await
        .unwrap_err();

    assert_eq!(err, CoordinationError::NoNode { path: "/a".into() });
}

#[tokio::test(start_paused = true)]
async fn test_version_conflict_is_not_retried() {
    let mut api = MockKeeperApi::new();
    api.expect_delete().times(1).returning(|_, path, _, _| {
        Err(CoordinationError::VersionConflict {
            path: path.to_string(),
            expected: 1,
            actual: 2,
        })
    });

    let result = GuaranteedDelete::new(Arc::new(api), policy(3))
        .delete(SESSION, "/a", Some(1), false)
        .await;

    assert!(matches!(
        result,
        Err(CoordinationError::VersionConflict { .. })
    ));
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_exhausted_retries_continue_in_background() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut api = MockKeeperApi::new();
    api.expect_delete().returning(move |_, _, _, _| {
        // Three foreground attempts, two more in the background, then success
        if counter.fetch_add(1, Ordering::SeqCst) < 5 {
            Err(CoordinationError::ConnectionLoss)
        } else {
            Ok(())
        }
    });

    let outcome = GuaranteedDelete::new(Arc::new(api), policy(2))
        .delete(SESSION, "/a", None, false)
        .await
        .unwrap();

    let handle = match outcome {
        DeleteOutcome::Deferred(handle) => handle,
        DeleteOutcome::Deleted => panic!("expected a deferred delete"),
    };
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    assert!(logs_contain("delete retries exhausted, continuing in background"));

    handle.await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 6);
}

#[tokio::test(start_paused = true)]
async fn test_background_delete_stops_on_expired_session() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut api = MockKeeperApi::new();
    api.expect_delete().returning(move |session_id, _, _, _| {
        if counter.fetch_add(1, Ordering::SeqCst) < 1 {
            Err(CoordinationError::ConnectionLoss)
        } else {
            Err(CoordinationError::SessionExpired { session_id })
        }
    });

    let outcome = GuaranteedDelete::new(Arc::new(api), policy(0))
        .delete(SESSION, "/a", None, false)
        .await
        .unwrap();

    match outcome {
        DeleteOutcome::Deferred(handle) => handle.await.unwrap(),
        DeleteOutcome::Deleted => panic!("expected a deferred delete"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
