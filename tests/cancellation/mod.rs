//! Cancellation observability across execution contexts
//!
//! The same checkpoint must report cancellation no matter where the work
//! runs: a current-thread runtime, a multi-thread runtime, or a blocking
//! thread handed off through `spawn_blocking`.

use std::time::Duration;
use tokio_test::{assert_pending, assert_ready, task};

use tasker_concurrency::cancellation::{CancelReason, CancelScope};
use tasker_concurrency::operation::{CancellableOperation, OperationOutcome};
use tasker_concurrency::state_machine::OperationState;

use crate::common::blocking_poller;

async fn wait_for_state(op: &CancellableOperation, expected: OperationState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while op.state() != expected {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("{op} never reached {expected}, stuck in {}", op.state()));
}

async fn cooperative_cancel_round_trip() {
    let op = CancellableOperation::timed_cooperative("cooperative", Duration::from_secs(30));

    let runner = op.clone();
    let handle = tokio::spawn(async move { runner.start().await });
    wait_for_state(&op, OperationState::Running).await;

    assert!(op.cancel());
    assert_eq!(handle.await.unwrap().unwrap(), OperationOutcome::Cancelled);
    wait_for_state(&op, OperationState::Cancelled).await;
}

async fn blocking_cancel_round_trip() {
    let op = blocking_poller("blocking");

    let runner = op.clone();
    let handle = tokio::spawn(async move { runner.start().await });
    wait_for_state(&op, OperationState::Running).await;

    assert!(op.cancel());
    assert_eq!(handle.await.unwrap().unwrap(), OperationOutcome::Cancelled);
    wait_for_state(&op, OperationState::Cancelled).await;
}

#[tokio::test(flavor = "current_thread")]
async fn cooperative_work_observes_cancel_on_current_thread_runtime() {
    cooperative_cancel_round_trip().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cooperative_work_observes_cancel_on_multi_thread_runtime() {
    cooperative_cancel_round_trip().await;
}

#[tokio::test(flavor = "current_thread")]
async fn blocking_work_observes_cancel_on_current_thread_runtime() {
    blocking_cancel_round_trip().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_work_observes_cancel_on_multi_thread_runtime() {
    blocking_cancel_round_trip().await;
}

#[test]
fn cancel_from_plain_thread_is_visible_to_runtime() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();

    let op = CancellableOperation::timed_cooperative("cross-thread", Duration::from_secs(30));
    let runner = op.clone();
    let handle = runtime.spawn(async move { runner.start().await });

    runtime.block_on(wait_for_state(&op, OperationState::Running));
    let canceller = {
        let op = op.clone();
        std::thread::spawn(move || op.cancel())
    };
    assert!(canceller.join().unwrap());

    let outcome = runtime.block_on(handle).unwrap().unwrap();
    assert_eq!(outcome, OperationOutcome::Cancelled);
}

#[test]
fn cancelled_future_is_pending_until_cancel() {
    let scope = CancelScope::new("poll");
    let mut waiter = task::spawn(scope.cancelled());

    assert_pending!(waiter.poll());
    assert!(!waiter.is_woken());

    scope.cancel_with(CancelReason::Requested);
    assert!(waiter.is_woken());
    assert_ready!(waiter.poll());
}

#[test]
fn handlers_registered_on_one_scope_do_not_reach_unlinked_scopes() {
    let outer = CancelScope::new("outer");
    let linked = CancelScope::new("linked");
    let grandchild = CancelScope::new("grandchild");

    let target = linked.clone();
    let _link = outer
        .register(move |_| {
            target.cancel_with(CancelReason::ParentCancelled);
        })
        .unwrap();

    outer.cancel();

    assert_eq!(linked.reason(), Some(CancelReason::ParentCancelled));
    assert!(!grandchild.is_cancelled());
}
