//! Sequencing driver integration tests

use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

use tasker_concurrency::cancellation::CancelReason;
use tasker_concurrency::operation::{
    CancelPolicy, CancellableOperation, OperationOutcome, WorkContext, WorkStatus,
};
use tasker_concurrency::sequence::{Sequence, SequenceOutcome, SequenceReport};
use tasker_concurrency::state_machine::OperationState;

use tasker_concurrency::TaskerError;

use crate::common::{panicking, timed_steps, timed_steps_with, WorkProbe};

#[tokio::test(start_paused = true)]
async fn cancel_between_steps_short_circuits_remaining_steps() {
    let (steps, probes) = timed_steps(6);
    let sequence = Sequence::new("six-steps");
    let started = Instant::now();

    let runner = sequence.clone();
    let run_steps = steps.clone();
    let handle = tokio::spawn(async move { runner.run(run_steps).await });

    // step-1 finishes at 1s, step-2 runs until 3s
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(sequence.current_step().as_deref(), Some("step-2"));
    assert!(sequence.cancel());

    let report = handle.await.unwrap().unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(report.outcome, SequenceOutcome::Cancelled);

    let outcomes: Vec<_> = report.steps.iter().map(|s| s.outcome).collect();
    assert_eq!(outcomes[0], OperationOutcome::Completed);
    assert!(outcomes[1..]
        .iter()
        .all(|o| *o == OperationOutcome::Cancelled));

    // step-2 was released early but its timer still runs to the end
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(steps[0].state(), OperationState::Completed);
    assert_eq!(steps[1].state(), OperationState::Completed);
    for (step, probe) in steps[2..].iter().zip(&probes[2..]) {
        assert_eq!(step.state(), OperationState::Cancelled);
        assert!(!probe.invoked(), "{} should never run", step.name());
    }
}

#[tokio::test(start_paused = true)]
async fn independently_spawned_nested_sequence_survives_outer_cancel() {
    let (inner_tx, inner_rx) = oneshot::channel::<SequenceReport>();
    let (inner_steps, inner_probes) = timed_steps(3);

    let spawner = CancellableOperation::from_fn("spawner", move |_ctx: WorkContext| async move {
        // Not chained: nothing links this sequence to the spawner's scope
        tokio::spawn(async move {
            if let Ok(report) = Sequence::new("nested").run(inner_steps).await {
                let _ = inner_tx.send(report);
            }
        });
        tokio::time::sleep(Duration::from_secs(10)).await;
        WorkStatus::Finished
    });
    let trailing = CancellableOperation::timed("trailing", Duration::from_secs(1));

    let outer = Sequence::new("outer");
    let runner = outer.clone();
    let handle = tokio::spawn(async move { runner.run(vec![spawner, trailing]).await });

    tokio::time::sleep(Duration::from_millis(500)).await;
    outer.cancel();

    let outer_report = handle.await.unwrap().unwrap();
    assert_eq!(outer_report.outcome, SequenceOutcome::Cancelled);
    assert_eq!(outer_report.cancelled_steps(), 2);

    let inner_report = tokio::time::timeout(Duration::from_secs(30), inner_rx)
        .await
        .expect("nested sequence finishes")
        .expect("nested report sent");
    assert_eq!(inner_report.outcome, SequenceOutcome::Completed);
    assert_eq!(inner_report.completed_steps(), 3);
    assert!(inner_probes.iter().all(|p| p.finished() && !p.saw_cancel()));
}

#[tokio::test(start_paused = true)]
async fn concurrent_unlinked_operation_completes_when_sequence_cancelled() {
    let (steps, _probes) = timed_steps(3);
    let bystander = CancellableOperation::timed("bystander", Duration::from_secs(4));

    let sequence = Sequence::new("cancelled");
    let runner = sequence.clone();
    let seq_handle = tokio::spawn(async move { runner.run(steps).await });
    let op = bystander.clone();
    let op_handle = tokio::spawn(async move { op.start().await });

    tokio::time::sleep(Duration::from_millis(500)).await;
    sequence.cancel();

    assert_eq!(
        seq_handle.await.unwrap().unwrap().outcome,
        SequenceOutcome::Cancelled
    );
    assert_eq!(op_handle.await.unwrap().unwrap(), OperationOutcome::Completed);
    assert_eq!(bystander.state(), OperationState::Completed);
}

#[tokio::test(start_paused = true)]
async fn chained_sequence_receives_cancellation_through_its_link() {
    let (inner_tx, inner_rx) = oneshot::channel::<SequenceReport>();
    let (inner_steps, inner_probes) = timed_steps(3);

    let host = CancellableOperation::from_fn("host", move |ctx: WorkContext| async move {
        let inner = Sequence::chained("chained", ctx.scope());
        if let Ok(report) = inner.run(inner_steps).await {
            let _ = inner_tx.send(report);
        }
        WorkStatus::Finished
    });

    let outer = Sequence::new("outer");
    let runner = outer.clone();
    let handle = tokio::spawn(async move { runner.run(vec![host]).await });

    // Inner step-1 done at 1s; inner step-2 running at 1.5s
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    outer.cancel();

    let outer_report = handle.await.unwrap().unwrap();
    assert_eq!(outer_report.outcome, SequenceOutcome::Cancelled);

    let inner_report = inner_rx.await.expect("chained report sent");
    assert_eq!(inner_report.outcome, SequenceOutcome::Cancelled);
    let outcomes: Vec<_> = inner_report.steps.iter().map(|s| s.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            OperationOutcome::Completed,
            OperationOutcome::Cancelled,
            OperationOutcome::Cancelled
        ]
    );
    assert!(!inner_probes[2].invoked());
}

#[tokio::test(start_paused = true)]
async fn sequence_chained_to_cancelled_scope_skips_everything() {
    let outer = Sequence::new("outer");
    outer.cancel();

    let probe = WorkProbe::new();
    let inner = Sequence::chained("inner", outer.scope());
    let report = inner
        .run(vec![probe.timed("skipped", Duration::from_secs(1))])
        .await
        .unwrap();

    assert!(inner.is_cancelled());
    assert_eq!(report.outcome, SequenceOutcome::Cancelled);
    assert!(!probe.invoked());
}

#[tokio::test(start_paused = true)]
async fn entry_checkpoint_only_steps_finish_running_step_then_skip_the_rest() {
    let (steps, probes) = timed_steps_with(6, CancelPolicy::EntryCheckpointOnly);
    let sequence = Sequence::new("six-held-steps");
    let started = Instant::now();

    let runner = sequence.clone();
    let run_steps = steps.clone();
    let handle = tokio::spawn(async move { runner.run(run_steps).await });

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(sequence.current_step().as_deref(), Some("step-2"));
    assert!(sequence.cancel());

    // step-2 started at 1s and is allowed its full 2s
    let report = handle.await.unwrap().unwrap();
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(report.outcome, SequenceOutcome::Cancelled);

    let outcomes: Vec<_> = report.steps.iter().map(|s| s.outcome).collect();
    assert_eq!(outcomes[..2], [OperationOutcome::Completed, OperationOutcome::Completed]);
    assert!(outcomes[2..]
        .iter()
        .all(|o| *o == OperationOutcome::Cancelled));

    assert!(probes[1].finished());
    assert!(probes[1].saw_cancel());
    assert_eq!(steps[1].state(), OperationState::Completed);
    for (step, probe) in steps[2..].iter().zip(&probes[2..]) {
        assert_eq!(step.state(), OperationState::Cancelled);
        assert!(!probe.invoked(), "{} should never run", step.name());
    }
}

#[tokio::test(start_paused = true)]
async fn failing_step_cancels_the_steps_after_it() {
    let first = WorkProbe::new();
    let later: Vec<_> = (0..2).map(|_| WorkProbe::new()).collect();
    let steps = vec![
        first.timed("step-1", Duration::from_secs(1)),
        panicking("step-2", Duration::from_secs(1)),
        later[0].timed("step-3", Duration::from_secs(1)),
        later[1].timed("step-4", Duration::from_secs(1)),
    ];

    let sequence = Sequence::new("fails-midway");
    let err = sequence.run(steps.clone()).await.unwrap_err();

    assert!(matches!(err, TaskerError::WorkPanicked { ref operation, .. } if operation == "step-2"));
    assert_eq!(sequence.scope().reason(), Some(CancelReason::StepFailed));
    assert!(first.finished());
    assert_eq!(steps[1].state(), OperationState::Failed);
    for (step, probe) in steps[2..].iter().zip(&later) {
        assert_eq!(step.state(), OperationState::Cancelled);
        assert!(!probe.invoked(), "{} should never run", step.name());
    }
}

#[tokio::test(start_paused = true)]
async fn joined_pair_inside_a_step_completes_together() {
    let (pair_tx, pair_rx) = oneshot::channel::<SequenceReport>();
    let (pair, probes) = timed_steps(2);

    let host = CancellableOperation::from_fn("host", move |_ctx: WorkContext| async move {
        if let Ok(report) = Sequence::new("pair").join(pair).await {
            let _ = pair_tx.send(report);
        }
        WorkStatus::Finished
    });

    let started = Instant::now();
    assert_eq!(host.start().await.unwrap(), OperationOutcome::Completed);

    // Both halves overlap, so the host waits for the longer one only
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(started.elapsed() < Duration::from_secs(3));

    let report = pair_rx.await.expect("pair report sent");
    assert_eq!(report.outcome, SequenceOutcome::Completed);
    assert_eq!(report.completed_steps(), 2);
    assert!(probes.iter().all(|p| p.finished()));
}

#[tokio::test(start_paused = true)]
async fn cancelling_a_join_releases_every_running_step() {
    let (steps, probes) = timed_steps(3);
    let joined = Sequence::new("joined");
    let started = Instant::now();

    let runner = joined.clone();
    let run_steps = steps.clone();
    let handle = tokio::spawn(async move { runner.join(run_steps).await });

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(probes.iter().all(|p| p.invoked()));
    assert!(joined.cancel());

    let report = handle.await.unwrap().unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(report.outcome, SequenceOutcome::Cancelled);
    assert_eq!(report.cancelled_steps(), 3);
    assert!(steps
        .iter()
        .all(|s| s.state() == OperationState::CancelRequested));
}

#[tokio::test(start_paused = true)]
async fn failing_joined_step_cancels_its_siblings() {
    let siblings: Vec<_> = (1..=2)
        .map(|i| CancellableOperation::timed_cooperative(format!("sibling-{i}"), Duration::from_secs(60)))
        .collect();
    let mut steps = vec![panicking("fragile", Duration::from_millis(100))];
    steps.extend(siblings.iter().cloned());

    let started = Instant::now();
    let err = Sequence::new("joined-failure").join(steps).await.unwrap_err();
    assert!(matches!(err, TaskerError::WorkPanicked { .. }));
    assert!(started.elapsed() < Duration::from_secs(1));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(siblings
        .iter()
        .all(|s| s.state() == OperationState::Cancelled));
}
