#![allow(dead_code)]


use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tasker_concurrency::operation::{
    work_fn, CancelPolicy, CancellableOperation, WorkContext, WorkStatus,
};

/// Flags a test can inspect to see what a unit of work actually did
#[derive(Debug, Clone, Default)]
pub struct WorkProbe {
    invoked: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    saw_cancel: Arc<AtomicBool>,
}

impl WorkProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invoked(&self) -> bool {
        self.invoked.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn saw_cancel(&self) -> bool {
        self.saw_cancel.load(Ordering::SeqCst)
    }

    /// Timed operation that records invocation and natural completion
    pub fn timed(&self, name: impl Into<String>, duration: Duration) -> CancellableOperation {
        self.timed_with(name, duration, CancelPolicy::default())
    }

    pub fn timed_with(
        &self,
        name: impl Into<String>,
        duration: Duration,
        policy: CancelPolicy,
    ) -> CancellableOperation {
        let probe = self.clone();
        let work = work_fn(move |ctx: WorkContext| async move {
            probe.invoked.store(true, Ordering::SeqCst);
            tokio::time::sleep(duration).await;
            probe.saw_cancel.store(ctx.is_cancelled(), Ordering::SeqCst);
            probe.finished.store(true, Ordering::SeqCst);
            WorkStatus::Finished
        });
        CancellableOperation::with_policy(name, work, policy)
    }
}

/// Steps `step-1..=step-N` where step `i` takes `i` seconds, each with its own probe
pub fn timed_steps(count: u64) -> (Vec<CancellableOperation>, Vec<WorkProbe>) {
    timed_steps_with(count, CancelPolicy::default())
}

pub fn timed_steps_with(
    count: u64,
    policy: CancelPolicy,
) -> (Vec<CancellableOperation>, Vec<WorkProbe>) {
    (1..=count)
        .map(|i| {
            let probe = WorkProbe::new();
            let op = probe.timed_with(format!("step-{i}"), Duration::from_secs(i), policy);
            (op, probe)
        })
        .unzip()
}

/// Operation whose work panics after `delay`
pub fn panicking(name: impl Into<String>, delay: Duration) -> CancellableOperation {
    CancellableOperation::from_fn(name, move |_ctx: WorkContext| async move {
        tokio::time::sleep(delay).await;
        if delay < Duration::MAX {
            panic!("work gave up after {delay:?}");
        }
        WorkStatus::Finished
    })
}

/// Operation that spins until cancelled, polling the checkpoint from a blocking thread
pub fn blocking_poller(name: impl Into<String>) -> CancellableOperation {
    CancellableOperation::new(
        name,
        work_fn(|ctx: WorkContext| async move {
            tokio::task::spawn_blocking(move || {
                while !ctx.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(1));
                }
                WorkStatus::Interrupted
            })
            .await
            .unwrap_or(WorkStatus::Finished)
        }),
    )
}
