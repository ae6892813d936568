//! Task: scheduler-internal wrapper binding one job to a worker thread.
//!
//! A task is created when a job is promoted from queued to running and is
//! never reused. Exactly one of the two terminal notifications (done /
//! cancelled) reaches the runner per task: `finished` is swapped true by
//! whichever path gets there first and the loser is a no-op, so the wrapper
//! never depends on any ordering between cancellation and completion.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::job::{CancelToken, Job, JobBinding, JobContext};

use super::Shared;

/// Type-erased running task, as held in the runner's run set.
pub(super) trait RunningTask: Send + Sync {
    fn id(&self) -> u64;

    /// Drives the job through its cancellation path. Owner context only.
    fn cancel(self: Arc<Self>);
}

/// Type-erased job waiting in the ready queue.
pub(super) trait PendingJob: Send {
    fn start(self: Box<Self>, shared: &Arc<Shared>) -> Arc<dyn RunningTask>;
}

pub(super) struct Pending<J: Job> {
    pub(super) job: Arc<J>,
    pub(super) binding: Arc<JobBinding>,
}

impl<J: Job> PendingJob for Pending<J> {
    fn start(self: Box<Self>, shared: &Arc<Shared>) -> Arc<dyn RunningTask> {
        let task = Arc::new(Task {
            shared: Arc::clone(shared),
            job: self.job,
            binding: self.binding,
            id: shared.next_task_id(),
            cancel_token: CancelToken::new(),
            finished: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
        });
        Task::begin(&task);
        task
    }
}

pub(super) struct Task<J: Job> {
    shared: Arc<Shared>,
    job: Arc<J>,
    binding: Arc<JobBinding>,
    id: u64,
    cancel_token: CancelToken,
    /// Terminal-delivery latch, set exactly once.
    finished: AtomicBool,
    cancel_requested: AtomicBool,
}

impl<J: Job> Task<J> {
    fn begin(task: &Arc<Self>) {
        let me = Arc::clone(task);
        task.shared.owner.post(move || me.run_pre());
    }

    /// First stage, on the owner context: pre-run hook, then dispatch the
    /// work onto its own thread.
    fn run_pre(self: Arc<Self>) {
        if self.finished.load(Ordering::Acquire) {
            // Cancelled (interrupt path) before ever starting.
            return;
        }
        if self.cancel_requested.load(Ordering::Acquire) {
            // Cancelled before dispatch: the work never runs.
            self.finish_cancelled();
            return;
        }
        self.job.on_pre_run();

        let me = Arc::clone(&self);
        let cx = JobContext::new(
            Arc::clone(&self.binding),
            self.cancel_token.clone(),
            self.job.progress_weight(),
        );
        thread::Builder::new()
            .name(format!("jobrun-worker-{}", self.id))
            .spawn(move || {
                let result = catch_unwind(AssertUnwindSafe(|| me.job.do_job(&cx)));
                let back = Arc::clone(&me);
                me.shared.owner.post(move || back.complete(result));
            })
            .expect("spawn job worker thread");
    }

    /// Completion stage, back on the owner context.
    fn complete(self: Arc<Self>, result: thread::Result<J::Output>) {
        self.shared.owner.assert_current("task completion");
        if self.cancel_requested.load(Ordering::Acquire) && !self.job.interrupt_on_cancel() {
            // Cancelled but allowed to finish naturally: discard the result.
            self.finish_cancelled();
            return;
        }
        if self.finished.swap(true, Ordering::AcqRel) {
            // Cancel path already delivered the terminal notification.
            return;
        }
        match result {
            Ok(out) => self.job.on_post_run(out),
            Err(_) => {
                tracing::error!(task = self.id, "job panicked; slot released without callbacks");
            }
        }
        Shared::on_task_finished(&self.shared, self.id, self.job.progress_weight(), false);
    }

    fn finish_cancelled(&self) {
        if self.finished.swap(true, Ordering::AcqRel) {
            return;
        }
        self.job.on_cancelled();
        Shared::on_task_finished(&self.shared, self.id, self.job.progress_weight(), true);
    }
}

impl<J: Job> RunningTask for Task<J> {
    fn id(&self) -> u64 {
        self.id
    }

    fn cancel(self: Arc<Self>) {
        self.shared.owner.assert_current("task cancel");
        self.job.cancel();
        self.cancel_token.request();
        self.cancel_requested.store(true, Ordering::Release);
        if self.job.interrupt_on_cancel() {
            self.finish_cancelled();
        }
        // interrupt_on_cancel == false: the worker keeps running; its
        // completion callback discards the result and delivers on_cancelled.
    }
}
