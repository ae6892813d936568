//! The job contract: a caller-defined unit of asynchronous work.
//!
//! A job carries a progress weight (its fractional contribution to the
//! runner's aggregate) and a cancellation-interrupt preference. Lifecycle
//! hooks run on the owner context; `do_job` runs on a worker thread and may
//! block arbitrarily.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::owner::OwnerHandle;

/// Listener for already-weighted progress values (fraction * weight).
pub(crate) type WeightedProgressFn = Arc<dyn Fn(f32) + Send + Sync>;

/// Cooperative abort token shared between a running job and its task.
/// The task requests it when cancelled; the job body polls it (directly or
/// via `JobContext::is_cancelled`) and bails out at a convenient point.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A unit of work scheduled by the runner.
///
/// `do_job` is invoked exactly once per submission, off the owner context.
/// Every other method here runs on the owner context. The scheduler never
/// inspects `Output`; a job that fails simply completes with whatever payload
/// it chooses (typically a `Result`) and `on_post_run` interprets it.
pub trait Job: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Performs the work. May run arbitrarily long; poll
    /// `cx.is_cancelled()` at reasonable intervals to honour cancellation.
    fn do_job(&self, cx: &JobContext) -> Self::Output;

    /// Runs on the owner context immediately before `do_job` is dispatched.
    fn on_pre_run(&self) {}

    /// Runs on the owner context after successful completion.
    fn on_post_run(&self, _result: Self::Output) {}

    /// Runs on the owner context when the job's execution was cancelled,
    /// before or during completion. The result, if any, has been discarded.
    fn on_cancelled(&self) {}

    /// Cooperative cancellation hook, called synchronously on the owner
    /// context when the runner cancels. Set internal abort flags here;
    /// the task has already requested the shared `CancelToken`.
    fn cancel(&self) {}

    /// This job's contribution to the runner's aggregate progress scale.
    fn progress_weight(&self) -> f32 {
        0.0
    }

    /// When true (the default), a cancelled job is abandoned immediately:
    /// `on_cancelled` fires without waiting for `do_job` to return. When
    /// false, the work runs to natural completion and only then is its
    /// result discarded and `on_cancelled` delivered.
    fn interrupt_on_cancel(&self) -> bool {
        true
    }

    /// Reserved. Scheduling is strict FIFO and never consults this value.
    fn task_priority(&self) -> i32 {
        -1
    }
}

/// Owner handle + internal progress listener for one submitted job.
///
/// Each slot may be bound at most once; progress publication can race with
/// binding, so re-binding is a fail-fast programming error rather than a
/// synchronized update.
#[derive(Default)]
pub(crate) struct JobBinding {
    owner: OnceLock<OwnerHandle>,
    progress: OnceLock<WeightedProgressFn>,
}

impl JobBinding {
    pub(crate) fn bind_owner(&self, owner: OwnerHandle) {
        if self.owner.set(owner).is_err() {
            panic!("job owner already bound");
        }
    }

    pub(crate) fn bind_progress_listener(&self, listener: WeightedProgressFn) {
        if self.progress.set(listener).is_err() {
            panic!("job progress listener already bound");
        }
    }
}

/// Execution-side view of a running job, handed to `do_job`.
pub struct JobContext {
    binding: Arc<JobBinding>,
    cancel: CancelToken,
    weight: f32,
}

impl JobContext {
    pub(crate) fn new(binding: Arc<JobBinding>, cancel: CancelToken, weight: f32) -> Self {
        Self {
            binding,
            cancel,
            weight,
        }
    }

    /// Reports fractional completion (0..=1) of this job. The value is
    /// scaled by the job's progress weight and delivered to the runner's
    /// aggregate path on the owner context. Ignored when no listener has
    /// been bound yet.
    pub fn publish_progress(&self, fraction: f32) {
        let (Some(owner), Some(listener)) = (self.binding.owner.get(), self.binding.progress.get())
        else {
            return;
        };
        let weighted = fraction * self.weight;
        let listener = Arc::clone(listener);
        owner.post(move || listener(weighted));
    }

    /// True once cancellation has been requested for this job.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Clone of the abort token, for work that outlives the context borrow.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::Owner;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    #[should_panic(expected = "job owner already bound")]
    fn rebinding_owner_panics() {
        let owner = Owner::spawn("job-test");
        let binding = JobBinding::default();
        binding.bind_owner(owner.handle());
        binding.bind_owner(owner.handle());
    }

    #[test]
    #[should_panic(expected = "job progress listener already bound")]
    fn rebinding_progress_listener_panics() {
        let binding = JobBinding::default();
        binding.bind_progress_listener(Arc::new(|_| {}));
        binding.bind_progress_listener(Arc::new(|_| {}));
    }

    #[test]
    fn publish_progress_without_binding_is_ignored() {
        let cx = JobContext::new(Arc::new(JobBinding::default()), CancelToken::new(), 0.5);
        // No owner, no listener: must be a no-op, not a fault.
        cx.publish_progress(1.0);
    }

    #[test]
    fn publish_progress_scales_by_weight() {
        let owner = Owner::spawn("job-test");
        let binding = Arc::new(JobBinding::default());
        binding.bind_owner(owner.handle());

        let (tx, rx) = mpsc::channel();
        binding.bind_progress_listener(Arc::new(move |weighted| {
            tx.send(weighted).unwrap();
        }));

        let cx = JobContext::new(binding, CancelToken::new(), 0.4);
        cx.publish_progress(0.5);
        let got = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!((got - 0.2).abs() < 1e-6);
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let cx = JobContext::new(Arc::new(JobBinding::default()), token.clone(), 0.0);
        assert!(!cx.is_cancelled());
        token.request();
        assert!(cx.is_cancelled());
    }
}
