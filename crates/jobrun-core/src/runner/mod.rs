//! Bounded-concurrency job runner with weighted progress aggregation.
//!
//! Jobs are submitted from any thread; at most `max_concurrent` run at once
//! and the rest wait in a strict FIFO ready queue. Every lifecycle callback
//! is delivered on the runner's owner context. When the ready queue and run
//! set drain to empty, the done listener fires exactly once with the current
//! cancelled flag and `wait_all_done` callers wake up.

mod task;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::job::{Job, JobBinding};
use crate::owner::OwnerHandle;
use crate::progress::AtomicProgress;

use task::{Pending, PendingJob, RunningTask};

type ProgressListener = Arc<dyn Fn(f32) + Send + Sync>;
type DoneListener = Arc<dyn Fn(&Runner, bool) + Send + Sync>;

/// The scheduler. Cheap to clone; clones share one instance.
pub struct Runner {
    shared: Arc<Shared>,
}

impl Clone for Runner {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

pub(crate) struct Shared {
    pub(crate) owner: OwnerHandle,
    max_concurrent: usize,
    queues: Mutex<Queues>,
    drained: Condvar,
    /// Per-runner cancellation flag; reset via `clear_cancelled_state`.
    cancelled: AtomicBool,
    progress: AtomicProgress,
    next_task_id: AtomicU64,
    progress_listener: RwLock<Option<ProgressListener>>,
    done_listener: RwLock<Option<DoneListener>>,
}

/// Ready queue and run set. Disjoint: a job is in at most one of them.
#[derive(Default)]
struct Queues {
    ready: VecDeque<Box<dyn PendingJob>>,
    run: Vec<Arc<dyn RunningTask>>,
}

impl Queues {
    fn all_done(&self) -> bool {
        self.ready.is_empty() && self.run.is_empty()
    }
}

impl Runner {
    pub fn new(owner: OwnerHandle, max_concurrent: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                owner,
                max_concurrent: max_concurrent.max(1),
                queues: Mutex::new(Queues::default()),
                drained: Condvar::new(),
                cancelled: AtomicBool::new(false),
                progress: AtomicProgress::default(),
                next_task_id: AtomicU64::new(0),
                progress_listener: RwLock::new(None),
                done_listener: RwLock::new(None),
            }),
        }
    }

    pub fn owner(&self) -> &OwnerHandle {
        &self.shared.owner
    }

    /// Submits a job: starts it immediately when a concurrency slot is free,
    /// otherwise appends it to the ready queue. Callable from any thread.
    pub fn submit<J: Job>(&self, job: J) {
        let job = Arc::new(job);
        let binding = Arc::new(JobBinding::default());
        binding.bind_owner(self.shared.owner.clone());

        // Internal listener for job-published progress: the value arrives
        // already weighted, on the owner context.
        let shared = Arc::clone(&self.shared);
        binding.bind_progress_listener(Arc::new(move |weighted| {
            shared.owner.assert_current("job progress delivery");
            let total = shared.progress.add(weighted);
            shared.publish_progress(total);
        }));

        let pending = Box::new(Pending { job, binding });
        let mut q = self.shared.queues.lock().unwrap();
        if q.run.len() < self.shared.max_concurrent {
            let running = pending.start(&self.shared);
            q.run.push(running);
        } else {
            tracing::debug!(queued = q.ready.len() + 1, "run set saturated, job queued");
            q.ready.push_back(pending);
        }
    }

    /// Cancels the batch: jobs still in the ready queue are dropped without
    /// any callback, and every running task is driven through its
    /// cancellation path on the owner context. Returns immediately;
    /// quiescence is signalled by the done notification. Idempotent.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
        let tasks: Vec<Arc<dyn RunningTask>> = {
            let mut q = self.shared.queues.lock().unwrap();
            q.ready.clear();
            q.run.clone()
        };
        if tasks.is_empty() {
            return;
        }
        tracing::info!(running = tasks.len(), "cancelling running tasks");
        self.shared.owner.post_or_run(move || {
            for t in tasks {
                t.cancel();
            }
        });
    }

    /// Resets the cancelled flag so the runner can serve a fresh batch.
    /// The caller is responsible for ensuring no stale jobs are in flight.
    pub fn clear_cancelled_state(&self) {
        self.shared.cancelled.store(false, Ordering::Release);
    }

    pub fn progress(&self) -> f32 {
        self.shared.progress.get()
    }

    /// Manual override of the aggregate progress value.
    pub fn set_progress(&self, v: f32) {
        self.shared.progress.set(v);
    }

    /// Single-slot progress listener; latest call wins.
    pub fn set_on_progress_listener(&self, f: impl Fn(f32) + Send + Sync + 'static) {
        *self.shared.progress_listener.write().unwrap() = Some(Arc::new(f));
    }

    /// Single-slot done listener; latest call wins. Receives the runner and
    /// whether the drained batch had been cancelled.
    pub fn set_on_done_listener(&self, f: impl Fn(&Runner, bool) + Send + Sync + 'static) {
        *self.shared.done_listener.write().unwrap() = Some(Arc::new(f));
    }

    /// Blocks until both queues are empty; returns immediately if already
    /// drained. Must not be called on the owner context: the completion
    /// bookkeeping that would wake this waiter runs there.
    pub fn wait_all_done(&self) {
        if self.shared.owner.is_current() {
            panic!("wait_all_done must not be called on the owner context");
        }
        let mut q = self.shared.queues.lock().unwrap();
        while !q.all_done() {
            q = self.shared.drained.wait(q).unwrap();
        }
    }

    /// Like `wait_all_done`, bounded by `timeout`. Returns false when the
    /// queues were still non-empty at the deadline.
    pub fn wait_all_done_timeout(&self, timeout: Duration) -> bool {
        if self.shared.owner.is_current() {
            panic!("wait_all_done must not be called on the owner context");
        }
        let deadline = Instant::now() + timeout;
        let mut q = self.shared.queues.lock().unwrap();
        while !q.all_done() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .shared
                .drained
                .wait_timeout(q, deadline - now)
                .unwrap();
            q = guard;
        }
        true
    }
}

impl Shared {
    pub(crate) fn next_task_id(&self) -> u64 {
        self.next_task_id.fetch_add(1, Ordering::Relaxed)
    }

    fn publish_progress(&self, total: f32) {
        let listener = self.progress_listener.read().unwrap().clone();
        if let Some(listener) = listener {
            listener(total);
        }
    }

    fn publish_done(shared: &Arc<Shared>, cancelled: bool) {
        let listener = shared.done_listener.read().unwrap().clone();
        if let Some(listener) = listener {
            let runner = Runner {
                shared: Arc::clone(shared),
            };
            listener(&runner, cancelled);
        }
    }

    /// Terminal bookkeeping for one task. Owner context only.
    pub(crate) fn on_task_finished(
        shared: &Arc<Shared>,
        task_id: u64,
        weight: f32,
        was_cancelled: bool,
    ) {
        shared.owner.assert_current("task completion bookkeeping");
        tracing::trace!(task = task_id, was_cancelled, "task finished");

        // Completed weight counts toward the aggregate outside the queue
        // lock, and only while the runner is not in a cancelled state.
        if !shared.cancelled.load(Ordering::Acquire) {
            let total = shared.progress.add(weight);
            shared.publish_progress(total);
        }

        let drained = {
            let mut q = shared.queues.lock().unwrap();
            q.run.retain(|t| t.id() != task_id);
            assert!(
                q.run.len() < shared.max_concurrent,
                "run set exceeded concurrency bound"
            );
            // Backfill the freed slot before releasing the lock so the run
            // set stays saturated.
            if let Some(next) = q.ready.pop_front() {
                let running = next.start(shared);
                q.run.push(running);
            }
            q.all_done()
        };

        if drained {
            let cancelled = shared.cancelled.load(Ordering::Acquire);
            tracing::debug!(cancelled, "all jobs drained");
            // Done fires outside the lock: a listener may submit a fresh
            // batch, which takes the lock again.
            Shared::publish_done(shared, cancelled);
            shared.drained.notify_all();
        }
    }
}
