//! Owner context: a dedicated thread draining a single-consumer closure queue.
//!
//! All scheduler lifecycle callbacks (pre-run, post-run, cancelled, progress,
//! done) are funneled onto one owner thread so listeners never need their own
//! locking. Methods that are restricted to the owner context enforce it with
//! `assert_current`; running them elsewhere is a bug, not a recoverable error.

use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::mpsc::{self, UnboundedSender};

type Thunk = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Thunk),
    Stop,
}

/// The owner thread itself. Dropping it stops the loop and joins the thread;
/// closures still queued at that point are discarded.
pub struct Owner {
    handle: OwnerHandle,
    join: Option<JoinHandle<()>>,
}

/// Cheap clonable handle for posting closures onto the owner thread.
#[derive(Clone)]
pub struct OwnerHandle {
    tx: UnboundedSender<Message>,
    thread_id: ThreadId,
}

impl Owner {
    /// Spawns the owner thread with the given name.
    pub fn spawn(name: &str) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Some(msg) = rx.blocking_recv() {
                    match msg {
                        Message::Run(f) => f(),
                        Message::Stop => break,
                    }
                }
            })
            .expect("spawn owner thread");
        let thread_id = join.thread().id();
        Self {
            handle: OwnerHandle { tx, thread_id },
            join: Some(join),
        }
    }

    pub fn handle(&self) -> OwnerHandle {
        self.handle.clone()
    }
}

impl Drop for Owner {
    fn drop(&mut self) {
        let _ = self.handle.tx.send(Message::Stop);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl OwnerHandle {
    /// Queues `f` to run on the owner thread. Posting after the owner stopped
    /// is a silent no-op, like posting to a dead message loop.
    pub fn post(&self, f: impl FnOnce() + Send + 'static) {
        let _ = self.tx.send(Message::Run(Box::new(f)));
    }

    /// Runs `f` inline when already on the owner thread, otherwise posts it.
    pub fn post_or_run(&self, f: impl FnOnce() + Send + 'static) {
        if self.is_current() {
            f();
        } else {
            self.post(f);
        }
    }

    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Panics unless called on the owner thread. `what` names the operation
    /// for the fault message.
    pub fn assert_current(&self, what: &str) {
        if !self.is_current() {
            panic!("{} must run on the owner context", what);
        }
    }
}
