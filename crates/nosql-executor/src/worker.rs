//! A dedicated single-threaded worker for background table-limit refresh.
//!
//! The execution engine must issue at most one `GetTable` per table at a
//! time (single-flight), and refresh work must never compete with the
//! caller's own task for CPU in a way that causes refreshes to queue behind
//! unrelated request processing. A `tokio::runtime::Builder::new_current_thread`
//! runtime, driven from its own OS thread and reached through a bounded
//! channel, gives both: exactly one thread runs refresh tasks, and a full
//! channel means "reject this submission" rather than blocking the caller.

use std::future::Future;
use std::pin::Pin;
use std::thread;
use tokio::sync::mpsc;

type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Returned by [`RefreshWorker::try_submit`] when the task queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueRejected;

impl std::fmt::Display for QueueRejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "refresh worker queue is full")
    }
}

impl std::error::Error for QueueRejected {}

/// A single background thread driving its own current-thread runtime.
///
/// Dropping the worker stops accepting new tasks; in-flight tasks are
/// allowed to finish because the background thread is only joined when the
/// sender side is fully dropped and the channel drains.
pub struct RefreshWorker {
    tx: mpsc::Sender<BoxedTask>,
    _thread: Option<thread::JoinHandle<()>>,
}

impl RefreshWorker {
    /// Spawns the dedicated thread and its current-thread runtime.
    ///
    /// `capacity` bounds how many refresh tasks may be queued before
    /// [`try_submit`](Self::try_submit) starts rejecting.
    pub fn new(capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<BoxedTask>(capacity.max(1));

        let thread = thread::Builder::new()
            .name("nosql-limiter-refresh".into())
            .spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                    .expect("failed to build refresh worker runtime");

                rt.block_on(async move {
                    while let Some(task) = rx.recv().await {
                        task.await;
                    }
                });
            })
            .expect("failed to spawn refresh worker thread");

        Self {
            tx,
            _thread: Some(thread),
        }
    }

    /// Submits a task. Returns `Err(QueueRejected)` immediately if the
    /// channel is full rather than waiting for room, matching the "mark the
    /// table as needing refresh again" fallback in the engine.
    pub fn try_submit<F>(&self, task: F) -> Result<(), QueueRejected>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tx.try_send(Box::pin(task)).map_err(|_| QueueRejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn submitted_task_runs_on_its_own_thread() {
        let worker = RefreshWorker::new(4);
        let this_thread = thread::current().id();
        let (tx, rx) = tokio::sync::oneshot::channel();

        worker
            .try_submit(async move {
                let _ = tx.send(thread::current().id());
            })
            .unwrap();

        let ran_on = rx.await.unwrap();
        assert_ne!(ran_on, this_thread);
    }

    #[tokio::test]
    async fn tasks_run_single_flight_in_submission_order() {
        let worker = RefreshWorker::new(8);
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut waiters = Vec::new();

        for i in 0..5 {
            let order = Arc::clone(&order);
            let (done_tx, done_rx) = tokio::sync::oneshot::channel();
            waiters.push(done_rx);
            worker
                .try_submit(async move {
                    order.lock().unwrap().push(i);
                    let _ = done_tx.send(());
                })
                .unwrap();
        }

        for w in waiters {
            w.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn full_queue_is_rejected_not_blocked() {
        let worker = RefreshWorker::new(1);
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let release_rx = Arc::new(tokio::sync::Mutex::new(Some(release_rx)));

        // Occupy the single worker thread so the channel backs up.
        worker
            .try_submit(async move {
                let rx = release_rx.lock().await.take().unwrap();
                let _ = rx.await;
            })
            .unwrap();

        // Give the blocking task a moment to actually start running.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let filled = Arc::new(AtomicUsize::new(0));
        let f1 = Arc::clone(&filled);
        worker.try_submit(async move { f1.fetch_add(1, Ordering::SeqCst); }).unwrap();

        let rejected = worker.try_submit(async {});
        assert_eq!(rejected, Err(QueueRejected));

        let _ = release_tx.send(());
    }
}
