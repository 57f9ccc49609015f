// src/queue.rs

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Semaphore};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Cooperative cancellation flag shared between a [`TaskHandle`] and
/// the operation it controls. Operations check it before each network
/// step; an in-flight call is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A FIFO queue executing submitted operations with bounded concurrency.
///
/// This is an explicit scheduler object: callers hold a reference (or
/// clone, it is cheap) rather than reaching for process-wide state, and
/// every submission returns its own [`TaskHandle`] to await. Waiting on
/// one task therefore never blocks on unrelated queued work.
///
/// Operations start in submission order; up to `concurrency` of them
/// run at once. Dropping the queue stops intake but lets already
/// accepted operations finish.
#[derive(Debug, Clone)]
pub struct OperationQueue {
    name: String,
    sender: mpsc::UnboundedSender<Job>,
}

impl OperationQueue {
    /// Creates a named queue. Must be called within a tokio runtime;
    /// the dispatcher is spawned onto it.
    pub fn new(name: impl Into<String>, concurrency: usize) -> Self {
        let name = name.into();
        let concurrency = concurrency.max(1);
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let semaphore = Arc::new(Semaphore::new(concurrency));

        let dispatcher_name = name.clone();
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                tokio::spawn(async move {
                    job.await;
                    drop(permit);
                });
            }
            log::debug!("Operation queue {} drained and closed", dispatcher_name);
        });

        log::info!("Created {} operation queue", name);
        Self { name, sender }
    }

    /// The queue used for Parse server operations, with platform-chosen
    /// parallelism.
    pub fn parse_queue() -> Self {
        let concurrency = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::new("ParseOperationsQueue", concurrency)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueues an operation. The operation resolves to `Some(result)`
    /// to report, or `None` to terminate silently, as a cancelled task
    /// does.
    pub fn submit<R, F>(&self, operation: F) -> TaskHandle<R>
    where
        R: Send + 'static,
        F: Future<Output = Option<R>> + Send + 'static,
    {
        self.submit_with_cancellation(operation, CancellationFlag::new())
    }

    /// Enqueues an operation wired to the given cancellation flag; the
    /// returned handle's [`TaskHandle::cancel`] trips that flag.
    pub fn submit_with_cancellation<R, F>(
        &self,
        operation: F,
        cancellation: CancellationFlag,
    ) -> TaskHandle<R>
    where
        R: Send + 'static,
        F: Future<Output = Option<R>> + Send + 'static,
    {
        let (result_sender, result_receiver) = oneshot::channel();
        let job: Job = Box::pin(async move {
            if let Some(result) = operation.await {
                // Receiver may be gone; the operation already ran.
                let _ = result_sender.send(result);
            }
        });

        if self.sender.send(job).is_err() {
            log::warn!("Operation queue {} is closed, dropping submission", self.name);
        }

        TaskHandle {
            receiver: result_receiver,
            cancellation,
        }
    }
}

/// Per-task completion handle returned by [`OperationQueue::submit`].
///
/// Awaiting the handle is the synchronous-wait mode: it blocks only on
/// this task. `None` means the task terminated without reporting, which
/// only happens when it was cancelled.
#[derive(Debug)]
pub struct TaskHandle<R> {
    receiver: oneshot::Receiver<R>,
    cancellation: CancellationFlag,
}

impl<R> TaskHandle<R> {
    /// Requests cooperative cancellation. The operation stops at its
    /// next checkpoint and never invokes its completion callback.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Waits for the task to reach a terminal state.
    pub async fn wait(self) -> Option<R> {
        self.receiver.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn tasks_start_in_submission_order() {
        let queue = OperationQueue::new("test-fifo", 1);
        let started: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for index in 0..5u32 {
            let started = started.clone();
            handles.push(queue.submit(async move {
                started.lock().unwrap().push(index);
                Some(index)
            }));
        }

        for (index, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.wait().await, Some(index as u32));
        }
        assert_eq!(*started.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn cancelled_operation_reports_nothing() {
        let queue = OperationQueue::new("test-cancel", 1);
        let flag = CancellationFlag::new();
        let flag_inside = flag.clone();

        let handle = queue.submit_with_cancellation(
            async move {
                if flag_inside.is_cancelled() {
                    return None;
                }
                Some(42)
            },
            flag,
        );

        handle.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(handle.wait().await, None);
    }

    #[tokio::test]
    async fn waiting_on_one_task_does_not_require_queue_drain() {
        let queue = OperationQueue::new("test-no-drain", 2);

        // A slow unrelated task keeps running while we wait on the fast one.
        let _slow = queue.submit(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Some(())
        });
        let fast = queue.submit(async { Some(7) });

        let result = tokio::time::timeout(Duration::from_secs(5), fast.wait())
            .await
            .expect("fast task should complete while slow task sleeps");
        assert_eq!(result, Some(7));
    }
}
