use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use meritx_core::MeritxError;

type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Fixed-size task executor sized by the configured rate limit.
///
/// `rate_limit` workers drain a channel of the same capacity, so at most
/// `rate_limit` tasks run concurrently and a full queue blocks the
/// submitter, which is the backpressure the poller relies on. A
/// non-positive limit is clamped to one worker.
pub struct WorkerPool {
    queue: mpsc::Sender<Task>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(rate_limit: usize) -> Self {
        let size = rate_limit.max(1);
        let (queue, rx) = mpsc::channel::<Task>(size);
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..size)
            .map(|_| {
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    loop {
                        // Hold the receiver lock only while waiting for the
                        // next task, never while running one.
                        let task = { rx.lock().await.recv().await };
                        match task {
                            Some(task) => task.await,
                            None => break,
                        }
                    }
                })
            })
            .collect();

        Self { queue, workers }
    }

    /// Enqueue a unit of work. Blocks while the queue is full; fails only
    /// after [`WorkerPool::stop`] has closed the channel.
    pub async fn submit<F>(&self, task: F) -> Result<(), MeritxError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.queue
            .send(Box::pin(task))
            .await
            .map_err(|_| MeritxError::Internal("worker pool is stopped".into()))
    }

    /// Close the queue and wait for the workers to drain every queued task.
    pub async fn stop(self) {
        drop(self.queue);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}
