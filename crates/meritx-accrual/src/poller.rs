use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use meritx_core::MeritxError;

use crate::pool::WorkerPool;
use crate::reconcile::PollOutcome;

/// Seam between the driver and the reconciliation service. The driver only
/// needs the single entry point, which also gives the tests a place to
/// script upstream behaviour without a database.
#[async_trait]
pub trait PollHandler: Send + Sync + 'static {
    async fn poll_and_update(&self, cancel: CancellationToken) -> Result<PollOutcome, MeritxError>;
}

/// Periodic driver for the reconciliation service.
///
/// Ticks every `interval` and submits one poll to the worker pool per tick,
/// except while `sleep_until` lies in the future: the backoff window set
/// whenever a poll reports a `Retry-After` from the upstream. The ticker
/// loop and the pooled worker both touch `sleep_until`, hence the mutex.
pub struct Poller {
    interval: Duration,
    sleep_until: Mutex<Option<Instant>>,
}

impl Poller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            sleep_until: Mutex::new(None),
        }
    }

    fn backing_off(&self) -> bool {
        let gate = self.sleep_until.lock().unwrap_or_else(|e| e.into_inner());
        matches!(*gate, Some(until) if Instant::now() < until)
    }

    fn back_off_for(&self, delay: Duration) {
        let mut gate = self.sleep_until.lock().unwrap_or_else(|e| e.into_inner());
        *gate = Some(Instant::now() + delay);
    }

    /// Drive polls until `cancel` fires. Submission blocks when every worker
    /// is busy, so a slow reconciler paces the ticker instead of piling up
    /// queued polls.
    pub async fn run<P: PollHandler>(
        self: Arc<Self>,
        handler: Arc<P>,
        pool: &WorkerPool,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval = ?self.interval, "accrual poller started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if self.backing_off() {
                continue;
            }

            let driver = Arc::clone(&self);
            let handler = Arc::clone(&handler);
            let poll_cancel = cancel.clone();
            let submitted = pool
                .submit(async move {
                    match handler.poll_and_update(poll_cancel).await {
                        Ok(outcome) if outcome.retry_after > Duration::ZERO => {
                            driver.back_off_for(outcome.retry_after);
                            info!(retry_after = ?outcome.retry_after,
                                  "accrual system requested backoff");
                        }
                        Ok(outcome) => {
                            if outcome.processed > 0 {
                                debug!(processed = outcome.processed, "orders reconciled");
                            }
                        }
                        Err(MeritxError::Cancelled) => {}
                        Err(e) => warn!(error = %e, "accrual poll failed"),
                    }
                })
                .await;
            if submitted.is_err() {
                break;
            }
        }

        info!("accrual poller stopped");
    }
}
