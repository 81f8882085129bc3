use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use meritx_core::{MeritxError, OrderStatus};
use meritx_storage::Db;

use crate::client::{AccrualApi, AccrualOutcome, AccrualReply, AccrualStatus};
use crate::poller::PollHandler;

const DEFAULT_BATCH_SIZE: i64 = 10;

/// Result of one reconciliation poll.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollOutcome {
    /// Orders whose status was successfully written this poll.
    pub processed: usize,
    /// Upstream backoff request; zero when the upstream imposed none.
    pub retry_after: Duration,
}

/// The central state machine: aligns internal order state with the accrual
/// system, one leased batch at a time.
pub struct Reconciler<C> {
    client: C,
    db: Db,
    batch_size: i64,
}

impl<C: AccrualApi> Reconciler<C> {
    pub fn new(client: C, db: Db, batch_size: i64) -> Self {
        let batch_size = if batch_size > 0 {
            batch_size
        } else {
            DEFAULT_BATCH_SIZE
        };
        Self {
            client,
            db,
            batch_size,
        }
    }

    /// Run one poll.
    ///
    /// Phase A leases up to `batch_size` unresolved orders under the
    /// skip-locked select, transitions the `NEW` ones to `PROCESSING`, and
    /// commits eagerly, so that a crash between phases leaves every order
    /// safely re-leasable. Phase B resolves each leased order against the
    /// upstream; per-order failures are logged and retried on a later poll,
    /// while a 429 stops the batch immediately and surfaces the requested
    /// backoff to the driver.
    pub async fn poll_and_update(
        &self,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, MeritxError> {
        // ── Phase A: lease ───────────────────────────────────────────────────
        let mut tx = self.db.begin().await?;
        let batch = self.db.select_for_polling(&mut tx, self.batch_size).await?;
        if batch.is_empty() {
            self.db.commit(tx).await?;
            return Ok(PollOutcome::default());
        }

        let fresh: Vec<_> = batch
            .iter()
            .filter(|order| order.status == OrderStatus::New)
            .map(|order| order.id)
            .collect();
        self.db.mark_processing(&mut tx, &fresh).await?;
        self.db.commit(tx).await?;

        // ── Phase B: resolve ─────────────────────────────────────────────────
        let mut processed = 0;
        for order in &batch {
            // Cancellation interrupts even an in-flight upstream call.
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(MeritxError::Cancelled),
                res = self.client.get_order(&order.number) => res,
            };

            let reply = match fetched {
                Ok(AccrualOutcome::Received(reply)) => reply,
                Ok(AccrualOutcome::NotRegistered) => {
                    debug!(order = %order.number, "order not registered upstream yet");
                    continue;
                }
                Ok(AccrualOutcome::RateLimited(retry_after)) => {
                    return Ok(PollOutcome {
                        processed,
                        retry_after,
                    });
                }
                Err(e) => {
                    warn!(order = %order.number, error = %e, "accrual request failed");
                    continue;
                }
            };

            let Some((status, accrual)) = resolve_write(&reply) else {
                warn!(order = %order.number, "unexpected status from accrual system");
                continue;
            };
            match self.db.update_order_status(&order.number, status, accrual).await {
                Ok(()) => processed += 1,
                Err(e) => {
                    warn!(order = %order.number, status = %status, error = %e,
                          "failed to store accrual result");
                }
            }
        }

        Ok(PollOutcome {
            processed,
            retry_after: Duration::ZERO,
        })
    }
}

#[async_trait]
impl<C: AccrualApi + 'static> PollHandler for Reconciler<C> {
    async fn poll_and_update(&self, cancel: CancellationToken) -> Result<PollOutcome, MeritxError> {
        Reconciler::poll_and_update(self, &cancel).await
    }
}

/// Translate an upstream reply into the internal status write, if any.
/// `REGISTERED` and `PROCESSING` both keep the order in flight; the
/// `PROCESSING → PROCESSING` rewrite is a permitted no-op. Unknown statuses
/// produce no write.
fn resolve_write(reply: &AccrualReply) -> Option<(OrderStatus, Option<Decimal>)> {
    match reply.status {
        AccrualStatus::Registered | AccrualStatus::Processing => {
            Some((OrderStatus::Processing, None))
        }
        AccrualStatus::Invalid => Some((OrderStatus::Invalid, None)),
        AccrualStatus::Processed => Some((OrderStatus::Processed, Some(reply.accrual))),
        AccrualStatus::Unknown => None,
    }
}
