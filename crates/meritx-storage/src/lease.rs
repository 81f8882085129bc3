use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use meritx_core::{MeritxError, Order, OrderId, OrderStatus, UserId};

use crate::db::{storage_err, Db, PgTx};
use crate::orders::order_from_row;

impl Db {
    /// Lease up to `limit` unresolved orders, oldest first, under
    /// `FOR UPDATE SKIP LOCKED`: rows already leased by a concurrent
    /// reconciler are skipped, so two pollers never see the same order.
    /// The row locks are held until `tx` ends.
    pub async fn select_for_polling(
        &self,
        tx: &mut PgTx,
        limit: i64,
    ) -> Result<Vec<Order>, MeritxError> {
        self.guard(async {
            let rows: Vec<(OrderId, UserId, String, String, Decimal, DateTime<Utc>)> =
                sqlx::query_as(
                    "SELECT id, user_id, number, status, accrual, uploaded_at \
                     FROM orders \
                     WHERE status IN ('NEW', 'PROCESSING') \
                     ORDER BY uploaded_at \
                     FOR UPDATE SKIP LOCKED \
                     LIMIT $1",
                )
                .bind(limit)
                .fetch_all(&mut **tx)
                .await
                .map_err(storage_err)?;

            rows.into_iter().map(order_from_row).collect()
        })
        .await
    }

    /// Transition the given orders from `NEW` to `PROCESSING`. Orders
    /// already past `NEW` are left untouched; idempotent for any subset.
    pub async fn mark_processing(&self, tx: &mut PgTx, ids: &[OrderId]) -> Result<(), MeritxError> {
        if ids.is_empty() {
            return Ok(());
        }

        self.guard(async {
            sqlx::query(
                "UPDATE orders SET status = 'PROCESSING' WHERE id = ANY($1) AND status = 'NEW'",
            )
            .bind(ids)
            .execute(&mut **tx)
            .await
            .map_err(storage_err)?;

            Ok(())
        })
        .await
    }

    /// Write the status resolved from the accrual system; a terminal
    /// `PROCESSED` carries the awarded points in the same statement.
    /// Matching no row surfaces as [`MeritxError::OrderNotFound`].
    pub async fn update_order_status(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Option<Decimal>,
    ) -> Result<(), MeritxError> {
        self.guard(async {
            let result = match accrual {
                Some(accrual) => {
                    sqlx::query("UPDATE orders SET status = $1, accrual = $2 WHERE number = $3")
                        .bind(status.as_str())
                        .bind(accrual)
                        .bind(number)
                        .execute(&self.pool)
                        .await
                }
                None => {
                    sqlx::query("UPDATE orders SET status = $1 WHERE number = $2")
                        .bind(status.as_str())
                        .bind(number)
                        .execute(&self.pool)
                        .await
                }
            }
            .map_err(storage_err)?;

            if result.rows_affected() == 0 {
                return Err(MeritxError::OrderNotFound);
            }
            Ok(())
        })
        .await
    }
}
