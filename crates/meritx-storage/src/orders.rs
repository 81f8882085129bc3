use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use meritx_core::{MeritxError, Order, OrderId, OrderStatus, UserId};

use crate::db::{is_unique_violation, storage_err, Db};

type OrderRow = (OrderId, UserId, String, String, Decimal, DateTime<Utc>);

pub(crate) fn order_from_row(row: OrderRow) -> Result<Order, MeritxError> {
    let (id, user_id, number, status, accrual, uploaded_at) = row;
    let status: OrderStatus = status.parse().map_err(MeritxError::Storage)?;
    Ok(Order {
        id,
        user_id,
        number,
        status,
        accrual,
        uploaded_at,
    })
}

impl Db {
    /// Insert a freshly uploaded order in status `NEW`. A duplicate number
    /// surfaces as [`MeritxError::OrderExists`], whoever owns it.
    pub async fn insert_order(&self, user_id: UserId, number: &str) -> Result<(), MeritxError> {
        self.guard(async {
            sqlx::query("INSERT INTO orders (user_id, number) VALUES ($1, $2)")
                .bind(user_id)
                .bind(number)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        MeritxError::OrderExists
                    } else {
                        storage_err(e)
                    }
                })?;
            Ok(())
        })
        .await
    }

    /// Owner lookup used to disambiguate a duplicate upload. Ownership is
    /// stable once set, so the answer is authoritative even when read after
    /// the failed insert rather than atomically with it.
    pub async fn order_owner(&self, number: &str) -> Result<UserId, MeritxError> {
        self.guard(async {
            let owner: Option<UserId> =
                sqlx::query_scalar("SELECT user_id FROM orders WHERE number = $1")
                    .bind(number)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(storage_err)?;
            owner.ok_or(MeritxError::OrderNotFound)
        })
        .await
    }

    pub async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, MeritxError> {
        self.guard(async {
            let rows: Vec<OrderRow> = sqlx::query_as(
                "SELECT id, user_id, number, status, accrual, uploaded_at \
                 FROM orders \
                 WHERE user_id = $1 \
                 ORDER BY uploaded_at DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

            rows.into_iter().map(order_from_row).collect()
        })
        .await
    }
}
