use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use meritx_core::{Balance, MeritxError, UserId, Withdrawal};

use crate::db::{is_unique_violation, storage_err, Db, PgTx};

const BALANCE_SQL: &str = "\
    WITH o AS ( \
        SELECT COALESCE(SUM(accrual), 0) AS total_accrual \
        FROM orders \
        WHERE user_id = $1 AND status = 'PROCESSED' \
    ), w AS ( \
        SELECT COALESCE(SUM(sum), 0) AS total_withdrawn \
        FROM withdrawals \
        WHERE user_id = $1 \
    ) \
    SELECT o.total_accrual - w.total_withdrawn AS current, \
           w.total_withdrawn AS withdrawn \
    FROM o, w";

impl Db {
    /// Single-query balance derivation: accrued points on `PROCESSED`
    /// orders minus every committed withdrawal.
    pub async fn balance(&self, user_id: UserId) -> Result<Balance, MeritxError> {
        self.guard(async {
            let (current, withdrawn): (Decimal, Decimal) = sqlx::query_as(BALANCE_SQL)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(storage_err)?;
            Ok(Balance { current, withdrawn })
        })
        .await
    }

    /// Commit one withdrawal inside `tx`.
    ///
    /// The transaction-scoped advisory lock serialises all withdrawals for a
    /// single user, so the balance re-read below cannot be raced by another
    /// debit for the same user: no committed state ever leaves a negative
    /// available balance.
    pub async fn commit_withdrawal(
        &self,
        tx: &mut PgTx,
        user_id: UserId,
        order_number: &str,
        sum: Decimal,
    ) -> Result<(), MeritxError> {
        self.guard(async {
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(user_id)
                .execute(&mut **tx)
                .await
                .map_err(storage_err)?;

            let (current, _): (Decimal, Decimal) = sqlx::query_as(BALANCE_SQL)
                .bind(user_id)
                .fetch_one(&mut **tx)
                .await
                .map_err(storage_err)?;
            if current < sum {
                return Err(MeritxError::PaymentRequired);
            }

            sqlx::query("INSERT INTO withdrawals (user_id, order_number, sum) VALUES ($1, $2, $3)")
                .bind(user_id)
                .bind(order_number)
                .bind(sum)
                .execute(&mut **tx)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        MeritxError::WithdrawalOrderExists
                    } else {
                        storage_err(e)
                    }
                })?;

            Ok(())
        })
        .await
    }

    pub async fn withdrawals_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Withdrawal>, MeritxError> {
        self.guard(async {
            let rows: Vec<(String, Decimal, DateTime<Utc>)> = sqlx::query_as(
                "SELECT order_number, sum, processed_at \
                 FROM withdrawals \
                 WHERE user_id = $1 \
                 ORDER BY processed_at DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

            Ok(rows
                .into_iter()
                .map(|(order_number, sum, processed_at)| Withdrawal {
                    order_number,
                    sum,
                    processed_at,
                })
                .collect())
        })
        .await
    }
}
