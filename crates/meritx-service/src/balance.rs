use meritx_core::{Balance, MeritxError, UserId, WithdrawRequest, Withdrawal};
use meritx_storage::Db;

/// Balance reads and withdrawal commits.
#[derive(Clone)]
pub struct BalanceService {
    db: Db,
}

impl BalanceService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn balance(&self, user_id: UserId) -> Result<Balance, MeritxError> {
        self.db.balance(user_id).await
    }

    /// Debit `req.sum` against the user's balance. The storage commit takes
    /// a per-user advisory lock and re-reads the balance under it, so
    /// concurrent withdrawals for one user serialise and can never leave the
    /// available balance negative. On any failure the transaction rolls
    /// back and no state changes.
    pub async fn withdraw(&self, user_id: UserId, req: &WithdrawRequest) -> Result<(), MeritxError> {
        let mut tx = self.db.begin().await?;
        self.db
            .commit_withdrawal(&mut tx, user_id, &req.order, req.sum)
            .await?;
        self.db.commit(tx).await
    }

    /// The user's withdrawals, newest first.
    pub async fn withdrawals(&self, user_id: UserId) -> Result<Vec<Withdrawal>, MeritxError> {
        self.db.withdrawals_for_user(user_id).await
    }
}
