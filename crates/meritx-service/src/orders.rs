use meritx_core::{MeritxError, Order, UserId};
use meritx_storage::Db;

/// Order intake rules.
#[derive(Clone)]
pub struct OrdersService {
    db: Db,
}

impl OrdersService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Attempt to record `number` for `user_id`.
    ///
    /// A unique-index conflict is disambiguated by reading the existing
    /// row's owner: the same user re-uploading is reported as
    /// [`MeritxError::AlreadyUploadedBySameUser`], anyone else's number as
    /// [`MeritxError::BelongsToAnotherUser`]. The owner read need not be
    /// atomic with the failed insert: ownership never changes once set, so
    /// the answer is authoritative either way.
    pub async fn load(&self, user_id: UserId, number: &str) -> Result<(), MeritxError> {
        match self.db.insert_order(user_id, number).await {
            Ok(()) => Ok(()),
            Err(MeritxError::OrderExists) => {
                let owner = self.db.order_owner(number).await?;
                if owner == user_id {
                    Err(MeritxError::AlreadyUploadedBySameUser)
                } else {
                    Err(MeritxError::BelongsToAnotherUser)
                }
            }
            Err(e) => Err(e),
        }
    }

    /// The user's uploads, newest first.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Order>, MeritxError> {
        self.db.orders_for_user(user_id).await
    }
}
