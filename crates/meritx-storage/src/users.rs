use chrono::{DateTime, Utc};

use meritx_core::{MeritxError, User, UserId};

use crate::db::{storage_err, Db};

impl Db {
    /// Insert-or-nothing user creation. A conflicting login surfaces as
    /// [`MeritxError::UserAlreadyExists`] without raising a database error.
    pub async fn create_user(
        &self,
        login: &str,
        password_hash: &str,
    ) -> Result<UserId, MeritxError> {
        self.guard(async {
            let id: Option<UserId> = sqlx::query_scalar(
                "INSERT INTO users (login, password_hash) \
                 VALUES ($1, $2) \
                 ON CONFLICT (login) DO NOTHING \
                 RETURNING id",
            )
            .bind(login)
            .bind(password_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

            id.ok_or(MeritxError::UserAlreadyExists)
        })
        .await
    }

    pub async fn user_by_login(&self, login: &str) -> Result<User, MeritxError> {
        self.guard(async {
            let row: Option<(UserId, String, String, DateTime<Utc>)> = sqlx::query_as(
                "SELECT id, login, password_hash, created_at FROM users WHERE login = $1",
            )
            .bind(login)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

            let (id, login, password_hash, created_at) = row.ok_or(MeritxError::UserNotFound)?;
            Ok(User {
                id,
                login,
                password_hash,
                created_at,
            })
        })
        .await
    }
}
