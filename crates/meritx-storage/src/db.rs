use std::future::Future;
use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use meritx_core::MeritxError;

/// A transaction handle passed into the lease and withdrawal operations.
/// Rolls back on drop unless committed.
pub type PgTx = sqlx::Transaction<'static, Postgres>;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Shared Postgres handle. Cheap to clone; all clones use one pool and
/// observe the same cancellation scope.
#[derive(Clone)]
pub struct Db {
    pub(crate) pool: PgPool,
    cancel: CancellationToken,
}

impl Db {
    /// Connect to `uri`, apply the embedded migrations, and verify the
    /// connection with a ping. Called once at startup, before serving.
    ///
    /// Every later operation on the handle races against `cancel`: once the
    /// scope fires, in-flight and new queries resolve to
    /// [`MeritxError::Cancelled`].
    pub async fn connect(uri: &str, cancel: CancellationToken) -> Result<Self, MeritxError> {
        if uri.is_empty() {
            return Err(MeritxError::BadInput("database URI is not set".into()));
        }

        debug!("connecting to database");
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(10))
            .connect(uri)
            .await
            .map_err(storage_err)?;

        debug!("running database migrations");
        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| MeritxError::Storage(format!("migrations failed: {e}")))?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(storage_err)?;

        info!("database storage initialized");
        Ok(Self { pool, cancel })
    }

    /// Wrap an existing pool under a detached scope that never cancels.
    /// Used by tests that manage their own schema and lifetime.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            cancel: CancellationToken::new(),
        }
    }

    /// Race `op` against the process-wide cancellation scope, so that every
    /// in-flight database call returns an error once the scope fires.
    pub(crate) async fn guard<T>(
        &self,
        op: impl Future<Output = Result<T, MeritxError>>,
    ) -> Result<T, MeritxError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(MeritxError::Cancelled),
            res = op => res,
        }
    }

    pub async fn begin(&self) -> Result<PgTx, MeritxError> {
        self.guard(async { self.pool.begin().await.map_err(storage_err) })
            .await
    }

    pub async fn commit(&self, tx: PgTx) -> Result<(), MeritxError> {
        self.guard(async { tx.commit().await.map_err(storage_err) })
            .await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

pub(crate) fn storage_err(e: sqlx::Error) -> MeritxError {
    match e {
        sqlx::Error::PoolTimedOut => MeritxError::DeadlineExceeded,
        other => MeritxError::Storage(other.to_string()),
    }
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}
