use thiserror::Error;

/// The error taxonomy carried end-to-end through every crate.
///
/// Variants are tagged domain outcomes, not stringly-typed failures: the
/// HTTP boundary translates each one to a status code, and the services
/// branch on them to implement protocol rules (the intake conflict
/// disambiguation, the withdrawal funds check).
#[derive(Debug, Error)]
pub enum MeritxError {
    // ── Cancellation / deadlines ─────────────────────────────────────────────
    #[error("operation cancelled")]
    Cancelled,

    #[error("dependency deadline exceeded")]
    DeadlineExceeded,

    // ── Request validation ───────────────────────────────────────────────────
    #[error("bad request input: {0}")]
    BadInput(String),

    #[error("order number failed the Luhn check")]
    LuhnInvalid,

    // ── Authentication ───────────────────────────────────────────────────────
    #[error("missing or invalid access token")]
    Unauthorized,

    #[error("user with this login already exists")]
    UserAlreadyExists,

    #[error("user not found")]
    UserNotFound,

    #[error("invalid credentials")]
    InvalidCredentials,

    // ── Order intake ─────────────────────────────────────────────────────────
    /// Raw unique-index outcome from the storage layer. The orders service
    /// refines it into one of the two ownership variants below.
    #[error("order number already exists")]
    OrderExists,

    #[error("order not found")]
    OrderNotFound,

    #[error("order already uploaded by this user")]
    AlreadyUploadedBySameUser,

    #[error("order belongs to another user")]
    BelongsToAnotherUser,

    // ── Balance ──────────────────────────────────────────────────────────────
    #[error("insufficient balance")]
    PaymentRequired,

    #[error("withdrawal with this order number already exists")]
    WithdrawalOrderExists,

    // ── Infrastructure ───────────────────────────────────────────────────────
    #[error("storage error: {0}")]
    Storage(String),

    #[error("accrual system error: {0}")]
    Accrual(String),

    #[error("internal error: {0}")]
    Internal(String),
}
