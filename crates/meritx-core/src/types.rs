//! Core domain types for the meritx loyalty-points service.
//!
//! This module defines the records persisted by the storage layer and the
//! request/response bodies exchanged over the HTTP boundary:
//! - [`User`] — a registered customer account
//! - [`Order`] — an uploaded purchase order number and its accrual lifecycle
//! - [`OrderStatus`] — the order state machine (`NEW` → `PROCESSING` → terminal)
//! - [`Withdrawal`] — an append-only debit against a user's point balance
//! - [`Balance`] — the derived `{current, withdrawn}` pair
//! - Request bodies: [`Credentials`], [`WithdrawRequest`]
//!
//! Monetary amounts are [`Decimal`] with two fractional digits and are
//! encoded as JSON numbers. Timestamps are UTC and encoded as RFC 3339.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type OrderId = i64;

// ── User ─────────────────────────────────────────────────────────────────────

/// A registered customer account. Immutable after creation; never deleted.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub login: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Login/password pair accepted by `register` and `login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

// ── Orders ───────────────────────────────────────────────────────────────────

/// Lifecycle of an uploaded order.
///
/// `New` and `Processing` are non-terminal; `Invalid` and `Processed` are
/// terminal. The only permitted transitions are `New → Processing`,
/// `New → {Invalid, Processed}` and `Processing → {Invalid, Processed}`
/// (plus the no-op `Processing → Processing` rewrite).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "INVALID" => Ok(OrderStatus::Invalid),
            "PROCESSED" => Ok(OrderStatus::Processed),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// An uploaded order number. `accrual` stays zero until the order reaches
/// `PROCESSED`; the zero value is omitted from JSON.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    #[serde(skip_serializing)]
    pub id: OrderId,
    #[serde(skip_serializing)]
    pub user_id: UserId,
    pub number: String,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Decimal::is_zero")]
    pub accrual: Decimal,
    pub uploaded_at: DateTime<Utc>,
}

// ── Balance / withdrawals ────────────────────────────────────────────────────

/// Derived per-user balance. Never materialised; recomputed from the orders
/// and withdrawals tables on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub current: Decimal,
    pub withdrawn: Decimal,
}

/// A committed debit. Append-only; `order_number` need not exist in the
/// orders table, since any Luhn-valid number is an acceptable debit target.
#[derive(Debug, Clone, Serialize)]
pub struct Withdrawal {
    #[serde(rename = "order")]
    pub order_number: String,
    pub sum: Decimal,
    pub processed_at: DateTime<Utc>,
}

/// Body of `POST /api/user/balance/withdraw`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub order: String,
    pub sum: Decimal,
}
