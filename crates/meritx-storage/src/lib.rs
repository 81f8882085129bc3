//! Persistence layer: Postgres storage for users, orders and withdrawals.
//!
//! The [`Db`] handle is the sole mutator of the service's invariants (the
//! uniqueness constraints, the non-negative balance rule, and the order
//! status state machine), so every SQL predicate enforcing them lives here.
//! `mark_processing`, `select_for_polling` and `commit_withdrawal` run
//! inside a caller-supplied transaction; everything else is a
//! single-statement autocommit.

mod db;
mod lease;
mod orders;
mod users;
mod withdrawals;

pub use db::{Db, PgTx};
