//! The accrual reconciliation flow.
//!
//! An independent background pipeline keeps order state aligned with the
//! external accrual system:
//!   1. [`Poller`] ticks on a fixed interval and submits polls, backing off
//!      when the upstream signals `Retry-After`
//!   2. [`WorkerPool`] bounds how many polls run concurrently
//!   3. [`Reconciler`] leases a batch of unresolved orders under a
//!      skip-locked row lease, asks the upstream about each one, and writes
//!      the resolved status back
//!   4. [`AccrualClient`] performs the single upstream HTTP call and
//!      translates transport outcomes into [`AccrualOutcome`]
//!
//! The ingress HTTP flow and this pipeline share only the database;
//! coordination is row locks and transactions, never shared memory.

mod client;
mod pool;
mod poller;
mod reconcile;

pub use client::{AccrualApi, AccrualClient, AccrualOutcome, AccrualReply, AccrualStatus};
pub use pool::WorkerPool;
pub use poller::{PollHandler, Poller};
pub use reconcile::{PollOutcome, Reconciler};
