//! # opensettle-reconcile
//!
//! The **Reconciliation Engine**: computes, per external-system account,
//! the difference between the internally tracked balance and the balance
//! the external accounting system reports, with a document-level audit
//! trail explaining the difference.
//!
//! Read-side and idempotent: rerunning a reconciliation never mutates
//! either ledger; the only state the engine keeps is its per-account
//! `last_synced_at` marker. The external fetch is the single piece of
//! network I/O in the workspace and is retried with bounded exponential
//! backoff; no ledger borrow is held across the await.

pub mod client;
pub mod engine;
pub mod retry;

pub use client::{AccountingSystem, InMemoryAccounting};
pub use engine::ReconciliationEngine;
pub use retry::RetryPolicy;
