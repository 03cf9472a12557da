//! # opensettle-ledger
//!
//! The **Ledger Store**: durable-shaped storage for withdrawal requests,
//! deposit candidates, and allocations, plus the internal transaction
//! journal the reconciliation engine sums over.
//!
//! ## Concurrency model
//!
//! Every record carries a `version` counter. All mutation goes through
//! compare-and-swap writes: the caller passes back the version it read,
//! and a mismatch returns `OS_ERR_402` (stale version) without touching
//! anything. Semantic operations ([`LedgerStore::apply_assignment`],
//! [`LedgerStore::commit_transition`]) validate every precondition
//! against current state before the first write, so each call is
//! all-or-nothing.

pub mod filter;
pub mod journal;
pub mod store;

pub use filter::{AllocationFilter, DepositFilter, Page, Paged, WithdrawalFilter};
pub use journal::Journal;
pub use store::{AssignmentPlan, LedgerStore, PlannedConsumption, TransitionEffect};
