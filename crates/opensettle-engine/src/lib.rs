//! # opensettle-engine
//!
//! The settlement engine: validated assignment of deposit candidates to
//! withdrawals, the allocation lifecycle state machine, time-based
//! expiry, and the [`SettlementService`] facade that operational layers
//! call.
//!
//! ## Architecture
//!
//! 1. [`AssignmentEngine`] plans an assignment as a pure function of the
//!    records it read, then commits the plan through the ledger store's
//!    all-or-nothing `apply_assignment`.
//! 2. [`LifecycleEngine`] advances one allocation at a time through the
//!    transition table, with explicit actor roles on every call.
//! 3. [`ExpiryMonitor`] sweeps lapsed allocations and backs the lazy
//!    expiry check the service runs before every read and transition.
//! 4. [`SettlementService`] composes the three over one [`LedgerStore`]
//!    and derives the permitted-action set onto everything it returns.
//!
//! [`LedgerStore`]: opensettle_ledger::LedgerStore

pub mod assign;
pub mod expiry;
pub mod lifecycle;
pub mod service;

pub use assign::{AssignmentEngine, AssignmentRequest, CandidateSelection, plan_assignment};
pub use expiry::ExpiryMonitor;
pub use lifecycle::LifecycleEngine;
pub use service::{AllocationView, SettlementService};
