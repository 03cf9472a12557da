//! # opensettle-types
//!
//! Shared types, errors, and configuration for the **OpenSettle**
//! peer-to-peer settlement broker.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`WithdrawalId`], [`DepositId`], [`AllocationId`], [`PartyId`], [`EntryId`], [`AccountRef`], [`PaymentCode`]
//! - **Withdrawal model**: [`WithdrawalRequest`], [`WithdrawalStatus`]
//! - **Deposit model**: [`DepositCandidate`], [`DepositStatus`]
//! - **Allocation model**: [`Allocation`], [`AllocationStatus`], [`PaymentProof`], [`TransitionTimestamps`]
//! - **Action model**: [`ActorRole`], [`AllocationActions`], [`ActionGate`], [`ReasonCode`], [`derive_actions`]
//! - **Journal model**: [`LedgerEntry`], [`LedgerEntryKind`], [`EntityRef`], [`EntityKind`]
//! - **Reconciliation model**: [`ExternalDocument`], [`DocumentStatus`], [`BalanceRecord`], [`ReconciliationReport`]
//! - **Configuration**: [`EngineConfig`], [`PageConfig`], [`RetryConfig`]
//! - **Errors**: [`SettleError`] with `OS_ERR_` prefix codes and [`ErrorKind`] classification

pub mod actions;
pub mod allocation;
pub mod config;
pub mod constants;
pub mod deposit;
pub mod destination;
pub mod error;
pub mod ids;
pub mod journal;
pub mod reconcile;
pub mod withdrawal;

// Re-export all primary types at crate root for ergonomic imports:
//   use opensettle_types::{Allocation, AllocationStatus, WithdrawalRequest, ...};

pub use actions::*;
pub use allocation::*;
pub use config::*;
pub use deposit::*;
pub use destination::*;
pub use error::*;
pub use ids::*;
pub use journal::*;
pub use reconcile::*;
pub use withdrawal::*;

// Constants are accessed via `opensettle_types::constants::FOO`
// (not re-exported to avoid name collisions).

/// Type alias for asset identifiers (e.g., "USD", "USDT", "EUR").
pub type Asset = String;
