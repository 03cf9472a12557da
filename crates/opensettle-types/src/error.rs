//! Error types for the OpenSettle settlement broker.
//!
//! All errors use the `OS_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Withdrawal errors
//! - 2xx: Deposit errors
//! - 3xx: Assignment validation errors
//! - 4xx: Allocation lifecycle / concurrency errors
//! - 5xx: Reconciliation / external-system errors
//! - 9xx: General / internal errors

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    ActorRole, AllocationId, AllocationStatus, Asset, DepositId, DepositStatus, ReasonCode,
    WithdrawalId, WithdrawalStatus,
};

/// Central error enum for all OpenSettle operations.
#[derive(Debug, Error)]
pub enum SettleError {
    // =================================================================
    // Withdrawal Errors (1xx)
    // =================================================================
    /// The requested withdrawal was not found in the ledger store.
    #[error("OS_ERR_100: Withdrawal not found: {0}")]
    WithdrawalNotFound(WithdrawalId),

    /// The withdrawal is in a terminal status and cannot participate in
    /// new assignments.
    #[error("OS_ERR_101: Withdrawal {id} is {status}, no further assignment possible")]
    WithdrawalClosed {
        id: WithdrawalId,
        status: WithdrawalStatus,
    },

    // =================================================================
    // Deposit Errors (2xx)
    // =================================================================
    /// The requested deposit candidate was not found.
    #[error("OS_ERR_200: Deposit not found: {0}")]
    DepositNotFound(DepositId),

    /// The deposit candidate is in a terminal status.
    #[error("OS_ERR_201: Deposit {id} is {status}, not assignable")]
    DepositClosed {
        id: DepositId,
        status: DepositStatus,
    },

    /// The candidate's asset does not match the withdrawal's asset.
    #[error("OS_ERR_202: Asset mismatch: withdrawal is {expected}, candidate is {actual}")]
    AssetMismatch { expected: Asset, actual: Asset },

    /// The deposit candidate's own deadline has passed.
    #[error("OS_ERR_203: Deposit candidate expired: {0}")]
    DepositExpired(DepositId),

    // =================================================================
    // Assignment Validation Errors (3xx)
    // =================================================================
    /// The explicitly requested total exceeds the withdrawal's
    /// remaining-to-assign capacity. Nothing was committed.
    #[error("OS_ERR_300: Over-assignment: requested {requested}, remaining to assign {remaining}")]
    OverAssignment {
        requested: Decimal,
        remaining: Decimal,
    },

    /// A malformed amount (zero, negative, or exceeding a candidate's
    /// remaining capacity).
    #[error("OS_ERR_301: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// The assignment call would consume nothing (no candidates, or no
    /// candidate can supply a positive amount).
    #[error("OS_ERR_302: Assignment consumes nothing")]
    EmptyAssignment,

    /// The same candidate appears more than once in one call.
    #[error("OS_ERR_303: Duplicate candidate in assignment: {0}")]
    DuplicateCandidate(DepositId),

    // =================================================================
    // Allocation Lifecycle / Concurrency Errors (4xx)
    // =================================================================
    /// The requested allocation was not found.
    #[error("OS_ERR_400: Allocation not found: {0}")]
    AllocationNotFound(AllocationId),

    /// The transition is not permitted from the allocation's current
    /// status. The caller should re-fetch and re-evaluate.
    #[error("OS_ERR_401: Invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: AllocationId,
        from: AllocationStatus,
        to: AllocationStatus,
    },

    /// A concurrent writer won the race; the caller's read is stale.
    #[error("OS_ERR_402: Stale version on {entity}: expected {expected}, actual {actual}")]
    StaleVersion {
        entity: &'static str,
        expected: u64,
        actual: u64,
    },

    /// The allocation passed its deadline between the caller's read and
    /// this write; it is now EXPIRED.
    #[error("OS_ERR_403: Allocation expired: {0}")]
    AllocationExpired(AllocationId),

    /// The actor's role does not permit the attempted action.
    #[error("OS_ERR_404: {role} may not {action}: {reason}")]
    NotPermitted {
        role: ActorRole,
        action: &'static str,
        reason: ReasonCode,
    },

    // =================================================================
    // Reconciliation / External-System Errors (5xx)
    // =================================================================
    /// The external accounting system returned an error.
    #[error("OS_ERR_500: External accounting system error: {reason}")]
    ExternalSystem { reason: String },

    /// The external accounting system stayed unreachable through the
    /// bounded retry schedule.
    #[error("OS_ERR_501: External accounting system unreachable after {attempts} attempts")]
    ExternalUnavailable { attempts: u32 },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("OS_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("OS_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config values, missing fields, etc.).
    #[error("OS_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, SettleError>;

/// Coarse error classification, matching the recovery semantics callers
/// care about: validation errors are fixed by adjusting input, conflicts
/// by re-fetching and retrying, external errors by waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    External,
    Internal,
}

impl SettleError {
    /// Classify this error into the recovery taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WithdrawalNotFound(_) | Self::DepositNotFound(_) | Self::AllocationNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::WithdrawalClosed { .. }
            | Self::DepositClosed { .. }
            | Self::AssetMismatch { .. }
            | Self::DepositExpired(_)
            | Self::OverAssignment { .. }
            | Self::InvalidAmount { .. }
            | Self::EmptyAssignment
            | Self::DuplicateCandidate(_)
            | Self::NotPermitted { .. } => ErrorKind::Validation,
            Self::InvalidTransition { .. }
            | Self::StaleVersion { .. }
            | Self::AllocationExpired(_) => ErrorKind::Conflict,
            Self::ExternalSystem { .. } | Self::ExternalUnavailable { .. } => ErrorKind::External,
            Self::Internal(_) | Self::Serialization(_) | Self::Configuration(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether re-fetching current state and retrying can succeed.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}
