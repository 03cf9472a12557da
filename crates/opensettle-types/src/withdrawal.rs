//! Withdrawal-request model.
//!
//! A withdrawal request is a payer's obligation into the platform. Its
//! status is never stored — it is a pure function of the running totals
//! plus the explicit cancelled flag, so stored state can never drift from
//! the authoritative numbers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Asset, PartyId, PayoutDestination, WithdrawalId};

/// Derived lifecycle status of a withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WithdrawalStatus {
    /// Nothing assigned yet.
    Pending,
    /// Some, but not all, of the requested amount is assigned.
    PartiallyAssigned,
    /// The full requested amount is assigned to allocations.
    FullyAssigned,
    /// The full requested amount has settled.
    Settled,
    /// The request was withdrawn by its requester or an admin.
    Cancelled,
}

impl WithdrawalStatus {
    /// Terminal statuses accept no further assignment.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Settled | Self::Cancelled)
    }
}

impl std::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::PartiallyAssigned => write!(f, "PARTIALLY_ASSIGNED"),
            Self::FullyAssigned => write!(f, "FULLY_ASSIGNED"),
            Self::Settled => write!(f, "SETTLED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A payer's obligation to pay money into the platform.
///
/// Mutated only by the assignment engine (`assigned_amount` increments)
/// and the allocation lifecycle (`settled_amount` increments on
/// settlement, `assigned_amount` releases on cancellation/expiry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: WithdrawalId,
    /// The payer who owes this amount.
    pub payer: PartyId,
    pub asset: Asset,
    /// Total the payer owes. Immutable after creation.
    pub requested_amount: Decimal,
    /// Running total currently reserved by live allocations.
    pub assigned_amount: Decimal,
    /// Running total settled through finalized allocations.
    pub settled_amount: Decimal,
    /// Masked reference shown alongside this request.
    pub destination: PayoutDestination,
    /// Set by an explicit cancel; not derivable from the totals.
    pub cancelled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency counter, bumped on every committed write.
    pub version: u64,
}

impl WithdrawalRequest {
    /// Capacity still available for new allocations.
    #[must_use]
    pub fn remaining_to_assign(&self) -> Decimal {
        self.requested_amount - self.assigned_amount
    }

    /// Assigned capacity that has not yet settled.
    #[must_use]
    pub fn remaining_to_settle(&self) -> Decimal {
        self.assigned_amount - self.settled_amount
    }

    /// Status, derived from the totals and the cancelled flag.
    #[must_use]
    pub fn status(&self) -> WithdrawalStatus {
        if self.cancelled {
            WithdrawalStatus::Cancelled
        } else if !self.requested_amount.is_zero() && self.settled_amount == self.requested_amount {
            WithdrawalStatus::Settled
        } else if self.assigned_amount == self.requested_amount {
            WithdrawalStatus::FullyAssigned
        } else if self.assigned_amount > Decimal::ZERO {
            WithdrawalStatus::PartiallyAssigned
        } else {
            WithdrawalStatus::Pending
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl WithdrawalRequest {
    pub fn dummy(requested: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: WithdrawalId::new(),
            payer: PartyId::new(),
            asset: "USD".to_string(),
            requested_amount: requested,
            assigned_amount: Decimal::ZERO,
            settled_amount: Decimal::ZERO,
            destination: PayoutDestination::masked("First National", "12345678", "A. Payer"),
            cancelled: false,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }
}
