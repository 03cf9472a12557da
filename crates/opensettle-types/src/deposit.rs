//! Deposit-candidate model.
//!
//! A deposit request usable as settlement credit. Mirrors the withdrawal
//! shape: status is derived from the totals, never stored.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Asset, DepositId, PartyId, PayoutDestination};

/// Derived lifecycle status of a deposit candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepositStatus {
    Pending,
    PartiallyAssigned,
    FullyAssigned,
    Settled,
    Cancelled,
}

impl DepositStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Settled | Self::Cancelled)
    }
}

impl std::fmt::Display for DepositStatus {
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

/// A receiver's deposit request, eligible to supply settlement credit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositCandidate {
    pub id: DepositId,
    /// The receiver owed this amount by the platform.
    pub receiver: PartyId,
    pub asset: Asset,
    /// Total credit this candidate can supply. Immutable after creation.
    pub requested_amount: Decimal,
    /// Running total currently reserved by live allocations.
    pub assigned_amount: Decimal,
    /// Running total settled through finalized allocations.
    pub settled_amount: Decimal,
    /// The receiver's collection destination; copied (frozen) onto each
    /// allocation at creation.
    pub destination: PayoutDestination,
    /// Optional deadline after which this candidate stops accepting
    /// assignment.
    pub expires_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency counter, bumped on every committed write.
    pub version: u64,
}

impl DepositCandidate {
    /// Credit still available for new allocations.
    #[must_use]
    pub fn remaining_amount(&self) -> Decimal {
        self.requested_amount - self.assigned_amount
    }

    /// Whether nothing has been consumed yet.
    #[must_use]
    pub fn is_fully_available(&self) -> bool {
        self.assigned_amount.is_zero()
    }

    /// Whether the candidate's own deadline has passed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| now > deadline)
    }

    /// Whether the candidate is inside the expiring-soon window before
    /// its deadline.
    #[must_use]
    pub fn is_expiring(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        self.expires_at
            .is_some_and(|deadline| now <= deadline && deadline - now <= window)
    }

    /// Status, derived from the totals and the cancelled flag.
    #[must_use]
    pub fn status(&self) -> DepositStatus {
        if self.cancelled {
            DepositStatus::Cancelled
        } else if !self.requested_amount.is_zero() && self.settled_amount == self.requested_amount {
            DepositStatus::Settled
        } else if self.assigned_amount == self.requested_amount {
            DepositStatus::FullyAssigned
        } else if self.assigned_amount > Decimal::ZERO {
            DepositStatus::PartiallyAssigned
        } else {
            DepositStatus::Pending
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl DepositCandidate {
    pub fn dummy(requested: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: DepositId::new(),
            receiver: PartyId::new(),
            asset: "USD".to_string(),
            requested_amount: requested,
            assigned_amount: Decimal::ZERO,
            settled_amount: Decimal::ZERO,
            destination: PayoutDestination::masked("Commerce Bank", "87654321", "R. Receiver"),
            expires_at: None,
            cancelled: false,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }
}
