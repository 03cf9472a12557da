//! # Allocation — the committed withdrawal/deposit pairing
//!
//! An allocation pairs part or all of one withdrawal with part or all of
//! one deposit and carries its own lifecycle.
//!
//! ## State Machine
//!
//! ```text
//!   ┌──────────┐ payer  ┌─────────────────┐ receiver ┌────────────────────┐ admin ┌────────────────┐ admin ┌─────────┐
//!   │ ASSIGNED ├───────▶│ PROOF_SUBMITTED ├─────────▶│ RECEIVER_CONFIRMED ├──────▶│ ADMIN_VERIFIED ├──────▶│ SETTLED │
//!   └───┬──────┘        └───┬──────┬──────┘          └──────┬───────┬─────┘       └───────┬────────┘       └─────────┘
//!       │ expire/cancel     │      │ dispute               reject   │ dispute            │ cancel
//!       ▼                   ▼      ▼                          ▼     ▼                    ▼
//!   ┌─────────┐      ┌───────────┐┌──────────┐            ┌──────────┐            ┌───────────┐
//!   │ EXPIRED │      │ CANCELLED ││ DISPUTED │            │ DISPUTED │            │ CANCELLED │
//!   └─────────┘      └───────────┘└────┬─────┘            └──────────┘            └───────────┘
//!                                      │ admin resolve (cancel)
//!                                      ▼
//!                                 ┌───────────┐
//!                                 │ CANCELLED │
//!                                 └───────────┘
//! ```
//!
//! Transitions are **monotonic**: once a status is left, there is no path
//! back to it or to any earlier status. The transition table lives in
//! [`AllocationStatus::can_transition_to`] and is the only place edges are
//! defined — call sites never re-check status pairs ad hoc.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AllocationId, Asset, DepositId, PartyId, PaymentCode, PayoutDestination, WithdrawalId};

/// The lifecycle status of an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllocationStatus {
    /// Created by the assignment engine. Waiting for the payer's proof.
    Assigned,
    /// The payer submitted payment proof. Waiting for the receiver.
    ProofSubmitted,
    /// The receiver confirmed the payment arrived.
    ReceiverConfirmed,
    /// An admin verified the confirmation. Waiting for finalization.
    AdminVerified,
    /// Finalized. Amounts moved to `settled_amount` on both sides.
    /// **Irreversible.**
    Settled,
    /// The receiver flagged a problem. Frozen pending admin resolution;
    /// reserved amounts stay reserved.
    Disputed,
    /// Cancelled by an admin (any non-settled state) or the payer
    /// (only while ASSIGNED). Reserved amounts released.
    Cancelled,
    /// The confirmation window lapsed before the receiver confirmed.
    /// Reserved amounts released.
    Expired,
}

impl AllocationStatus {
    /// Can this allocation transition to the given target status?
    ///
    /// This is the central transition table; every lifecycle operation
    /// consults it and nothing else.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (
                Self::Assigned,
                Self::ProofSubmitted | Self::Cancelled | Self::Expired
            ) | (
                Self::ProofSubmitted,
                Self::ReceiverConfirmed | Self::Disputed | Self::Cancelled | Self::Expired
            ) | (
                Self::ReceiverConfirmed,
                Self::AdminVerified | Self::Disputed | Self::Cancelled
            ) | (Self::AdminVerified, Self::Settled | Self::Cancelled)
                | (Self::Disputed, Self::Cancelled)
        )
    }

    /// Terminal statuses have no outgoing transitions (DISPUTED keeps the
    /// single admin-resolution edge to CANCELLED).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Settled | Self::Cancelled | Self::Expired)
    }

    /// Only ASSIGNED and PROOF_SUBMITTED can expire; once the receiver
    /// has confirmed, the expiry monitor leaves the allocation alone.
    #[must_use]
    pub fn is_expirable(self) -> bool {
        matches!(self, Self::Assigned | Self::ProofSubmitted)
    }

    /// Position on the success path, for monotonicity checks. Side
    /// branches return `None`.
    #[must_use]
    pub fn rank(self) -> Option<u8> {
        match self {
            Self::Assigned => Some(0),
            Self::ProofSubmitted => Some(1),
            Self::ReceiverConfirmed => Some(2),
            Self::AdminVerified => Some(3),
            Self::Settled => Some(4),
            Self::Disputed | Self::Cancelled | Self::Expired => None,
        }
    }
}

impl std::fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Assigned => write!(f, "ASSIGNED"),
            Self::ProofSubmitted => write!(f, "PROOF_SUBMITTED"),
            Self::ReceiverConfirmed => write!(f, "RECEIVER_CONFIRMED"),
            Self::AdminVerified => write!(f, "ADMIN_VERIFIED"),
            Self::Settled => write!(f, "SETTLED"),
            Self::Disputed => write!(f, "DISPUTED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Payer-submitted evidence that the payment was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProof {
    /// Free-form method label (e.g., "bank_transfer").
    pub method: String,
    /// Bank reference / transaction number the payer quotes.
    pub bank_reference: String,
    /// When the payer says the payment was executed.
    pub paid_at: DateTime<Utc>,
}

/// Opaque reference to an uploaded proof file. The file store is an
/// external collaborator; this system never reads file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef(pub String);

/// One nullable instant per major transition. Timestamps are set exactly
/// once and never cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionTimestamps {
    pub proof_submitted_at: Option<DateTime<Utc>>,
    pub receiver_confirmed_at: Option<DateTime<Utc>>,
    pub admin_verified_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// A committed pairing of one withdrawal with one deposit.
///
/// `withdrawal_id`, `deposit_id`, and `amount` are immutable after
/// creation — corrections happen via cancellation plus re-allocation,
/// never mutation. Allocations are never deleted; terminal statuses
/// preserve the full audit history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub id: AllocationId,
    pub withdrawal_id: WithdrawalId,
    pub deposit_id: DepositId,
    /// The payer on the withdrawal side.
    pub payer: PartyId,
    /// The receiver on the deposit side.
    pub receiver: PartyId,
    pub asset: Asset,
    /// Amount paired by this allocation. Strictly positive, immutable.
    pub amount: Decimal,
    pub status: AllocationStatus,
    /// Absolute confirmation deadline.
    pub expires_at: DateTime<Utc>,
    /// Matching token shown to both parties.
    pub payment_code: PaymentCode,
    /// The destination the payer must pay into, frozen from the deposit
    /// candidate at creation time.
    pub destination: PayoutDestination,
    /// Present once the payer submits proof.
    pub payment: Option<PaymentProof>,
    /// References to uploaded proof files.
    pub attachments: Vec<AttachmentRef>,
    /// Admin's approve/reject note from verification.
    pub admin_note: Option<String>,
    pub timestamps: TransitionTimestamps,
    pub created_at: DateTime<Utc>,
    /// Optimistic-concurrency counter, bumped on every committed write.
    pub version: u64,
}

impl Allocation {
    /// Whether the confirmation deadline has passed. Only meaningful for
    /// expirable statuses; confirmed allocations are immune regardless.
    #[must_use]
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether the expiry monitor would expire this allocation now.
    #[must_use]
    pub fn is_expiry_due(&self, now: DateTime<Utc>) -> bool {
        self.status.is_expirable() && self.is_past_deadline(now)
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl PaymentProof {
    /// Dummy proof with a random-looking bank reference.
    pub fn dummy(paid_at: DateTime<Utc>) -> Self {
        Self {
            method: "bank_transfer".to_string(),
            bank_reference: format!("TRX-{:08}", rand::random::<u32>() % 100_000_000),
            paid_at,
        }
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Allocation {
    pub fn dummy(amount: Decimal) -> Self {
        let id = AllocationId::new();
        let now = Utc::now();
        Self {
            id,
            withdrawal_id: WithdrawalId::new(),
            deposit_id: DepositId::new(),
            payer: PartyId::new(),
            receiver: PartyId::new(),
            asset: "USD".to_string(),
            amount,
            status: AllocationStatus::Assigned,
            expires_at: now + chrono::Duration::hours(6),
            payment_code: PaymentCode::for_allocation(id),
            destination: PayoutDestination::masked("Commerce Bank", "87654321", "R. Receiver"),
            payment: None,
            attachments: Vec::new(),
            admin_note: None,
            timestamps: TransitionTimestamps::default(),
            created_at: now,
            version: 0,
        }
    }
}
