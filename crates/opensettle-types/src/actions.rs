//! Per-state, per-role permitted-action derivation.
//!
//! [`derive_actions`] is the single place action-enablement is computed.
//! Presentation layers read the result; they never recompute permission
//! logic, and no stored boolean ever shadows it. The function is pure:
//! same `(status, role, now)` inputs, same output, every call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Allocation, AllocationStatus};

/// The role an actor holds for a given allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorRole {
    /// The party whose withdrawal is being settled.
    Payer,
    /// The party whose deposit supplies settlement credit.
    Receiver,
    /// Platform operator.
    Admin,
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Payer => write!(f, "PAYER"),
            Self::Receiver => write!(f, "RECEIVER"),
            Self::Admin => write!(f, "ADMIN"),
        }
    }
}

/// Machine-checkable reason a control is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReasonCode {
    /// The allocation is not in the status this action requires.
    NotInRequiredState,
    /// This role never performs this action (or not in this status).
    NotActor,
    /// The confirmation window has lapsed.
    Expired,
    /// The allocation reached a terminal status.
    Terminal,
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInRequiredState => write!(f, "NOT_IN_REQUIRED_STATE"),
            Self::NotActor => write!(f, "NOT_ACTOR"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Terminal => write!(f, "TERMINAL"),
        }
    }
}

/// One action's gate: enabled, or disabled with exactly one reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionGate {
    pub allowed: bool,
    pub reason: Option<ReasonCode>,
}

impl ActionGate {
    const ALLOWED: Self = Self {
        allowed: true,
        reason: None,
    };

    #[must_use]
    fn denied(reason: ReasonCode) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

/// The full permitted-action set for one `(allocation, role)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationActions {
    pub submit_proof: ActionGate,
    pub confirm: ActionGate,
    pub dispute: ActionGate,
    pub admin_verify: ActionGate,
    pub finalize: ActionGate,
    pub cancel: ActionGate,
}

/// Gate for one action: `role` must match `actor`, `status` must be one
/// of `states`, and the allocation must not be past its deadline while
/// still expirable.
fn gate(
    status: AllocationStatus,
    role: ActorRole,
    actor: ActorRole,
    states: &[AllocationStatus],
    expiry_due: bool,
) -> ActionGate {
    if expiry_due {
        return ActionGate::denied(ReasonCode::Expired);
    }
    if role != actor {
        return ActionGate::denied(ReasonCode::NotActor);
    }
    if !states.contains(&status) {
        if status.is_terminal() {
            return ActionGate::denied(ReasonCode::Terminal);
        }
        return ActionGate::denied(ReasonCode::NotInRequiredState);
    }
    ActionGate::ALLOWED
}

/// Derive the permitted-action set for an allocation and actor role.
///
/// Computed entirely from `(status, role, now vs expires_at)` — never
/// from stored flags, so it cannot drift from the state machine.
#[must_use]
pub fn derive_actions(
    allocation: &Allocation,
    role: ActorRole,
    now: DateTime<Utc>,
) -> AllocationActions {
    use ActorRole::{Admin, Payer, Receiver};
    use AllocationStatus::{
        AdminVerified, Assigned, Disputed, ProofSubmitted, ReceiverConfirmed,
    };

    let status = allocation.status;
    let expiry_due = allocation.is_expiry_due(now);

    // Cancel has role-dependent state sets: admin may cancel any
    // non-terminal allocation (including DISPUTED, the resolution path);
    // the payer only while ASSIGNED; the receiver never.
    let cancel = match role {
        Admin => gate(
            status,
            role,
            Admin,
            &[
                Assigned,
                ProofSubmitted,
                ReceiverConfirmed,
                AdminVerified,
                Disputed,
            ],
            // Admin cancel of an expiry-due allocation is moot: the lazy
            // check will expire it first, so surface EXPIRED here too.
            expiry_due,
        ),
        Payer => gate(status, role, Payer, &[Assigned], expiry_due),
        Receiver => ActionGate::denied(ReasonCode::NotActor),
    };

    AllocationActions {
        submit_proof: gate(status, role, Payer, &[Assigned], expiry_due),
        confirm: gate(status, role, Receiver, &[ProofSubmitted], expiry_due),
        dispute: gate(
            status,
            role,
            Receiver,
            &[ProofSubmitted, ReceiverConfirmed],
            expiry_due,
        ),
        admin_verify: gate(status, role, Admin, &[ReceiverConfirmed], expiry_due),
        finalize: gate(status, role, Admin, &[AdminVerified], expiry_due),
        cancel,
    }
}
