//! Allocation lifecycle: the six actor-initiated transitions.
//!
//! Every operation follows the same guarded sequence: load, lazily
//! expire if the deadline lapsed, check the actor role, check the
//! transition table, stamp the transition timestamp, and commit through
//! the store's version-guarded write. Only one transition can win a race
//! on the same allocation; the loser observes a conflict, never a
//! corrupted allocation.

use chrono::{DateTime, Utc};
use opensettle_types::{
    ActorRole, Allocation, AllocationId, AllocationStatus, AttachmentRef, PaymentProof,
    ReasonCode, Result, SettleError,
};

use opensettle_ledger::{LedgerStore, TransitionEffect};

use crate::expiry::ExpiryMonitor;

/// Advances allocations through the state machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleEngine {
    expiry: ExpiryMonitor,
}

impl LifecycleEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            expiry: ExpiryMonitor::new(),
        }
    }

    /// ASSIGNED → PROOF_SUBMITTED. Payer only, while not expired.
    ///
    /// Records the payment details and attachment references and sets
    /// `proof_submitted_at`.
    pub fn submit_proof(
        &self,
        store: &mut LedgerStore,
        id: AllocationId,
        role: ActorRole,
        proof: PaymentProof,
        attachments: Vec<AttachmentRef>,
        now: DateTime<Utc>,
    ) -> Result<Allocation> {
        require_role(role, ActorRole::Payer, "submit_proof")?;
        let allocation = self.load_live(store, id, now)?;
        self.commit(
            store,
            allocation,
            AllocationStatus::ProofSubmitted,
            TransitionEffect::None,
            now,
            |a| {
                a.payment = Some(proof);
                a.attachments = attachments;
                a.timestamps.proof_submitted_at = Some(now);
            },
        )
    }

    /// PROOF_SUBMITTED → RECEIVER_CONFIRMED. Receiver only.
    pub fn confirm(
        &self,
        store: &mut LedgerStore,
        id: AllocationId,
        role: ActorRole,
        now: DateTime<Utc>,
    ) -> Result<Allocation> {
        require_role(role, ActorRole::Receiver, "confirm")?;
        let allocation = self.load_live(store, id, now)?;
        self.commit(
            store,
            allocation,
            AllocationStatus::ReceiverConfirmed,
            TransitionEffect::None,
            now,
            |a| a.timestamps.receiver_confirmed_at = Some(now),
        )
    }

    /// PROOF_SUBMITTED / RECEIVER_CONFIRMED → DISPUTED. Receiver only.
    ///
    /// Freezes the allocation pending admin review; reserved amounts
    /// stay reserved.
    pub fn dispute(
        &self,
        store: &mut LedgerStore,
        id: AllocationId,
        role: ActorRole,
        now: DateTime<Utc>,
    ) -> Result<Allocation> {
        require_role(role, ActorRole::Receiver, "dispute")?;
        let allocation = self.load_live(store, id, now)?;
        let disputed = self.commit(
            store,
            allocation,
            AllocationStatus::Disputed,
            TransitionEffect::None,
            now,
            |_| {},
        )?;
        tracing::warn!(allocation = %disputed.id, "Allocation disputed");
        Ok(disputed)
    }

    /// RECEIVER_CONFIRMED → ADMIN_VERIFIED (approve) or DISPUTED
    /// (reject). Admin only. The note is recorded either way;
    /// `admin_verified_at` is stamped only on approval.
    pub fn admin_verify(
        &self,
        store: &mut LedgerStore,
        id: AllocationId,
        role: ActorRole,
        approved: bool,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Allocation> {
        require_role(role, ActorRole::Admin, "admin_verify")?;
        let allocation = self.load_live(store, id, now)?;
        let target = if approved {
            AllocationStatus::AdminVerified
        } else {
            AllocationStatus::Disputed
        };
        self.commit(store, allocation, target, TransitionEffect::None, now, |a| {
            a.admin_note = note;
            if approved {
                a.timestamps.admin_verified_at = Some(now);
            }
        })
    }

    /// ADMIN_VERIFIED → SETTLED. Admin only. Sets `settled_at` and
    /// moves the amount to `settled_amount` on both sides.
    pub fn finalize(
        &self,
        store: &mut LedgerStore,
        id: AllocationId,
        role: ActorRole,
        now: DateTime<Utc>,
    ) -> Result<Allocation> {
        require_role(role, ActorRole::Admin, "finalize")?;
        let allocation = self.load_live(store, id, now)?;
        self.commit(
            store,
            allocation,
            AllocationStatus::Settled,
            TransitionEffect::Settle,
            now,
            |a| a.timestamps.settled_at = Some(now),
        )
    }

    /// Any non-terminal state → CANCELLED. Admin from anywhere
    /// (including DISPUTED, the resolution path); the payer only while
    /// ASSIGNED. Releases the reserved amount, identically to expiry.
    pub fn cancel(
        &self,
        store: &mut LedgerStore,
        id: AllocationId,
        role: ActorRole,
        now: DateTime<Utc>,
    ) -> Result<Allocation> {
        match role {
            ActorRole::Admin => {}
            ActorRole::Payer => {}
            ActorRole::Receiver => {
                return Err(SettleError::NotPermitted {
                    role,
                    action: "cancel",
                    reason: ReasonCode::NotActor,
                });
            }
        }
        let allocation = self.load_live(store, id, now)?;
        if role == ActorRole::Payer && allocation.status != AllocationStatus::Assigned {
            return Err(SettleError::NotPermitted {
                role,
                action: "cancel",
                reason: ReasonCode::NotInRequiredState,
            });
        }
        self.commit(
            store,
            allocation,
            AllocationStatus::Cancelled,
            TransitionEffect::Release,
            now,
            |_| {},
        )
    }

    /// Load an allocation, applying the lazy expiry check first: a
    /// lapsed allocation is expired on the spot and the caller's
    /// operation fails with `OS_ERR_403`.
    fn load_live(
        &self,
        store: &mut LedgerStore,
        id: AllocationId,
        now: DateTime<Utc>,
    ) -> Result<Allocation> {
        if self.expiry.expire_if_due(store, id, now)?.is_some() {
            return Err(SettleError::AllocationExpired(id));
        }
        store.allocation(id)
    }

    /// Check the transition table, apply the mutation, commit.
    #[allow(clippy::unused_self)]
    fn commit(
        &self,
        store: &mut LedgerStore,
        mut allocation: Allocation,
        target: AllocationStatus,
        effect: TransitionEffect,
        now: DateTime<Utc>,
        mutate: impl FnOnce(&mut Allocation),
    ) -> Result<Allocation> {
        if !allocation.status.can_transition_to(target) {
            return Err(SettleError::InvalidTransition {
                id: allocation.id,
                from: allocation.status,
                to: target,
            });
        }
        let from = allocation.status;
        allocation.status = target;
        mutate(&mut allocation);
        let committed = store.commit_transition(allocation, effect, now)?;
        tracing::info!(
            allocation = %committed.id,
            from = %from,
            to = %target,
            "Allocation transitioned"
        );
        Ok(committed)
    }
}

fn require_role(actual: ActorRole, required: ActorRole, action: &'static str) -> Result<()> {
    if actual == required {
        Ok(())
    } else {
        Err(SettleError::NotPermitted {
            role: actual,
            action,
            reason: ReasonCode::NotActor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assign::{AssignmentEngine, AssignmentRequest, CandidateSelection};
    use opensettle_types::{AccountRef, DepositCandidate, WithdrawalRequest};
    use rust_decimal::Decimal;

    fn setup(now: DateTime<Utc>) -> (LedgerStore, Allocation) {
        let mut store = LedgerStore::new(AccountRef::new("OPS-CLEARING"));
        let wid = store
            .create_withdrawal(WithdrawalRequest::dummy(Decimal::new(1000, 0)))
            .unwrap();
        let did = store
            .create_deposit(DepositCandidate::dummy(Decimal::new(1000, 0)))
            .unwrap();
        let created = AssignmentEngine::new(chrono::Duration::hours(6))
            .assign(
                &mut store,
                &AssignmentRequest {
                    withdrawal_id: wid,
                    candidates: vec![CandidateSelection::greedy(did)],
                },
                now,
            )
            .unwrap();
        let allocation = created.into_iter().next().unwrap();
        (store, allocation)
    }

    #[test]
    fn full_success_path_stamps_every_timestamp() {
        let now = Utc::now();
        let (mut store, allocation) = setup(now);
        let engine = LifecycleEngine::new();
        let id = allocation.id;

        let a = engine
            .submit_proof(
                &mut store,
                id,
                ActorRole::Payer,
                PaymentProof::dummy(now),
                vec![AttachmentRef("receipt-1.png".to_string())],
                now,
            )
            .unwrap();
        assert_eq!(a.status, AllocationStatus::ProofSubmitted);
        assert_eq!(a.timestamps.proof_submitted_at, Some(now));
        assert_eq!(a.attachments.len(), 1);

        let a = engine.confirm(&mut store, id, ActorRole::Receiver, now).unwrap();
        assert_eq!(a.status, AllocationStatus::ReceiverConfirmed);
        assert_eq!(a.timestamps.receiver_confirmed_at, Some(now));

        let a = engine
            .admin_verify(&mut store, id, ActorRole::Admin, true, Some("ok".into()), now)
            .unwrap();
        assert_eq!(a.status, AllocationStatus::AdminVerified);
        assert_eq!(a.timestamps.admin_verified_at, Some(now));
        assert_eq!(a.admin_note.as_deref(), Some("ok"));

        let a = engine.finalize(&mut store, id, ActorRole::Admin, now).unwrap();
        assert_eq!(a.status, AllocationStatus::Settled);
        assert_eq!(a.timestamps.settled_at, Some(now));

        // Earlier timestamps were never cleared.
        assert!(a.timestamps.proof_submitted_at.is_some());
        assert!(a.timestamps.receiver_confirmed_at.is_some());
        assert!(a.timestamps.admin_verified_at.is_some());

        // Both sides settled.
        let w = store.withdrawal(allocation.withdrawal_id).unwrap();
        assert_eq!(w.settled_amount, Decimal::new(1000, 0));
        let d = store.deposit(allocation.deposit_id).unwrap();
        assert_eq!(d.settled_amount, Decimal::new(1000, 0));
    }

    #[test]
    fn wrong_role_is_rejected() {
        let now = Utc::now();
        let (mut store, allocation) = setup(now);
        let engine = LifecycleEngine::new();

        let err = engine
            .submit_proof(
                &mut store,
                allocation.id,
                ActorRole::Receiver,
                PaymentProof::dummy(now),
                vec![],
                now,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            SettleError::NotPermitted {
                reason: ReasonCode::NotActor,
                ..
            }
        ));

        let err = engine
            .confirm(&mut store, allocation.id, ActorRole::Payer, now)
            .unwrap_err();
        assert!(matches!(err, SettleError::NotPermitted { .. }));
    }

    #[test]
    fn confirm_requires_proof_first() {
        let now = Utc::now();
        let (mut store, allocation) = setup(now);
        let engine = LifecycleEngine::new();

        let err = engine
            .confirm(&mut store, allocation.id, ActorRole::Receiver, now)
            .unwrap_err();
        assert!(matches!(
            err,
            SettleError::InvalidTransition {
                from: AllocationStatus::Assigned,
                to: AllocationStatus::ReceiverConfirmed,
                ..
            }
        ));
    }

    #[test]
    fn dispute_then_confirm_conflicts() {
        // Dispute on PROOF_SUBMITTED, then a confirm on the same
        // allocation fails with a conflict-class error.
        let now = Utc::now();
        let (mut store, allocation) = setup(now);
        let engine = LifecycleEngine::new();
        let id = allocation.id;

        engine
            .submit_proof(&mut store, id, ActorRole::Payer, PaymentProof::dummy(now), vec![], now)
            .unwrap();
        let a = engine.dispute(&mut store, id, ActorRole::Receiver, now).unwrap();
        assert_eq!(a.status, AllocationStatus::Disputed);

        let err = engine
            .confirm(&mut store, id, ActorRole::Receiver, now)
            .unwrap_err();
        assert!(err.is_conflict(), "got: {err}");

        // Disputed freezes the reservation: nothing released.
        let w = store.withdrawal(allocation.withdrawal_id).unwrap();
        assert_eq!(w.assigned_amount, Decimal::new(1000, 0));
    }

    #[test]
    fn admin_reject_routes_to_disputed() {
        let now = Utc::now();
        let (mut store, allocation) = setup(now);
        let engine = LifecycleEngine::new();
        let id = allocation.id;

        engine
            .submit_proof(&mut store, id, ActorRole::Payer, PaymentProof::dummy(now), vec![], now)
            .unwrap();
        engine.confirm(&mut store, id, ActorRole::Receiver, now).unwrap();

        let a = engine
            .admin_verify(
                &mut store,
                id,
                ActorRole::Admin,
                false,
                Some("reference does not match".into()),
                now,
            )
            .unwrap();
        assert_eq!(a.status, AllocationStatus::Disputed);
        assert_eq!(a.timestamps.admin_verified_at, None);
        assert!(a.admin_note.is_some());
    }

    #[test]
    fn disputed_resolves_via_admin_cancel() {
        let now = Utc::now();
        let (mut store, allocation) = setup(now);
        let engine = LifecycleEngine::new();
        let id = allocation.id;

        engine
            .submit_proof(&mut store, id, ActorRole::Payer, PaymentProof::dummy(now), vec![], now)
            .unwrap();
        engine.dispute(&mut store, id, ActorRole::Receiver, now).unwrap();

        let a = engine.cancel(&mut store, id, ActorRole::Admin, now).unwrap();
        assert_eq!(a.status, AllocationStatus::Cancelled);

        // Resolution releases the reservation.
        let w = store.withdrawal(allocation.withdrawal_id).unwrap();
        assert_eq!(w.assigned_amount, Decimal::ZERO);
    }

    #[test]
    fn payer_cancel_only_while_assigned() {
        let now = Utc::now();
        let (mut store, allocation) = setup(now);
        let engine = LifecycleEngine::new();
        let id = allocation.id;

        engine
            .submit_proof(&mut store, id, ActorRole::Payer, PaymentProof::dummy(now), vec![], now)
            .unwrap();
        let err = engine
            .cancel(&mut store, id, ActorRole::Payer, now)
            .unwrap_err();
        assert!(matches!(
            err,
            SettleError::NotPermitted {
                reason: ReasonCode::NotInRequiredState,
                ..
            }
        ));

        // Admin still can.
        let a = engine.cancel(&mut store, id, ActorRole::Admin, now).unwrap();
        assert_eq!(a.status, AllocationStatus::Cancelled);
    }

    #[test]
    fn receiver_never_cancels() {
        let now = Utc::now();
        let (mut store, allocation) = setup(now);
        let err = LifecycleEngine::new()
            .cancel(&mut store, allocation.id, ActorRole::Receiver, now)
            .unwrap_err();
        assert!(matches!(
            err,
            SettleError::NotPermitted {
                reason: ReasonCode::NotActor,
                ..
            }
        ));
    }

    #[test]
    fn settled_is_final() {
        let now = Utc::now();
        let (mut store, allocation) = setup(now);
        let engine = LifecycleEngine::new();
        let id = allocation.id;

        engine
            .submit_proof(&mut store, id, ActorRole::Payer, PaymentProof::dummy(now), vec![], now)
            .unwrap();
        engine.confirm(&mut store, id, ActorRole::Receiver, now).unwrap();
        engine
            .admin_verify(&mut store, id, ActorRole::Admin, true, None, now)
            .unwrap();
        engine.finalize(&mut store, id, ActorRole::Admin, now).unwrap();

        let err = engine
            .cancel(&mut store, id, ActorRole::Admin, now)
            .unwrap_err();
        assert!(matches!(err, SettleError::InvalidTransition { .. }));
    }

    #[test]
    fn lapsed_allocation_expires_on_touch() {
        let now = Utc::now();
        let (mut store, allocation) = setup(now);
        let engine = LifecycleEngine::new();
        let later = now + chrono::Duration::hours(7);

        let err = engine
            .submit_proof(
                &mut store,
                allocation.id,
                ActorRole::Payer,
                PaymentProof::dummy(later),
                vec![],
                later,
            )
            .unwrap_err();
        assert!(matches!(err, SettleError::AllocationExpired(_)));

        // The lazy check transitioned it for real.
        let a = store.allocation(allocation.id).unwrap();
        assert_eq!(a.status, AllocationStatus::Expired);
        let w = store.withdrawal(allocation.withdrawal_id).unwrap();
        assert_eq!(w.assigned_amount, Decimal::ZERO);
    }

    #[test]
    fn confirmed_allocation_survives_deadline() {
        let now = Utc::now();
        let (mut store, allocation) = setup(now);
        let engine = LifecycleEngine::new();
        let id = allocation.id;

        engine
            .submit_proof(&mut store, id, ActorRole::Payer, PaymentProof::dummy(now), vec![], now)
            .unwrap();
        engine.confirm(&mut store, id, ActorRole::Receiver, now).unwrap();

        // Deadline long gone, but the receiver already confirmed: the
        // admin path proceeds normally.
        let later = now + chrono::Duration::days(2);
        let a = engine
            .admin_verify(&mut store, id, ActorRole::Admin, true, None, later)
            .unwrap();
        assert_eq!(a.status, AllocationStatus::AdminVerified);
    }
}
