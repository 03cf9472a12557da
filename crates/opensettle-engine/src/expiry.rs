//! Expiry monitor: time-based transition into EXPIRED.
//!
//! Two entry points back the same release logic: [`ExpiryMonitor::sweep`]
//! for the recurring pass, and [`ExpiryMonitor::expire_if_due`] for the
//! lazy check the service runs whenever an allocation is read or
//! transitioned. Both are idempotent: an allocation that already left
//! ASSIGNED/PROOF_SUBMITTED is silently left alone.

use chrono::{DateTime, Utc};
use opensettle_types::{Allocation, AllocationId, AllocationStatus, Result, SettleError};

use opensettle_ledger::{LedgerStore, TransitionEffect};

/// Moves non-finalized allocations past their deadline into EXPIRED,
/// releasing the reserved amount back onto both sides.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpiryMonitor;

impl ExpiryMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Expire every allocation whose deadline has lapsed while still in
    /// an expirable status. Returns the ids expired in this pass.
    ///
    /// Safe to run concurrently with user-initiated transitions: if a
    /// transition wins the race on some allocation, the version guard
    /// turns this sweep's write into a skipped no-op for it.
    pub fn sweep(&self, store: &mut LedgerStore, now: DateTime<Utc>) -> Vec<AllocationId> {
        let due = store.allocations_due_for_expiry(now);
        let mut expired = Vec::with_capacity(due.len());
        for allocation in due {
            match Self::expire(store, allocation, now) {
                Ok(a) => expired.push(a.id),
                // Lost a race: someone else already moved it on. Skip.
                Err(e) if e.is_conflict() => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Expiry sweep failed on allocation");
                }
            }
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Expiry sweep completed");
        }
        expired
    }

    /// Lazy check for one allocation: expire it if due, otherwise do
    /// nothing. Returns the expired allocation when a transition
    /// happened, `None` when there was nothing to do.
    pub fn expire_if_due(
        &self,
        store: &mut LedgerStore,
        id: AllocationId,
        now: DateTime<Utc>,
    ) -> Result<Option<Allocation>> {
        let allocation = store.allocation(id)?;
        if !allocation.is_expiry_due(now) {
            return Ok(None);
        }
        Self::expire(store, allocation, now).map(Some)
    }

    /// Commit the EXPIRED transition with its release.
    fn expire(
        store: &mut LedgerStore,
        mut allocation: Allocation,
        now: DateTime<Utc>,
    ) -> Result<Allocation> {
        if !allocation.status.can_transition_to(AllocationStatus::Expired) {
            return Err(SettleError::InvalidTransition {
                id: allocation.id,
                from: allocation.status,
                to: AllocationStatus::Expired,
            });
        }
        allocation.status = AllocationStatus::Expired;
        let expired = store.commit_transition(allocation, TransitionEffect::Release, now)?;
        tracing::info!(
            allocation = %expired.id,
            amount = %expired.amount,
            "Allocation expired"
        );
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assign::{AssignmentEngine, AssignmentRequest, CandidateSelection};
    use opensettle_types::{AccountRef, DepositCandidate, WithdrawalRequest};
    use rust_decimal::Decimal;

    fn assigned_allocation(
        window: chrono::Duration,
        now: DateTime<Utc>,
    ) -> (LedgerStore, Allocation) {
        let mut store = LedgerStore::new(AccountRef::new("OPS-CLEARING"));
        let wid = store
            .create_withdrawal(WithdrawalRequest::dummy(Decimal::new(1000, 0)))
            .unwrap();
        let did = store
            .create_deposit(DepositCandidate::dummy(Decimal::new(1000, 0)))
            .unwrap();
        let created = AssignmentEngine::new(window)
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
    fn sweep_expires_lapsed_allocations() {
        let now = Utc::now();
        let (mut store, allocation) = assigned_allocation(chrono::Duration::hours(6), now);

        let later = now + chrono::Duration::hours(7);
        let expired = ExpiryMonitor::new().sweep(&mut store, later);
        assert_eq!(expired, vec![allocation.id]);

        let a = store.allocation(allocation.id).unwrap();
        assert_eq!(a.status, AllocationStatus::Expired);

        // Capacity released on both sides.
        let w = store.withdrawal(allocation.withdrawal_id).unwrap();
        assert_eq!(w.assigned_amount, Decimal::ZERO);
        let d = store.deposit(allocation.deposit_id).unwrap();
        assert_eq!(d.assigned_amount, Decimal::ZERO);
    }

    #[test]
    fn sweep_is_idempotent() {
        let now = Utc::now();
        let (mut store, allocation) = assigned_allocation(chrono::Duration::hours(6), now);
        let later = now + chrono::Duration::hours(7);
        let monitor = ExpiryMonitor::new();

        assert_eq!(monitor.sweep(&mut store, later).len(), 1);
        // Second sweep finds nothing; release happened exactly once.
        assert!(monitor.sweep(&mut store, later).is_empty());

        let w = store.withdrawal(allocation.withdrawal_id).unwrap();
        assert_eq!(w.assigned_amount, Decimal::ZERO);
        assert_eq!(w.remaining_to_assign(), Decimal::new(1000, 0));
    }

    #[test]
    fn sweep_leaves_unlapsed_alone() {
        let now = Utc::now();
        let (mut store, allocation) = assigned_allocation(chrono::Duration::hours(6), now);

        assert!(ExpiryMonitor::new().sweep(&mut store, now).is_empty());
        assert_eq!(
            store.allocation(allocation.id).unwrap().status,
            AllocationStatus::Assigned
        );
    }

    #[test]
    fn expire_if_due_lazy_check() {
        let now = Utc::now();
        let (mut store, allocation) = assigned_allocation(chrono::Duration::hours(6), now);
        let monitor = ExpiryMonitor::new();

        assert!(
            monitor
                .expire_if_due(&mut store, allocation.id, now)
                .unwrap()
                .is_none()
        );

        let later = now + chrono::Duration::hours(7);
        let expired = monitor
            .expire_if_due(&mut store, allocation.id, later)
            .unwrap()
            .unwrap();
        assert_eq!(expired.status, AllocationStatus::Expired);

        // Re-checking an already-expired allocation is a no-op.
        assert!(
            monitor
                .expire_if_due(&mut store, allocation.id, later)
                .unwrap()
                .is_none()
        );
    }
}
