//! The settlement service facade.
//!
//! The single entry point operational layers call. Composes the
//! assignment engine, lifecycle engine, and expiry monitor over one
//! ledger store, applies the lazy expiry check on every read, and
//! attaches the derived permitted-action set to every allocation it
//! returns so clients never recompute permission logic.
//!
//! Actor identity and role are explicit arguments on every call; the
//! service never consults ambient session state.

use chrono::{DateTime, Utc};
use opensettle_types::{
    ActorRole, Allocation, AllocationActions, AllocationId, Asset, AttachmentRef,
    DepositCandidate, DepositId, EngineConfig, PartyId, PaymentProof, PayoutDestination, Result,
    WithdrawalId, WithdrawalRequest, derive_actions,
};
use rust_decimal::Decimal;

use opensettle_ledger::{
    AllocationFilter, DepositFilter, LedgerStore, Page, Paged, WithdrawalFilter,
};

use crate::{
    assign::{AssignmentEngine, AssignmentRequest},
    expiry::ExpiryMonitor,
    lifecycle::LifecycleEngine,
};

/// An allocation plus the action set derived for the requesting role.
#[derive(Debug, Clone)]
pub struct AllocationView {
    pub allocation: Allocation,
    pub actions: AllocationActions,
}

/// Facade over the allocation and reconciliation-facing ledger state.
pub struct SettlementService {
    store: LedgerStore,
    config: EngineConfig,
    assignment: AssignmentEngine,
    lifecycle: LifecycleEngine,
    expiry: ExpiryMonitor,
}

impl SettlementService {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let assignment = AssignmentEngine::from_config(&config);
        Self {
            store: LedgerStore::new(config.clearing_account.clone()),
            config,
            assignment,
            lifecycle: LifecycleEngine::new(),
            expiry: ExpiryMonitor::new(),
        }
    }

    /// Read access to the underlying store (reconciliation reads the
    /// journal through this).
    #[must_use]
    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =====================================================================
    // Intake (requesters are external collaborators)
    // =====================================================================

    /// Register a payer's withdrawal request.
    pub fn create_withdrawal(
        &mut self,
        payer: PartyId,
        asset: impl Into<Asset>,
        amount: Decimal,
        destination: PayoutDestination,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalRequest> {
        let withdrawal = WithdrawalRequest {
            id: WithdrawalId::new(),
            payer,
            asset: asset.into(),
            requested_amount: amount,
            assigned_amount: Decimal::ZERO,
            settled_amount: Decimal::ZERO,
            destination,
            cancelled: false,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        let id = self.store.create_withdrawal(withdrawal)?;
        self.store.withdrawal(id)
    }

    /// Register a receiver's deposit request.
    pub fn create_deposit(
        &mut self,
        receiver: PartyId,
        asset: impl Into<Asset>,
        amount: Decimal,
        destination: PayoutDestination,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<DepositCandidate> {
        let deposit = DepositCandidate {
            id: DepositId::new(),
            receiver,
            asset: asset.into(),
            requested_amount: amount,
            assigned_amount: Decimal::ZERO,
            settled_amount: Decimal::ZERO,
            destination,
            expires_at,
            cancelled: false,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        let id = self.store.create_deposit(deposit)?;
        self.store.deposit(id)
    }

    /// Cancel a withdrawal request (admin). Refused while allocations
    /// still reserve part of it.
    pub fn cancel_withdrawal(
        &mut self,
        id: WithdrawalId,
        role: ActorRole,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalRequest> {
        require_admin(role, "cancel_withdrawal")?;
        let version = self.store.withdrawal(id)?.version;
        self.store.cancel_withdrawal(id, version, now)
    }

    /// Cancel a deposit request (admin). Refused while allocations
    /// still reserve part of it.
    pub fn cancel_deposit(
        &mut self,
        id: DepositId,
        role: ActorRole,
        now: DateTime<Utc>,
    ) -> Result<DepositCandidate> {
        require_admin(role, "cancel_deposit")?;
        let version = self.store.deposit(id)?.version;
        self.store.cancel_deposit(id, version, now)
    }

    // =====================================================================
    // Listings
    // =====================================================================

    #[must_use]
    pub fn list_withdrawals(
        &self,
        filter: &WithdrawalFilter,
        page: Page,
    ) -> Paged<WithdrawalRequest> {
        self.store.list_withdrawals(filter, page, self.config.page)
    }

    /// Deposit candidates eligible to settle the given withdrawal.
    pub fn list_candidates(
        &self,
        withdrawal_id: WithdrawalId,
        filter: &DepositFilter,
        page: Page,
        now: DateTime<Utc>,
    ) -> Result<Paged<DepositCandidate>> {
        self.store
            .list_candidates_for(withdrawal_id, filter, page, self.config.page, now)
    }

    /// List allocations with the action set derived for `role`. Runs the
    /// expiry sweep first so lapsed allocations are observed as EXPIRED.
    pub fn list_allocations(
        &mut self,
        filter: &AllocationFilter,
        page: Page,
        role: ActorRole,
        now: DateTime<Utc>,
    ) -> Paged<AllocationView> {
        self.expiry.sweep(&mut self.store, now);
        let paged = self.store.list_allocations(filter, page, self.config.page);
        Paged {
            items: paged
                .items
                .into_iter()
                .map(|allocation| view(allocation, role, now))
                .collect(),
            total: paged.total,
            offset: paged.offset,
        }
    }

    /// Fetch one allocation with the action set derived for `role`.
    /// Applies the lazy expiry check: a lapsed allocation is observed as
    /// EXPIRED with its amounts already released.
    pub fn get_allocation(
        &mut self,
        id: AllocationId,
        role: ActorRole,
        now: DateTime<Utc>,
    ) -> Result<AllocationView> {
        self.expiry.expire_if_due(&mut self.store, id, now)?;
        Ok(view(self.store.allocation(id)?, role, now))
    }

    // =====================================================================
    // Assignment
    // =====================================================================

    /// Validate and commit an assignment; all-or-nothing per call.
    pub fn assign(
        &mut self,
        request: &AssignmentRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<Allocation>> {
        self.assignment.assign(&mut self.store, request, now)
    }

    // =====================================================================
    // Lifecycle transitions
    // =====================================================================

    pub fn submit_proof(
        &mut self,
        id: AllocationId,
        role: ActorRole,
        proof: PaymentProof,
        attachments: Vec<AttachmentRef>,
        now: DateTime<Utc>,
    ) -> Result<AllocationView> {
        let updated = self
            .lifecycle
            .submit_proof(&mut self.store, id, role, proof, attachments, now)?;
        Ok(view(updated, role, now))
    }

    pub fn confirm(
        &mut self,
        id: AllocationId,
        role: ActorRole,
        now: DateTime<Utc>,
    ) -> Result<AllocationView> {
        let updated = self.lifecycle.confirm(&mut self.store, id, role, now)?;
        Ok(view(updated, role, now))
    }

    pub fn dispute(
        &mut self,
        id: AllocationId,
        role: ActorRole,
        now: DateTime<Utc>,
    ) -> Result<AllocationView> {
        let updated = self.lifecycle.dispute(&mut self.store, id, role, now)?;
        Ok(view(updated, role, now))
    }

    pub fn admin_verify(
        &mut self,
        id: AllocationId,
        role: ActorRole,
        approved: bool,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<AllocationView> {
        let updated = self
            .lifecycle
            .admin_verify(&mut self.store, id, role, approved, note, now)?;
        Ok(view(updated, role, now))
    }

    pub fn finalize(
        &mut self,
        id: AllocationId,
        role: ActorRole,
        now: DateTime<Utc>,
    ) -> Result<AllocationView> {
        let updated = self.lifecycle.finalize(&mut self.store, id, role, now)?;
        Ok(view(updated, role, now))
    }

    pub fn cancel(
        &mut self,
        id: AllocationId,
        role: ActorRole,
        now: DateTime<Utc>,
    ) -> Result<AllocationView> {
        let updated = self.lifecycle.cancel(&mut self.store, id, role, now)?;
        Ok(view(updated, role, now))
    }

    // =====================================================================
    // Expiry
    // =====================================================================

    /// Run one expiry sweep; returns the ids expired in this pass.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> Vec<AllocationId> {
        self.expiry.sweep(&mut self.store, now)
    }
}

fn view(allocation: Allocation, role: ActorRole, now: DateTime<Utc>) -> AllocationView {
    let actions = derive_actions(&allocation, role, now);
    AllocationView { allocation, actions }
}

fn require_admin(role: ActorRole, action: &'static str) -> Result<()> {
    if role == ActorRole::Admin {
        Ok(())
    } else {
        Err(opensettle_types::SettleError::NotPermitted {
            role,
            action,
            reason: opensettle_types::ReasonCode::NotActor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assign::CandidateSelection;
    use opensettle_types::AllocationStatus;

    fn service() -> SettlementService {
        SettlementService::new(EngineConfig::default())
    }

    fn dest() -> PayoutDestination {
        PayoutDestination::masked("Commerce Bank", "87654321", "R. Receiver")
    }

    #[test]
    fn intake_and_listing() {
        let now = Utc::now();
        let mut svc = service();
        svc.create_withdrawal(PartyId::new(), "USD", Decimal::new(1000, 0), dest(), now)
            .unwrap();
        svc.create_withdrawal(PartyId::new(), "USD", Decimal::new(2000, 0), dest(), now)
            .unwrap();

        let listed = svc.list_withdrawals(&WithdrawalFilter::default(), Page::default());
        assert_eq!(listed.total, 2);
    }

    #[test]
    fn views_carry_derived_actions() {
        let now = Utc::now();
        let mut svc = service();
        let w = svc
            .create_withdrawal(PartyId::new(), "USD", Decimal::new(1000, 0), dest(), now)
            .unwrap();
        let d = svc
            .create_deposit(PartyId::new(), "USD", Decimal::new(1000, 0), dest(), None, now)
            .unwrap();
        let created = svc
            .assign(
                &AssignmentRequest {
                    withdrawal_id: w.id,
                    candidates: vec![CandidateSelection::greedy(d.id)],
                },
                now,
            )
            .unwrap();
        let id = created[0].id;

        let payer_view = svc.get_allocation(id, ActorRole::Payer, now).unwrap();
        assert!(payer_view.actions.submit_proof.allowed);
        assert!(!payer_view.actions.confirm.allowed);

        let receiver_view = svc.get_allocation(id, ActorRole::Receiver, now).unwrap();
        assert!(!receiver_view.actions.submit_proof.allowed);
    }

    #[test]
    fn request_cancel_is_admin_only() {
        let now = Utc::now();
        let mut svc = service();
        let w = svc
            .create_withdrawal(PartyId::new(), "USD", Decimal::new(1000, 0), dest(), now)
            .unwrap();

        assert!(svc.cancel_withdrawal(w.id, ActorRole::Payer, now).is_err());
        let cancelled = svc.cancel_withdrawal(w.id, ActorRole::Admin, now).unwrap();
        assert!(cancelled.cancelled);
    }

    #[test]
    fn read_observes_lazy_expiry() {
        // An ASSIGNED allocation past its deadline is observed as
        // EXPIRED by any client, with amounts already released.
        let now = Utc::now();
        let mut svc = service();
        let w = svc
            .create_withdrawal(PartyId::new(), "USD", Decimal::new(1000, 0), dest(), now)
            .unwrap();
        let d = svc
            .create_deposit(PartyId::new(), "USD", Decimal::new(1000, 0), dest(), None, now)
            .unwrap();
        let created = svc
            .assign(
                &AssignmentRequest {
                    withdrawal_id: w.id,
                    candidates: vec![CandidateSelection::greedy(d.id)],
                },
                now,
            )
            .unwrap();
        let id = created[0].id;

        let later = now + chrono::Duration::hours(7);
        let observed = svc.get_allocation(id, ActorRole::Admin, later).unwrap();
        assert_eq!(observed.allocation.status, AllocationStatus::Expired);

        let w = svc.store().withdrawal(w.id).unwrap();
        assert_eq!(w.assigned_amount, Decimal::ZERO);
        let d = svc.store().deposit(d.id).unwrap();
        assert_eq!(d.assigned_amount, Decimal::ZERO);
    }

    #[test]
    fn listing_observes_expiry_too() {
        let now = Utc::now();
        let mut svc = service();
        let w = svc
            .create_withdrawal(PartyId::new(), "USD", Decimal::new(500, 0), dest(), now)
            .unwrap();
        let d = svc
            .create_deposit(PartyId::new(), "USD", Decimal::new(500, 0), dest(), None, now)
            .unwrap();
        svc.assign(
            &AssignmentRequest {
                withdrawal_id: w.id,
                candidates: vec![CandidateSelection::greedy(d.id)],
            },
            now,
        )
        .unwrap();

        let later = now + chrono::Duration::days(1);
        let listed = svc.list_allocations(
            &AllocationFilter::default(),
            Page::default(),
            ActorRole::Admin,
            later,
        );
        assert_eq!(listed.total, 1);
        assert_eq!(
            listed.items[0].allocation.status,
            AllocationStatus::Expired
        );
    }
}
