//! The Ledger Store.
//!
//! Single source of truth for withdrawal requests, deposit candidates,
//! allocations, and the transaction journal. All mutations are atomic:
//! either the full operation succeeds or the store is unchanged. Records
//! are never deleted; terminal statuses preserve the audit history.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use opensettle_types::{
    AccountRef, Allocation, AllocationId, DepositCandidate, DepositId, EntityKind, EntityRef,
    LedgerEntry, LedgerEntryKind, PageConfig, Result, SettleError, WithdrawalId, WithdrawalRequest,
};
use rust_decimal::Decimal;

use crate::{
    filter::{AllocationFilter, DepositFilter, Page, Paged, WithdrawalFilter},
    journal::Journal,
};

/// One candidate consumption inside an [`AssignmentPlan`].
#[derive(Debug, Clone)]
pub struct PlannedConsumption {
    pub deposit_id: DepositId,
    /// The candidate version the planner read; re-checked at apply time.
    pub deposit_version: u64,
    /// Amount to consume from this candidate. Strictly positive.
    pub amount: Decimal,
}

/// A validated assignment, ready to commit as one atomic write.
///
/// Built by the assignment engine's pure planning step. The store
/// re-validates every precondition (versions included) before the first
/// write, so a plan computed against stale state fails with a conflict
/// and commits nothing.
#[derive(Debug, Clone)]
pub struct AssignmentPlan {
    pub withdrawal_id: WithdrawalId,
    /// The withdrawal version the planner read.
    pub withdrawal_version: u64,
    pub consumptions: Vec<PlannedConsumption>,
    /// The allocations to create, one per consumption, already in
    /// ASSIGNED state.
    pub allocations: Vec<Allocation>,
}

/// Side effect accompanying an allocation status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEffect {
    /// Status-only change (proof, confirmation, verification, dispute).
    None,
    /// Return the reserved amount to both sides (cancellation, expiry).
    Release,
    /// Move the reserved amount to settled on both sides (finalization).
    Settle,
}

/// In-memory ledger store with optimistic-concurrency guards.
#[derive(Debug)]
pub struct LedgerStore {
    withdrawals: HashMap<WithdrawalId, WithdrawalRequest>,
    deposits: HashMap<DepositId, DepositCandidate>,
    allocations: HashMap<AllocationId, Allocation>,
    journal: Journal,
    clearing_account: AccountRef,
}

impl LedgerStore {
    /// Create a store tagging journal entries to the given clearing
    /// account.
    #[must_use]
    pub fn new(clearing_account: AccountRef) -> Self {
        Self {
            withdrawals: HashMap::new(),
            deposits: HashMap::new(),
            allocations: HashMap::new(),
            journal: Journal::new(),
            clearing_account,
        }
    }

    // =====================================================================
    // Intake
    // =====================================================================

    /// Take a new withdrawal request onto the books.
    ///
    /// Records a positive `WITHDRAWAL` journal entry: the platform's
    /// receivable from the payer.
    pub fn create_withdrawal(&mut self, withdrawal: WithdrawalRequest) -> Result<WithdrawalId> {
        if withdrawal.requested_amount <= Decimal::ZERO {
            return Err(SettleError::InvalidAmount {
                reason: format!(
                    "withdrawal requested_amount must be positive, got {}",
                    withdrawal.requested_amount
                ),
            });
        }
        if !withdrawal.assigned_amount.is_zero() || !withdrawal.settled_amount.is_zero() {
            return Err(SettleError::InvalidAmount {
                reason: "new withdrawal must start with zero assigned/settled".to_string(),
            });
        }
        let id = withdrawal.id;
        if self.withdrawals.contains_key(&id) {
            return Err(SettleError::Internal(format!(
                "withdrawal id collision: {id}"
            )));
        }

        self.journal.record(LedgerEntry::new(
            self.clearing_account.clone(),
            withdrawal.asset.clone(),
            withdrawal.requested_amount,
            LedgerEntryKind::Withdrawal,
            EntityRef::new(EntityKind::Withdrawal, id.0.to_string()),
            withdrawal.created_at,
        ));
        self.withdrawals.insert(id, withdrawal);
        Ok(id)
    }

    /// Take a new deposit request onto the books.
    ///
    /// Records a negative `DEPOSIT` journal entry: the platform's payable
    /// to the receiver.
    pub fn create_deposit(&mut self, deposit: DepositCandidate) -> Result<DepositId> {
        if deposit.requested_amount <= Decimal::ZERO {
            return Err(SettleError::InvalidAmount {
                reason: format!(
                    "deposit requested_amount must be positive, got {}",
                    deposit.requested_amount
                ),
            });
        }
        if !deposit.assigned_amount.is_zero() || !deposit.settled_amount.is_zero() {
            return Err(SettleError::InvalidAmount {
                reason: "new deposit must start with zero assigned/settled".to_string(),
            });
        }
        let id = deposit.id;
        if self.deposits.contains_key(&id) {
            return Err(SettleError::Internal(format!("deposit id collision: {id}")));
        }

        self.journal.record(LedgerEntry::new(
            self.clearing_account.clone(),
            deposit.asset.clone(),
            -deposit.requested_amount,
            LedgerEntryKind::Deposit,
            EntityRef::new(EntityKind::Deposit, id.0.to_string()),
            deposit.created_at,
        ));
        self.deposits.insert(id, deposit);
        Ok(id)
    }

    /// Cancel a withdrawal request. Refused while any allocation still
    /// reserves part of it; cancel or expire those first.
    ///
    /// Records a reversing journal entry for the outstanding receivable.
    pub fn cancel_withdrawal(
        &mut self,
        id: WithdrawalId,
        expected_version: u64,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalRequest> {
        let withdrawal = self
            .withdrawals
            .get(&id)
            .ok_or(SettleError::WithdrawalNotFound(id))?;
        if withdrawal.version != expected_version {
            return Err(SettleError::StaleVersion {
                entity: "withdrawal",
                expected: expected_version,
                actual: withdrawal.version,
            });
        }
        if withdrawal.is_terminal() {
            return Err(SettleError::WithdrawalClosed {
                id,
                status: withdrawal.status(),
            });
        }
        if withdrawal.assigned_amount != withdrawal.settled_amount {
            return Err(SettleError::InvalidAmount {
                reason: format!(
                    "withdrawal {id} still has {} reserved by live allocations",
                    withdrawal.assigned_amount - withdrawal.settled_amount
                ),
            });
        }

        let outstanding = withdrawal.requested_amount - withdrawal.settled_amount;
        let asset = withdrawal.asset.clone();
        let withdrawal = self
            .withdrawals
            .get_mut(&id)
            .ok_or(SettleError::WithdrawalNotFound(id))?;
        withdrawal.cancelled = true;
        withdrawal.updated_at = now;
        withdrawal.version += 1;
        let result = withdrawal.clone();

        self.journal.record(LedgerEntry::new(
            self.clearing_account.clone(),
            asset,
            -outstanding,
            LedgerEntryKind::Withdrawal,
            EntityRef::new(EntityKind::Withdrawal, id.0.to_string()),
            now,
        ));
        Ok(result)
    }

    /// Cancel a deposit request. Refused while any allocation still
    /// reserves part of it.
    pub fn cancel_deposit(
        &mut self,
        id: DepositId,
        expected_version: u64,
        now: DateTime<Utc>,
    ) -> Result<DepositCandidate> {
        let deposit = self
            .deposits
            .get(&id)
            .ok_or(SettleError::DepositNotFound(id))?;
        if deposit.version != expected_version {
            return Err(SettleError::StaleVersion {
                entity: "deposit",
                expected: expected_version,
                actual: deposit.version,
            });
        }
        if deposit.is_terminal() {
            return Err(SettleError::DepositClosed {
                id,
                status: deposit.status(),
            });
        }
        if deposit.assigned_amount != deposit.settled_amount {
            return Err(SettleError::InvalidAmount {
                reason: format!(
                    "deposit {id} still has {} reserved by live allocations",
                    deposit.assigned_amount - deposit.settled_amount
                ),
            });
        }

        let outstanding = deposit.requested_amount - deposit.settled_amount;
        let asset = deposit.asset.clone();
        let deposit = self
            .deposits
            .get_mut(&id)
            .ok_or(SettleError::DepositNotFound(id))?;
        deposit.cancelled = true;
        deposit.updated_at = now;
        deposit.version += 1;
        let result = deposit.clone();

        self.journal.record(LedgerEntry::new(
            self.clearing_account.clone(),
            asset,
            outstanding,
            LedgerEntryKind::Deposit,
            EntityRef::new(EntityKind::Deposit, id.0.to_string()),
            now,
        ));
        Ok(result)
    }

    // =====================================================================
    // Reads
    // =====================================================================

    pub fn withdrawal(&self, id: WithdrawalId) -> Result<WithdrawalRequest> {
        self.withdrawals
            .get(&id)
            .cloned()
            .ok_or(SettleError::WithdrawalNotFound(id))
    }

    pub fn deposit(&self, id: DepositId) -> Result<DepositCandidate> {
        self.deposits
            .get(&id)
            .cloned()
            .ok_or(SettleError::DepositNotFound(id))
    }

    pub fn allocation(&self, id: AllocationId) -> Result<Allocation> {
        self.allocations
            .get(&id)
            .cloned()
            .ok_or(SettleError::AllocationNotFound(id))
    }

    /// All allocations currently due for expiry: still in an expirable
    /// status with a lapsed deadline.
    #[must_use]
    pub fn allocations_due_for_expiry(&self, now: DateTime<Utc>) -> Vec<Allocation> {
        let mut due: Vec<Allocation> = self
            .allocations
            .values()
            .filter(|a| a.is_expiry_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.id.cmp(&b.id));
        due
    }

    #[must_use]
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    #[must_use]
    pub fn clearing_account(&self) -> &AccountRef {
        &self.clearing_account
    }

    /// Record a manual transfer entry (operator adjustments).
    pub fn record_transfer(
        &mut self,
        account: AccountRef,
        asset: impl Into<String>,
        amount: Decimal,
        entity: EntityRef,
        now: DateTime<Utc>,
    ) {
        self.journal.record(LedgerEntry::new(
            account,
            asset,
            amount,
            LedgerEntryKind::Transfer,
            entity,
            now,
        ));
    }

    // =====================================================================
    // Assignment commit
    // =====================================================================

    /// Commit a validated assignment plan as one atomic write.
    ///
    /// Re-validates everything against current state first: versions
    /// (the optimistic-concurrency guard), terminal statuses, and
    /// capacity on both sides. A losing concurrent caller gets
    /// `OS_ERR_402` and the store is untouched — never a silently wrong
    /// partial assignment.
    pub fn apply_assignment(
        &mut self,
        plan: &AssignmentPlan,
        now: DateTime<Utc>,
    ) -> Result<Vec<Allocation>> {
        // ---- Validation phase: no writes until everything passes. ----
        let withdrawal = self
            .withdrawals
            .get(&plan.withdrawal_id)
            .ok_or(SettleError::WithdrawalNotFound(plan.withdrawal_id))?;
        if withdrawal.version != plan.withdrawal_version {
            return Err(SettleError::StaleVersion {
                entity: "withdrawal",
                expected: plan.withdrawal_version,
                actual: withdrawal.version,
            });
        }
        if withdrawal.is_terminal() {
            return Err(SettleError::WithdrawalClosed {
                id: withdrawal.id,
                status: withdrawal.status(),
            });
        }

        let total: Decimal = plan.consumptions.iter().map(|c| c.amount).sum();
        if total <= Decimal::ZERO {
            return Err(SettleError::EmptyAssignment);
        }
        if total > withdrawal.remaining_to_assign() {
            return Err(SettleError::OverAssignment {
                requested: total,
                remaining: withdrawal.remaining_to_assign(),
            });
        }

        let mut seen = HashSet::new();
        for consumption in &plan.consumptions {
            if !seen.insert(consumption.deposit_id) {
                return Err(SettleError::DuplicateCandidate(consumption.deposit_id));
            }
            let deposit = self
                .deposits
                .get(&consumption.deposit_id)
                .ok_or(SettleError::DepositNotFound(consumption.deposit_id))?;
            if deposit.version != consumption.deposit_version {
                return Err(SettleError::StaleVersion {
                    entity: "deposit",
                    expected: consumption.deposit_version,
                    actual: deposit.version,
                });
            }
            if deposit.is_terminal() {
                return Err(SettleError::DepositClosed {
                    id: deposit.id,
                    status: deposit.status(),
                });
            }
            if consumption.amount <= Decimal::ZERO {
                return Err(SettleError::InvalidAmount {
                    reason: format!(
                        "consumption from {} must be positive, got {}",
                        deposit.id, consumption.amount
                    ),
                });
            }
            if consumption.amount > deposit.remaining_amount() {
                return Err(SettleError::InvalidAmount {
                    reason: format!(
                        "consumption {} exceeds remaining {} on {}",
                        consumption.amount,
                        deposit.remaining_amount(),
                        deposit.id
                    ),
                });
            }
        }
        for allocation in &plan.allocations {
            if self.allocations.contains_key(&allocation.id) {
                return Err(SettleError::Internal(format!(
                    "allocation id collision: {}",
                    allocation.id
                )));
            }
        }

        // ---- Commit phase: infallible from here on. ----
        let withdrawal = self
            .withdrawals
            .get_mut(&plan.withdrawal_id)
            .ok_or(SettleError::WithdrawalNotFound(plan.withdrawal_id))?;
        withdrawal.assigned_amount += total;
        withdrawal.updated_at = now;
        withdrawal.version += 1;

        for consumption in &plan.consumptions {
            let deposit = self
                .deposits
                .get_mut(&consumption.deposit_id)
                .ok_or(SettleError::DepositNotFound(consumption.deposit_id))?;
            deposit.assigned_amount += consumption.amount;
            deposit.updated_at = now;
            deposit.version += 1;
        }

        let mut created = Vec::with_capacity(plan.allocations.len());
        for allocation in &plan.allocations {
            self.allocations.insert(allocation.id, allocation.clone());
            created.push(allocation.clone());
        }

        tracing::info!(
            withdrawal = %plan.withdrawal_id,
            allocations = created.len(),
            total = %total,
            "Assignment committed"
        );
        Ok(created)
    }

    // =====================================================================
    // Transition commit
    // =====================================================================

    /// Commit an allocation status transition, with its side effect,
    /// as one atomic write.
    ///
    /// `updated` is the caller's mutated copy carrying the version it
    /// read; a concurrent writer having bumped the stored version in the
    /// meantime yields `OS_ERR_402` and no change.
    pub fn commit_transition(
        &mut self,
        updated: Allocation,
        effect: TransitionEffect,
        now: DateTime<Utc>,
    ) -> Result<Allocation> {
        // ---- Validation phase. ----
        let current = self
            .allocations
            .get(&updated.id)
            .ok_or(SettleError::AllocationNotFound(updated.id))?;
        if current.version != updated.version {
            return Err(SettleError::StaleVersion {
                entity: "allocation",
                expected: updated.version,
                actual: current.version,
            });
        }

        let amount = updated.amount;
        let withdrawal = self
            .withdrawals
            .get(&updated.withdrawal_id)
            .ok_or(SettleError::WithdrawalNotFound(updated.withdrawal_id))?;
        let deposit = self
            .deposits
            .get(&updated.deposit_id)
            .ok_or(SettleError::DepositNotFound(updated.deposit_id))?;

        match effect {
            TransitionEffect::None => {}
            TransitionEffect::Release => {
                if withdrawal.assigned_amount - amount < withdrawal.settled_amount
                    || deposit.assigned_amount - amount < deposit.settled_amount
                {
                    return Err(SettleError::Internal(format!(
                        "release of {amount} would break assigned/settled invariant on {}",
                        updated.id
                    )));
                }
            }
            TransitionEffect::Settle => {
                if withdrawal.settled_amount + amount > withdrawal.assigned_amount
                    || deposit.settled_amount + amount > deposit.assigned_amount
                {
                    return Err(SettleError::Internal(format!(
                        "settlement of {amount} would exceed assigned on {}",
                        updated.id
                    )));
                }
            }
        }

        // ---- Commit phase. ----
        let mut stored = updated;
        stored.version += 1;
        let result = stored.clone();
        self.allocations.insert(stored.id, stored);

        match effect {
            TransitionEffect::None => {}
            TransitionEffect::Release => {
                let withdrawal = self
                    .withdrawals
                    .get_mut(&result.withdrawal_id)
                    .ok_or(SettleError::WithdrawalNotFound(result.withdrawal_id))?;
                withdrawal.assigned_amount -= amount;
                withdrawal.updated_at = now;
                withdrawal.version += 1;

                let deposit = self
                    .deposits
                    .get_mut(&result.deposit_id)
                    .ok_or(SettleError::DepositNotFound(result.deposit_id))?;
                deposit.assigned_amount -= amount;
                deposit.updated_at = now;
                deposit.version += 1;

                tracing::info!(
                    allocation = %result.id,
                    amount = %amount,
                    status = %result.status,
                    "Reserved amount released to both sides"
                );
            }
            TransitionEffect::Settle => {
                let withdrawal = self
                    .withdrawals
                    .get_mut(&result.withdrawal_id)
                    .ok_or(SettleError::WithdrawalNotFound(result.withdrawal_id))?;
                withdrawal.settled_amount += amount;
                withdrawal.updated_at = now;
                withdrawal.version += 1;

                let deposit = self
                    .deposits
                    .get_mut(&result.deposit_id)
                    .ok_or(SettleError::DepositNotFound(result.deposit_id))?;
                deposit.settled_amount += amount;
                deposit.updated_at = now;
                deposit.version += 1;

                // Settlement extinguishes the receivable (withdrawal side)
                // and the payable (deposit side) in the same instant.
                self.journal.record(LedgerEntry::new(
                    self.clearing_account.clone(),
                    result.asset.clone(),
                    -amount,
                    LedgerEntryKind::Settlement,
                    EntityRef::new(EntityKind::Withdrawal, result.withdrawal_id.0.to_string()),
                    now,
                ));
                self.journal.record(LedgerEntry::new(
                    self.clearing_account.clone(),
                    result.asset.clone(),
                    amount,
                    LedgerEntryKind::Settlement,
                    EntityRef::new(EntityKind::Deposit, result.deposit_id.0.to_string()),
                    now,
                ));

                tracing::info!(
                    allocation = %result.id,
                    amount = %amount,
                    "Allocation settled"
                );
            }
        }

        Ok(result)
    }

    // =====================================================================
    // Listings
    // =====================================================================

    /// List withdrawals, newest first, filtered and paginated.
    #[must_use]
    pub fn list_withdrawals(
        &self,
        filter: &WithdrawalFilter,
        page: Page,
        cfg: PageConfig,
    ) -> Paged<WithdrawalRequest> {
        let mut items: Vec<WithdrawalRequest> = self
            .withdrawals
            .values()
            .filter(|w| filter.matches(w))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.id.cmp(&a.id));
        paginate(items, page, cfg)
    }

    /// List deposit candidates eligible for a withdrawal: same asset,
    /// not terminal, not past their own deadline, with remaining
    /// capacity. Newest first.
    pub fn list_candidates_for(
        &self,
        withdrawal_id: WithdrawalId,
        filter: &DepositFilter,
        page: Page,
        cfg: PageConfig,
        now: DateTime<Utc>,
    ) -> Result<Paged<DepositCandidate>> {
        let withdrawal = self.withdrawal(withdrawal_id)?;
        let mut items: Vec<DepositCandidate> = self
            .deposits
            .values()
            .filter(|d| {
                d.asset == withdrawal.asset
                    && !d.is_terminal()
                    && !d.is_expired(now)
                    && d.remaining_amount() > Decimal::ZERO
                    && filter.matches(d)
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(paginate(items, page, cfg))
    }

    /// List allocations, newest first, filtered and paginated.
    #[must_use]
    pub fn list_allocations(
        &self,
        filter: &AllocationFilter,
        page: Page,
        cfg: PageConfig,
    ) -> Paged<Allocation> {
        let mut items: Vec<Allocation> = self
            .allocations
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.id.cmp(&a.id));
        paginate(items, page, cfg)
    }
}

fn paginate<T>(items: Vec<T>, page: Page, cfg: PageConfig) -> Paged<T> {
    let total = items.len();
    let size = page.size(cfg);
    let items = items
        .into_iter()
        .skip(page.offset)
        .take(size)
        .collect();
    Paged {
        items,
        total,
        offset: page.offset,
    }
}
