//! Assignment engine: validate and commit withdrawal/candidate pairings.
//!
//! Planning is pure: [`plan_assignment`] computes the consumptions and
//! the allocations to create from the records the caller read, with no
//! side effects. Committing goes through the ledger store's
//! `apply_assignment`, which re-validates versions so a concurrent
//! caller cannot over-commit capacity.
//!
//! Candidate *selection* policy (which candidates, in which order) is
//! the caller's: the engine validates and commits the caller-supplied
//! ordered list, it never ranks.

use chrono::{DateTime, Utc};
use opensettle_types::{
    Allocation, AllocationId, AllocationStatus, DepositCandidate, DepositId, EngineConfig,
    PaymentCode, Result, SettleError, TransitionTimestamps, WithdrawalId, WithdrawalRequest,
};
use rust_decimal::Decimal;

use opensettle_ledger::{AssignmentPlan, LedgerStore, PlannedConsumption};

/// One candidate in an assignment call.
#[derive(Debug, Clone)]
pub struct CandidateSelection {
    pub deposit_id: DepositId,
    /// `None`: consume up to what the candidate can supply, stopping
    /// once the withdrawal's remaining-to-assign reaches zero.
    /// `Some(x)`: consume exactly `x`; if `x` does not fit on either
    /// side, the whole call is rejected and nothing is committed.
    pub amount: Option<Decimal>,
}

impl CandidateSelection {
    /// Greedy selection: consume up to availability.
    #[must_use]
    pub fn greedy(deposit_id: DepositId) -> Self {
        Self {
            deposit_id,
            amount: None,
        }
    }

    /// Exact selection: consume exactly `amount` or fail the call.
    #[must_use]
    pub fn exact(deposit_id: DepositId, amount: Decimal) -> Self {
        Self {
            deposit_id,
            amount: Some(amount),
        }
    }
}

/// An assignment call: one withdrawal, an ordered candidate list.
#[derive(Debug, Clone)]
pub struct AssignmentRequest {
    pub withdrawal_id: WithdrawalId,
    pub candidates: Vec<CandidateSelection>,
}

/// Plan an assignment as a pure function of the records read.
///
/// `candidates` must be in the same order as `request.candidates` and
/// hold the corresponding records. Walks the selections in caller order,
/// consuming greedily or exactly per selection, and builds one ASSIGNED
/// allocation per positive consumption with `expires_at = now + window`
/// and a deterministic payment code.
///
/// # Errors
/// Any precondition failure rejects the whole plan:
/// - `OS_ERR_101`/`OS_ERR_201` terminal withdrawal/candidate
/// - `OS_ERR_202` asset mismatch, `OS_ERR_203` lapsed candidate deadline
/// - `OS_ERR_300` explicit amounts exceeding remaining capacity
/// - `OS_ERR_301` non-positive or oversized explicit amount
/// - `OS_ERR_302` nothing to consume, `OS_ERR_303` duplicate candidate
pub fn plan_assignment(
    withdrawal: &WithdrawalRequest,
    candidates: &[DepositCandidate],
    request: &AssignmentRequest,
    window: chrono::Duration,
    now: DateTime<Utc>,
) -> Result<AssignmentPlan> {
    if withdrawal.is_terminal() {
        return Err(SettleError::WithdrawalClosed {
            id: withdrawal.id,
            status: withdrawal.status(),
        });
    }

    let mut seen = std::collections::HashSet::new();
    for selection in &request.candidates {
        if !seen.insert(selection.deposit_id) {
            return Err(SettleError::DuplicateCandidate(selection.deposit_id));
        }
    }

    // Explicit demands are checked as a whole up front: a caller
    // asking for more than the withdrawal can take is rejected before
    // any per-candidate walk, and the call commits nothing.
    let explicit_total: Decimal = request
        .candidates
        .iter()
        .filter_map(|s| s.amount)
        .sum();
    if explicit_total > withdrawal.remaining_to_assign() {
        return Err(SettleError::OverAssignment {
            requested: explicit_total,
            remaining: withdrawal.remaining_to_assign(),
        });
    }

    let mut remaining = withdrawal.remaining_to_assign();
    let mut consumptions = Vec::new();
    let mut allocations = Vec::new();

    for (selection, deposit) in request.candidates.iter().zip(candidates) {
        debug_assert_eq!(selection.deposit_id, deposit.id);
        if deposit.is_terminal() {
            return Err(SettleError::DepositClosed {
                id: deposit.id,
                status: deposit.status(),
            });
        }
        if deposit.is_expired(now) {
            return Err(SettleError::DepositExpired(deposit.id));
        }
        if deposit.asset != withdrawal.asset {
            return Err(SettleError::AssetMismatch {
                expected: withdrawal.asset.clone(),
                actual: deposit.asset.clone(),
            });
        }

        let amount = match selection.amount {
            Some(exact) => {
                if exact <= Decimal::ZERO {
                    return Err(SettleError::InvalidAmount {
                        reason: format!("explicit amount for {} must be positive", deposit.id),
                    });
                }
                if exact > deposit.remaining_amount() {
                    return Err(SettleError::InvalidAmount {
                        reason: format!(
                            "explicit amount {exact} exceeds remaining {} on {}",
                            deposit.remaining_amount(),
                            deposit.id
                        ),
                    });
                }
                if exact > remaining {
                    return Err(SettleError::OverAssignment {
                        requested: exact + (withdrawal.remaining_to_assign() - remaining),
                        remaining: withdrawal.remaining_to_assign(),
                    });
                }
                exact
            }
            // Greedy: take what fits, skip once the withdrawal is full.
            None => deposit.remaining_amount().min(remaining),
        };

        if amount.is_zero() {
            continue;
        }

        remaining -= amount;
        consumptions.push(PlannedConsumption {
            deposit_id: deposit.id,
            deposit_version: deposit.version,
            amount,
        });

        let id = AllocationId::new();
        allocations.push(Allocation {
            id,
            withdrawal_id: withdrawal.id,
            deposit_id: deposit.id,
            payer: withdrawal.payer,
            receiver: deposit.receiver,
            asset: withdrawal.asset.clone(),
            amount,
            status: AllocationStatus::Assigned,
            expires_at: now + window,
            payment_code: PaymentCode::for_allocation(id),
            // Frozen from the candidate at creation: later edits to the
            // receiver's default destination never move this allocation.
            destination: deposit.destination.clone(),
            payment: None,
            attachments: Vec::new(),
            admin_note: None,
            timestamps: TransitionTimestamps::default(),
            created_at: now,
            version: 0,
        });
    }

    if consumptions.is_empty() {
        return Err(SettleError::EmptyAssignment);
    }

    Ok(AssignmentPlan {
        withdrawal_id: withdrawal.id,
        withdrawal_version: withdrawal.version,
        consumptions,
        allocations,
    })
}

/// Stateless engine wrapping plan + commit with the configured window.
#[derive(Debug, Clone)]
pub struct AssignmentEngine {
    window: chrono::Duration,
}

impl AssignmentEngine {
    #[must_use]
    pub fn new(window: chrono::Duration) -> Self {
        Self { window }
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.allocation_window())
    }

    /// Validate and commit an assignment against current store state.
    ///
    /// Reads, plans (pure), then commits through the store's
    /// version-guarded `apply_assignment`. A losing concurrent caller
    /// observes `OS_ERR_402` and may retry against fresh state.
    pub fn assign(
        &self,
        store: &mut LedgerStore,
        request: &AssignmentRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<Allocation>> {
        let withdrawal = store.withdrawal(request.withdrawal_id)?;
        let mut candidates = Vec::with_capacity(request.candidates.len());
        for selection in &request.candidates {
            candidates.push(store.deposit(selection.deposit_id)?);
        }

        let plan = plan_assignment(&withdrawal, &candidates, request, self.window, now)?;
        let created = store.apply_assignment(&plan, now)?;

        tracing::info!(
            withdrawal = %request.withdrawal_id,
            allocations = created.len(),
            "Assignment succeeded"
        );
        Ok(created)
    }
}
