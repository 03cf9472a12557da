//! Listing filters and pagination.

use chrono::{DateTime, Utc};
use opensettle_types::{
    Allocation, AllocationStatus, DepositCandidate, DepositId, DepositStatus, PageConfig,
    WithdrawalId, WithdrawalRequest, WithdrawalStatus,
};
use rust_decimal::Decimal;

/// Offset/limit pagination request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub offset: usize,
    /// Requested page size; `None` uses the configured default.
    pub limit: Option<usize>,
}

impl Page {
    /// Resolve the effective page size, clamped to the configured cap.
    #[must_use]
    pub fn size(&self, cfg: PageConfig) -> usize {
        self.limit.unwrap_or(cfg.default_size).min(cfg.max_size)
    }
}

/// One page of results plus the unpaginated total.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub offset: usize,
}

/// Filter for withdrawal listings. All fields are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct WithdrawalFilter {
    pub status: Option<WithdrawalStatus>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
}

impl WithdrawalFilter {
    #[must_use]
    pub fn matches(&self, w: &WithdrawalRequest) -> bool {
        self.status.is_none_or(|s| w.status() == s)
            && self.created_from.is_none_or(|t| w.created_at >= t)
            && self.created_to.is_none_or(|t| w.created_at <= t)
            && self.min_amount.is_none_or(|a| w.requested_amount >= a)
            && self.max_amount.is_none_or(|a| w.requested_amount <= a)
    }
}

/// Filter for deposit-candidate listings.
#[derive(Debug, Clone, Default)]
pub struct DepositFilter {
    pub status: Option<DepositStatus>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    /// Only candidates with nothing consumed yet.
    pub fully_available: bool,
}

impl DepositFilter {
    #[must_use]
    pub fn matches(&self, d: &DepositCandidate) -> bool {
        self.status.is_none_or(|s| d.status() == s)
            && self.created_from.is_none_or(|t| d.created_at >= t)
            && self.created_to.is_none_or(|t| d.created_at <= t)
            && self.min_amount.is_none_or(|a| d.requested_amount >= a)
            && self.max_amount.is_none_or(|a| d.requested_amount <= a)
            && (!self.fully_available || d.is_fully_available())
    }
}

/// Filter for allocation listings.
#[derive(Debug, Clone, Default)]
pub struct AllocationFilter {
    pub status: Option<AllocationStatus>,
    pub withdrawal_id: Option<WithdrawalId>,
    pub deposit_id: Option<DepositId>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl AllocationFilter {
    #[must_use]
    pub fn matches(&self, a: &Allocation) -> bool {
        self.status.is_none_or(|s| a.status == s)
            && self.withdrawal_id.is_none_or(|id| a.withdrawal_id == id)
            && self.deposit_id.is_none_or(|id| a.deposit_id == id)
            && self.created_from.is_none_or(|t| a.created_at >= t)
            && self.created_to.is_none_or(|t| a.created_at <= t)
    }
}
