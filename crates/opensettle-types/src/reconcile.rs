//! Reconciliation types: external documents and the balance diff.
//!
//! A [`BalanceRecord`] is recomputed on demand from the internal journal
//! and the external system's reported balance. It is never persisted as a
//! source of truth, and a nonzero difference is a signal to investigate,
//! not an error state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountRef, Asset, EntityRef, LedgerEntry};

/// Posting status of an external accounting document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentStatus {
    Posted,
    Pending,
    Failed,
    Cancelled,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Posted => write!(f, "POSTED"),
            Self::Pending => write!(f, "PENDING"),
            Self::Failed => write!(f, "FAILED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// One line of an external accounting document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLine {
    pub account: AccountRef,
    pub asset: Asset,
    pub amount: Decimal,
    pub memo: Option<String>,
}

/// A document as the external accounting system reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalDocument {
    pub document_number: String,
    pub date: DateTime<Utc>,
    pub status: DocumentStatus,
    pub total_amount: Decimal,
    pub lines: Vec<DocumentLine>,
    /// The internal entity this document was posted for, if linked.
    pub entity: Option<EntityRef>,
}

impl ExternalDocument {
    /// Whether any line touches the given account.
    #[must_use]
    pub fn touches(&self, account: &AccountRef) -> bool {
        self.lines.iter().any(|line| &line.account == account)
    }
}

/// The internal-vs-external balance comparison for one (account, asset).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub account: AccountRef,
    pub asset: Asset,
    /// Sum of the internal journal's entries for this account/asset.
    pub balance_internal: Decimal,
    /// Balance the external system reports.
    pub balance_external: Decimal,
    /// `balance_external - balance_internal`. Nonzero is a signal, not
    /// an error, until investigated.
    pub difference: Decimal,
    pub last_synced_at: DateTime<Utc>,
}

impl BalanceRecord {
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.difference.is_zero()
    }
}

/// The full reconciliation result for one account: the balance triple
/// plus the audit trail explaining any difference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub record: BalanceRecord,
    /// External documents touching the account in the comparison window.
    pub documents: Vec<ExternalDocument>,
    /// Internal entries for the account in the comparison window.
    pub entries: Vec<LedgerEntry>,
}
