//! Internal ledger journal entries.
//!
//! Every committed money movement the platform tracks internally is one
//! signed entry tagged to an external-system account. The reconciliation
//! engine sums these per (account, asset) and compares against the
//! external system's reported balance.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountRef, Asset, EntryId};

/// The kind of internal transaction an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerEntryKind {
    /// A finalized allocation settled funds.
    Settlement,
    /// A deposit request was taken onto the books.
    Deposit,
    /// A withdrawal request was taken onto the books.
    Withdrawal,
    /// A manual or inter-account transfer.
    Transfer,
}

impl std::fmt::Display for LedgerEntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Settlement => write!(f, "SETTLEMENT"),
            Self::Deposit => write!(f, "DEPOSIT"),
            Self::Withdrawal => write!(f, "WITHDRAWAL"),
            Self::Transfer => write!(f, "TRANSFER"),
        }
    }
}

/// The kind of internal entity an external document can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Trade,
    Deposit,
    Withdrawal,
    Remittance,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trade => write!(f, "trade"),
            Self::Deposit => write!(f, "deposit"),
            Self::Withdrawal => write!(f, "withdrawal"),
            Self::Remittance => write!(f, "remittance"),
        }
    }
}

/// Reference to an internal entity, as the external accounting system
/// addresses it: `{type, id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    #[must_use]
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// One committed internal transaction.
///
/// `amount` is signed: positive entries increase the account's internal
/// balance, negative entries decrease it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub account: AccountRef,
    pub asset: Asset,
    pub amount: Decimal,
    pub kind: LedgerEntryKind,
    /// The internal entity that produced this entry.
    pub entity: EntityRef,
    pub recorded_at: DateTime<Utc>,
}

impl LedgerEntry {
    #[must_use]
    pub fn new(
        account: AccountRef,
        asset: impl Into<Asset>,
        amount: Decimal,
        kind: LedgerEntryKind,
        entity: EntityRef,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EntryId::new(),
            account,
            asset: asset.into(),
            amount,
            kind,
            entity,
            recorded_at,
        }
    }
}
