//! Internal transaction journal.
//!
//! Append-only list of committed, signed ledger entries. The
//! reconciliation engine sums these per (account, asset) to produce
//! `balance_internal`; nothing here is ever overwritten or deleted.

use chrono::{DateTime, Utc};
use opensettle_types::{AccountRef, Asset, LedgerEntry};
use rust_decimal::Decimal;

/// Append-only internal transaction journal.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Vec<LedgerEntry>,
}

impl Journal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a committed entry.
    pub fn record(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    /// Internal balance for an (account, asset): the sum of all signed
    /// entry amounts.
    #[must_use]
    pub fn balance_for(&self, account: &AccountRef, asset: &Asset) -> Decimal {
        self.entries
            .iter()
            .filter(|e| &e.account == account && &e.asset == asset)
            .map(|e| e.amount)
            .sum()
    }

    /// Entries for an (account, asset), optionally restricted to those
    /// recorded at or after `since`. Returned in recording order.
    #[must_use]
    pub fn entries_for(
        &self,
        account: &AccountRef,
        asset: &Asset,
        since: Option<DateTime<Utc>>,
    ) -> Vec<LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| &e.account == account && &e.asset == asset)
            .filter(|e| since.is_none_or(|t| e.recorded_at >= t))
            .cloned()
            .collect()
    }

    /// The instant of the newest entry for an (account, asset), if any.
    #[must_use]
    pub fn last_entry_at(&self, account: &AccountRef, asset: &Asset) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .filter(|e| &e.account == account && &e.asset == asset)
            .map(|e| e.recorded_at)
            .max()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opensettle_types::{EntityKind, EntityRef, LedgerEntryKind};

    fn entry(account: &AccountRef, amount: i64, at: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry::new(
            account.clone(),
            "USD",
            Decimal::new(amount, 0),
            LedgerEntryKind::Transfer,
            EntityRef::new(EntityKind::Remittance, "rm-1"),
            at,
        )
    }

    #[test]
    fn balance_sums_signed_amounts() {
        let account = AccountRef::new("OPS-CLEARING");
        let mut journal = Journal::new();
        let now = Utc::now();

        journal.record(entry(&account, 1000, now));
        journal.record(entry(&account, -300, now));
        journal.record(entry(&AccountRef::new("OPS-FEES"), 999, now));

        assert_eq!(
            journal.balance_for(&account, &"USD".to_string()),
            Decimal::new(700, 0)
        );
    }

    #[test]
    fn empty_account_balance_is_zero() {
        let journal = Journal::new();
        assert_eq!(
            journal.balance_for(&AccountRef::new("NOPE"), &"USD".to_string()),
            Decimal::ZERO
        );
    }

    #[test]
    fn entries_for_respects_since() {
        let account = AccountRef::new("OPS-CLEARING");
        let mut journal = Journal::new();
        let now = Utc::now();
        let earlier = now - chrono::Duration::hours(2);

        journal.record(entry(&account, 100, earlier));
        journal.record(entry(&account, 200, now));

        let all = journal.entries_for(&account, &"USD".to_string(), None);
        assert_eq!(all.len(), 2);

        let recent = journal.entries_for(
            &account,
            &"USD".to_string(),
            Some(now - chrono::Duration::hours(1)),
        );
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].amount, Decimal::new(200, 0));
    }

    #[test]
    fn last_entry_at_picks_newest() {
        let account = AccountRef::new("OPS-CLEARING");
        let mut journal = Journal::new();
        let now = Utc::now();
        let earlier = now - chrono::Duration::hours(2);

        assert_eq!(journal.last_entry_at(&account, &"USD".to_string()), None);

        journal.record(entry(&account, 100, now));
        journal.record(entry(&account, 100, earlier));
        assert_eq!(
            journal.last_entry_at(&account, &"USD".to_string()),
            Some(now)
        );
    }
}
