//! The reconciliation engine.
//!
//! For each (account, asset): sum the internal journal, fetch the
//! external balance, surface `difference = external - internal` with the
//! documents and internal entries touching the account in the window.
//! Internal state is snapshotted before the network fetch, so no ledger
//! borrow is held while waiting on the external system.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use opensettle_types::{
    AccountRef, Asset, BalanceRecord, ReconciliationReport, Result, RetryConfig,
};

use opensettle_ledger::Journal;

use crate::{client::AccountingSystem, retry::RetryPolicy};

/// Computes internal-vs-external balance diffs on demand.
///
/// Rerunning a reconciliation with an unchanged ledger yields an
/// identical difference; the only mutation anywhere is this engine's
/// per-account `last_synced_at` marker.
pub struct ReconciliationEngine<C> {
    client: C,
    retry: RetryPolicy,
    last_synced: HashMap<(AccountRef, Asset), DateTime<Utc>>,
}

impl<C: AccountingSystem> ReconciliationEngine<C> {
    #[must_use]
    pub fn new(client: C, retry: RetryConfig) -> Self {
        Self {
            client,
            retry: RetryPolicy::new(retry),
            last_synced: HashMap::new(),
        }
    }

    /// When this engine last reconciled the given (account, asset).
    #[must_use]
    pub fn last_synced_at(&self, account: &AccountRef, asset: &Asset) -> Option<DateTime<Utc>> {
        self.last_synced
            .get(&(account.clone(), asset.clone()))
            .copied()
    }

    /// Reconcile one (account, asset) against the external system.
    ///
    /// `window_start` bounds the audit trail (documents and internal
    /// entries listed in the report), not the balances, which are
    /// all-time sums on both sides.
    ///
    /// # Errors
    /// `OS_ERR_501` when the external system stays unreachable through
    /// the bounded retry schedule. The internal ledger is never mutated
    /// either way.
    pub async fn reconcile(
        &mut self,
        journal: &Journal,
        account: &AccountRef,
        asset: &Asset,
        window_start: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<ReconciliationReport> {
        // Snapshot the internal side first; nothing internal is borrowed
        // across the fetch below.
        let balance_internal = journal.balance_for(account, asset);
        let entries = journal.entries_for(account, asset, window_start);

        let balance_external = self
            .retry
            .run("fetch_balance", || {
                self.client.fetch_balance(account, asset)
            })
            .await?;
        let documents = self
            .retry
            .run("list_documents", || {
                self.client.list_documents(account, window_start)
            })
            .await?;

        let difference = balance_external - balance_internal;
        if difference.is_zero() {
            tracing::info!(
                account = %account,
                asset = %asset,
                balance = %balance_internal,
                "Reconciliation balanced"
            );
        } else {
            tracing::warn!(
                account = %account,
                asset = %asset,
                internal = %balance_internal,
                external = %balance_external,
                difference = %difference,
                "Reconciliation difference detected"
            );
        }

        self.last_synced
            .insert((account.clone(), asset.clone()), now);

        Ok(ReconciliationReport {
            record: BalanceRecord {
                account: account.clone(),
                asset: asset.clone(),
                balance_internal,
                balance_external,
                difference,
                last_synced_at: now,
            },
            documents,
            entries,
        })
    }

    /// Trace one internal entity: the documents the external system
    /// posted for it, retried like any other fetch.
    pub async fn trace_entity(
        &self,
        entity: &opensettle_types::EntityRef,
    ) -> Result<Vec<opensettle_types::ExternalDocument>> {
        self.retry
            .run("documents_for_entity", || {
                self.client.documents_for_entity(entity)
            })
            .await
    }

    /// Quick consistency check: internal and external agree exactly.
    pub async fn is_balanced(
        &mut self,
        journal: &Journal,
        account: &AccountRef,
        asset: &Asset,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let report = self.reconcile(journal, account, asset, None, now).await?;
        Ok(report.record.is_balanced())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryAccounting;
    use opensettle_types::{
        DocumentLine, DocumentStatus, EntityKind, EntityRef, ExternalDocument, LedgerEntry,
        LedgerEntryKind, SettleError,
    };
    use rust_decimal::Decimal;

    fn account() -> AccountRef {
        AccountRef::new("OPS-CLEARING")
    }

    fn usd() -> Asset {
        "USD".to_string()
    }

    fn journal_with(amounts: &[(i64, DateTime<Utc>)]) -> Journal {
        let mut journal = Journal::new();
        for (amount, at) in amounts {
            journal.record(LedgerEntry::new(
                account(),
                "USD",
                Decimal::new(*amount, 0),
                LedgerEntryKind::Transfer,
                EntityRef::new(EntityKind::Remittance, "rm-1"),
                *at,
            ));
        }
        journal
    }

    fn external_doc(number: &str, amount: i64, date: DateTime<Utc>) -> ExternalDocument {
        ExternalDocument {
            document_number: number.to_string(),
            date,
            status: DocumentStatus::Posted,
            total_amount: Decimal::new(amount, 0),
            lines: vec![DocumentLine {
                account: account(),
                asset: usd(),
                amount: Decimal::new(amount, 0),
                memo: None,
            }],
            entity: None,
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    #[tokio::test]
    async fn difference_surfaces_missing_external_entry() {
        // Internal 50,000,000 vs external 50,250,000: difference
        // 250,000, with the post-window documents listed as the trail.
        let now = Utc::now();
        let journal = journal_with(&[(50_000_000, now - chrono::Duration::days(2))]);

        let mut ext = InMemoryAccounting::new();
        ext.set_balance(account(), "USD", Decimal::new(50_250_000, 0));
        ext.add_document(external_doc(
            "DOC-NEW",
            250_000,
            now - chrono::Duration::hours(1),
        ));

        let mut engine = ReconciliationEngine::new(ext, fast_retry());
        let report = engine
            .reconcile(
                &journal,
                &account(),
                &usd(),
                Some(now - chrono::Duration::days(1)),
                now,
            )
            .await
            .unwrap();

        assert_eq!(report.record.difference, Decimal::new(250_000, 0));
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].document_number, "DOC-NEW");
        // The internal entry predates the window.
        assert!(report.entries.is_empty());
        assert_eq!(report.record.last_synced_at, now);
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let now = Utc::now();
        let journal = journal_with(&[(1_000, now)]);
        let mut ext = InMemoryAccounting::new();
        ext.set_balance(account(), "USD", Decimal::new(1_200, 0));

        let mut engine = ReconciliationEngine::new(ext, fast_retry());
        let first = engine
            .reconcile(&journal, &account(), &usd(), None, now)
            .await
            .unwrap();
        let second = engine
            .reconcile(&journal, &account(), &usd(), None, now)
            .await
            .unwrap();

        assert_eq!(first.record.difference, second.record.difference);
        assert_eq!(first.record.balance_internal, second.record.balance_internal);
    }

    #[tokio::test]
    async fn balanced_when_sides_agree() {
        let now = Utc::now();
        let journal = journal_with(&[(700, now), (-200, now)]);
        let mut ext = InMemoryAccounting::new();
        ext.set_balance(account(), "USD", Decimal::new(500, 0));

        let mut engine = ReconciliationEngine::new(ext, fast_retry());
        assert!(
            engine
                .is_balanced(&journal, &account(), &usd(), now)
                .await
                .unwrap()
        );
        assert_eq!(engine.last_synced_at(&account(), &usd()), Some(now));
    }

    #[tokio::test]
    async fn transient_outage_is_retried() {
        let now = Utc::now();
        let journal = journal_with(&[(100, now)]);
        let mut ext = InMemoryAccounting::new();
        ext.set_balance(account(), "USD", Decimal::new(100, 0));
        ext.fail_next(2);

        let mut engine = ReconciliationEngine::new(ext, fast_retry());
        let report = engine
            .reconcile(&journal, &account(), &usd(), None, now)
            .await
            .unwrap();
        assert!(report.record.is_balanced());
    }

    #[tokio::test]
    async fn sustained_outage_reports_unavailable() {
        let now = Utc::now();
        let journal = journal_with(&[(100, now)]);
        let ext = InMemoryAccounting::new();
        ext.fail_next(10);

        let mut engine = ReconciliationEngine::new(ext, fast_retry());
        let err = engine
            .reconcile(&journal, &account(), &usd(), None, now)
            .await
            .unwrap_err();
        assert!(matches!(err, SettleError::ExternalUnavailable { .. }));
        // Failed runs do not advance the sync marker.
        assert_eq!(engine.last_synced_at(&account(), &usd()), None);
    }

    #[tokio::test]
    async fn trace_entity_lists_linked_documents() {
        let now = Utc::now();
        let mut ext = InMemoryAccounting::new();
        let mut doc = external_doc("DOC-1", 300, now);
        doc.entity = Some(EntityRef::new(EntityKind::Withdrawal, "wd-9"));
        ext.add_document(doc);

        let engine = ReconciliationEngine::new(ext, fast_retry());
        let docs = engine
            .trace_entity(&EntityRef::new(EntityKind::Withdrawal, "wd-9"))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
    }
}
