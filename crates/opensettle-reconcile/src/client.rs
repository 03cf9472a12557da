//! The consumed surface of the external accounting system.
//!
//! Only the balance/document API is modeled; the external system's
//! internals are out of scope. Production implementations are network
//! clients; [`InMemoryAccounting`] is the seeded stand-in for tests and
//! local runs.

use chrono::{DateTime, Utc};
use opensettle_types::{AccountRef, Asset, EntityRef, ExternalDocument, Result};
use rust_decimal::Decimal;

/// Read access to the external accounting system of record.
///
/// All methods are fallible with `OS_ERR_500`-class errors; the
/// reconciliation engine wraps calls in its bounded retry schedule.
pub trait AccountingSystem {
    /// Balance the external system reports for an (account, asset).
    fn fetch_balance(
        &self,
        account: &AccountRef,
        asset: &Asset,
    ) -> impl Future<Output = Result<Decimal>> + Send;

    /// Documents touching an account, dated at or after `since` when
    /// given.
    fn list_documents(
        &self,
        account: &AccountRef,
        since: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<Vec<ExternalDocument>>> + Send;

    /// Documents the external system posted for one internal entity.
    fn documents_for_entity(
        &self,
        entity: &EntityRef,
    ) -> impl Future<Output = Result<Vec<ExternalDocument>>> + Send;
}

/// In-memory stand-in for the external system, for tests and local
/// runs. Balances and documents are seeded by hand; failures can be
/// injected to exercise the retry schedule.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccounting {
    balances: std::collections::HashMap<(AccountRef, Asset), Decimal>,
    documents: Vec<ExternalDocument>,
    /// Errors to serve before succeeding, for retry tests.
    failures_remaining: std::sync::Arc<std::sync::atomic::AtomicU32>,
}

impl InMemoryAccounting {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&mut self, account: AccountRef, asset: impl Into<Asset>, amount: Decimal) {
        self.balances.insert((account, asset.into()), amount);
    }

    pub fn add_document(&mut self, document: ExternalDocument) {
        self.documents.push(document);
    }

    /// Make the next `count` calls fail, then recover.
    pub fn fail_next(&self, count: u32) {
        self.failures_remaining
            .store(count, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<()> {
        use std::sync::atomic::Ordering;
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(opensettle_types::SettleError::ExternalSystem {
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

impl AccountingSystem for InMemoryAccounting {
    async fn fetch_balance(&self, account: &AccountRef, asset: &Asset) -> Result<Decimal> {
        self.check_failure()?;
        Ok(self
            .balances
            .get(&(account.clone(), asset.clone()))
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn list_documents(
        &self,
        account: &AccountRef,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ExternalDocument>> {
        self.check_failure()?;
        Ok(self
            .documents
            .iter()
            .filter(|d| d.touches(account))
            .filter(|d| since.is_none_or(|t| d.date >= t))
            .cloned()
            .collect())
    }

    async fn documents_for_entity(&self, entity: &EntityRef) -> Result<Vec<ExternalDocument>> {
        self.check_failure()?;
        Ok(self
            .documents
            .iter()
            .filter(|d| d.entity.as_ref() == Some(entity))
            .cloned()
            .collect())
    }
}
