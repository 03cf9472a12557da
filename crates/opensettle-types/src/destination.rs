//! Masked payout destination descriptor.
//!
//! The full account number never enters this system — only the masked
//! tail. The file store and banking rail that hold the real account data
//! are external collaborators.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A masked bank destination the payer must pay into.
///
/// Frozen onto each allocation at creation time: later edits to the
/// receiver's default destination never move an in-flight allocation's
/// pay-into target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutDestination {
    /// Bank display name (e.g., "First National").
    pub bank: String,
    /// Masked account reference, keeping only the last four digits.
    pub account_masked: String,
    /// Account holder display name.
    pub holder: String,
}

impl PayoutDestination {
    /// Build a destination from a full account number, masking all but
    /// the last four digits.
    #[must_use]
    pub fn masked(
        bank: impl Into<String>,
        account_number: &str,
        holder: impl Into<String>,
    ) -> Self {
        let tail: String = account_number
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        Self {
            bank: bank.into(),
            account_masked: format!("****{tail}"),
            holder: holder.into(),
        }
    }
}

impl fmt::Display for PayoutDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.bank, self.account_masked, self.holder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_all_but_last_four() {
        let dest = PayoutDestination::masked("First National", "12345678901234", "A. Payer");
        assert_eq!(dest.account_masked, "****1234");
        assert!(!dest.account_masked.contains("5678"));
    }

    #[test]
    fn short_account_still_masked() {
        let dest = PayoutDestination::masked("Bank", "42", "B");
        assert_eq!(dest.account_masked, "****42");
    }

    #[test]
    fn display_contains_bank_and_tail() {
        let dest = PayoutDestination::masked("First National", "99887766", "A. Payer");
        let shown = format!("{dest}");
        assert!(shown.contains("First National"));
        assert!(shown.contains("****7766"));
    }

    #[test]
    fn serde_roundtrip() {
        let dest = PayoutDestination::masked("Bank", "12345678", "Holder");
        let json = serde_json::to_string(&dest).unwrap();
        let back: PayoutDestination = serde_json::from_str(&json).unwrap();
        assert_eq!(dest, back);
    }
}
