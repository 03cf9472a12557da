//! Globally unique identifiers used throughout OpenSettle.
//!
//! All entity IDs use UUIDv7 for time-ordered lexicographic sorting.
//! `AccountRef` wraps the external accounting system's account reference
//! as an opaque string; `PaymentCode` is the deterministic matching token
//! shown to both parties of an allocation.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// WithdrawalId
// ---------------------------------------------------------------------------

/// Globally unique withdrawal-request identifier. Uses UUIDv7 for
/// time-ordered sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct WithdrawalId(pub Uuid);

impl WithdrawalId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for WithdrawalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WithdrawalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wd:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// DepositId
// ---------------------------------------------------------------------------

/// Globally unique deposit-request identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct DepositId(pub Uuid);

impl DepositId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for DepositId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DepositId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dp:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// AllocationId
// ---------------------------------------------------------------------------

/// Globally unique allocation identifier. The payment code is derived
/// deterministically from this id (see [`PaymentCode::for_allocation`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AllocationId(pub Uuid);

impl AllocationId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for AllocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AllocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "al:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PartyId
// ---------------------------------------------------------------------------

/// Unique identifier for a party (payer or receiver).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PartyId(pub Uuid);

impl PartyId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for PartyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntryId
// ---------------------------------------------------------------------------

/// Unique identifier for an internal ledger journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct EntryId(pub Uuid);

impl EntryId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "je:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// AccountRef
// ---------------------------------------------------------------------------

/// Reference to an account in the external accounting system.
///
/// Opaque to OpenSettle — the external system defines the format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AccountRef(String);

impl AccountRef {
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PaymentCode
// ---------------------------------------------------------------------------

/// Opaque matching token shown to both parties of an allocation.
///
/// The payer quotes it in the bank-transfer memo; the receiver uses it to
/// recognize the incoming payment. Derived deterministically from the
/// allocation id, so regenerating it for the same allocation always yields
/// the same code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentCode(String);

impl PaymentCode {
    /// Deterministic payment code for an allocation.
    ///
    /// Format: first [`crate::constants::PAYMENT_CODE_LEN`] uppercase hex
    /// chars of `SHA-256("opensettle:payment_code:v1:" || allocation_id)`.
    #[must_use]
    pub fn for_allocation(allocation_id: AllocationId) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"opensettle:payment_code:v1:");
        hasher.update(allocation_id.0.as_bytes());
        let digest = hasher.finalize();
        let code = hex::encode_upper(&digest[..crate::constants::PAYMENT_CODE_LEN / 2]);
        Self(code)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn withdrawal_id_uniqueness() {
        let a = WithdrawalId::new();
        let b = WithdrawalId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn allocation_id_ordering() {
        let a = AllocationId::new();
        let b = AllocationId::new();
        assert!(a < b);
    }

    #[test]
    fn payment_code_deterministic() {
        let id = AllocationId::new();
        let a = PaymentCode::for_allocation(id);
        let b = PaymentCode::for_allocation(id);
        assert_eq!(a, b);
        let c = PaymentCode::for_allocation(AllocationId::new());
        assert_ne!(a, c);
    }

    #[test]
    fn payment_code_length_and_charset() {
        let code = PaymentCode::for_allocation(AllocationId::new());
        assert_eq!(code.as_str().len(), crate::constants::PAYMENT_CODE_LEN);
        assert!(
            code.as_str()
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()),
            "Got: {code}"
        );
    }

    #[test]
    fn account_ref_display() {
        let acct = AccountRef::new("OPS-CLEARING-USD");
        assert_eq!(acct.as_str(), "OPS-CLEARING-USD");
        assert_eq!(format!("{acct}"), "OPS-CLEARING-USD");
    }

    #[test]
    fn serde_roundtrips() {
        let wid = WithdrawalId::new();
        let json = serde_json::to_string(&wid).unwrap();
        let back: WithdrawalId = serde_json::from_str(&json).unwrap();
        assert_eq!(wid, back);

        let code = PaymentCode::for_allocation(AllocationId::new());
        let json = serde_json::to_string(&code).unwrap();
        let back: PaymentCode = serde_json::from_str(&json).unwrap();
        assert_eq!(code, back);
    }
}
