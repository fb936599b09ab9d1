//! Core types for the wallet ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (integer minor units, never floating point)
//! - Validation at construction (wallet numbers, owner ids)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Length of an external wallet number
pub const WALLET_NUMBER_LEN: usize = 9;

/// Account holder reference (the user that owns a wallet)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(String);

impl OwnerId {
    /// Create new owner ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse an owner ID, rejecting blank input
    pub fn parse(id: &str) -> crate::Result<Self> {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(crate::Error::Validation("owner id must not be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Internal wallet identifier.
///
/// Ordering is by UUID bytes and is the total order used when a single
/// operation has to lock more than one wallet row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WalletId(Uuid);

impl WalletId {
    /// Generate a fresh wallet ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Short prefix used in human-facing references
    pub fn fragment(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Externally visible wallet number: exactly nine ASCII digits
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletNumber(String);

impl WalletNumber {
    /// Parse and validate a wallet number
    pub fn parse(number: &str) -> crate::Result<Self> {
        if number.len() != WALLET_NUMBER_LEN || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(crate::Error::Validation(format!(
                "wallet number must be {} digits, got {:?}",
                WALLET_NUMBER_LEN, number
            )));
        }
        Ok(Self(number.to_string()))
    }

    /// Build from generated digits, zero-padded to nine places
    pub fn from_digits(value: u32) -> Self {
        Self(format!("{:09}", value % 1_000_000_000))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISO 4217 currency code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Currency {
    /// Nigerian Naira
    #[default]
    NGN,
    /// US Dollar
    USD,
    /// Euro
    EUR,
    /// British Pound
    GBP,
    /// Ghanaian Cedi
    GHS,
    /// Kenyan Shilling
    KES,
}

impl Currency {
    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::NGN => "NGN",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::GHS => "GHS",
            Currency::KES => "KES",
        }
    }

    /// Parse from string
    pub fn from_code(s: &str) -> Option<Self> {
        match s {
            "NGN" => Some(Currency::NGN),
            "USD" => Some(Currency::USD),
            "EUR" => Some(Currency::EUR),
            "GBP" => Some(Currency::GBP),
            "GHS" => Some(Currency::GHS),
            "KES" => Some(Currency::KES),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A user's balance-holding record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Internal identifier
    pub id: WalletId,

    /// Account holder
    pub owner: OwnerId,

    /// External number; assigned once, never changed
    pub wallet_number: Option<WalletNumber>,

    /// Balance in minor currency units
    pub balance: u64,

    /// Wallet currency
    pub currency: Currency,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last balance or number change
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// New empty wallet for an owner
    pub fn new(owner: OwnerId, currency: Currency) -> Self {
        let now = Utc::now();
        Self {
            id: WalletId::generate(),
            owner,
            wallet_number: None,
            balance: 0,
            currency,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Kind of balance-affecting event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionType {
    /// External deposit credit
    Deposit = 1,
    /// Peer-to-peer transfer leg
    Transfer = 2,
}

impl TransactionType {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Transfer => "transfer",
        }
    }
}

/// Ledger entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionStatus {
    /// Recorded but not settled
    Pending = 1,
    /// Balance change committed
    Success = 2,
    /// Failed
    Failed = 3,
}

impl TransactionStatus {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
        }
    }
}

/// Immutable ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique entry ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Wallet the entry belongs to
    pub wallet_id: WalletId,

    /// Signed minor units: positive credit, negative debit
    pub amount: i64,

    /// Entry type
    pub tx_type: TransactionType,

    /// Entry status
    pub status: TransactionStatus,

    /// External correlation key (deposit) or pair key (transfer)
    pub reference: String,

    /// Free-text audit note
    pub description: String,

    /// Insertion timestamp
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Successful entry stamped now
    pub fn success(
        wallet_id: WalletId,
        amount: i64,
        tx_type: TransactionType,
        reference: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            wallet_id,
            amount,
            tx_type,
            status: TransactionStatus::Success,
            reference: reference.into(),
            description: description.into(),
            created_at: Utc::now(),
        }
    }
}

/// Deposit status lookup result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositStatus {
    /// External reference
    pub reference: String,
    /// Entry status
    pub status: TransactionStatus,
    /// Credited amount (minor units)
    pub amount: i64,
}

impl From<&Transaction> for DepositStatus {
    fn from(tx: &Transaction) -> Self {
        Self {
            reference: tx.reference.clone(),
            status: tx.status,
            amount: tx.amount,
        }
    }
}

/// Result of applying an external credit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreditOutcome {
    /// Balance increased and the entry was written
    Applied(Transaction),
    /// Reference already committed; nothing changed
    Duplicate,
}

impl CreditOutcome {
    /// Whether this call changed the balance
    pub fn is_applied(&self) -> bool {
        matches!(self, CreditOutcome::Applied(_))
    }
}

/// Both legs of a committed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Shared correlation reference
    pub reference: String,
    /// Sender leg (negative amount)
    pub debit: Transaction,
    /// Recipient leg (positive amount)
    pub credit: Transaction,
}
