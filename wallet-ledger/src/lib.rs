//! Wallet Ledger
//!
//! Transactional wallet ledger: idempotent external deposits and atomic
//! peer-to-peer transfers over a RocksDB `TransactionDB`.
//!
//! # Architecture
//!
//! - **Row Locks**: Every mutation locks the wallet rows it touches until commit
//! - **Ordered Locking**: Multi-wallet operations lock in ascending wallet ID order
//! - **Unique Claims**: Deposit references, owners and wallet numbers are claimed
//!   atomically in the same transaction as the balance change
//! - **Append-Only Log**: One entry per balance change, never modified
//!
//! # Invariants
//!
//! - Money conservation: transfers are zero-sum
//! - No overdraft: balances never go below zero
//! - Idempotent deposits: one balance change per external reference
//! - Reconstructible: a wallet's balance equals the sum of its entries

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod capability;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod metrics;
pub mod provisioning;
pub mod repository;
pub mod storage;
pub mod transaction_log;
pub mod types;

// Re-exports
pub use capability::{Caller, Capability, CapabilitySet};
pub use config::Config;
pub use engine::LedgerEngine;
pub use error::{Error, Result};
pub use events::DepositNotification;
pub use ledger::{AuthorizedLedger, Ledger};
pub use storage::{Storage, StorageStats};
pub use types::{
    CreditOutcome, Currency, DepositStatus, OwnerId, Transaction, TransactionStatus,
    TransactionType, TransferReceipt, Wallet, WalletId, WalletNumber,
};
