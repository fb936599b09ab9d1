//! Async ledger facade
//!
//! Runs every [`LedgerEngine`] call on the blocking thread pool so row lock
//! waits never stall the async runtime.
//!
//! # Example
//!
//! ```no_run
//! use wallet_ledger::{Config, Ledger, OwnerId};
//!
//! #[tokio::main]
//! async fn main() -> wallet_ledger::Result<()> {
//!     let ledger = Ledger::open(Config::default()).await?;
//!
//!     let owner = OwnerId::new("user-1");
//!     ledger.open_wallet(owner.clone()).await?;
//!     ledger.credit_wallet("D1", 50_000, Some(owner.clone())).await?;
//!
//!     let wallet = ledger.get_balance(owner).await?;
//!     println!("balance: {}", wallet.balance);
//!     Ok(())
//! }
//! ```

use crate::{
    capability::{Caller, Capability},
    engine::LedgerEngine,
    events::DepositNotification,
    storage::StorageStats,
    types::{CreditOutcome, DepositStatus, OwnerId, Transaction, TransferReceipt, Wallet},
    Config, Result,
};
use std::sync::Arc;

/// Main ledger interface
#[derive(Debug, Clone)]
pub struct Ledger {
    engine: Arc<LedgerEngine>,
}

impl Ledger {
    /// Open ledger with configuration
    pub async fn open(config: Config) -> Result<Self> {
        let engine = tokio::task::spawn_blocking(move || LedgerEngine::open(config)).await??;
        tracing::info!("Ledger opened");
        Ok(Self::from_engine(Arc::new(engine)))
    }

    /// Wrap an existing engine
    pub fn from_engine(engine: Arc<LedgerEngine>) -> Self {
        Self { engine }
    }

    /// Underlying synchronous engine
    pub fn engine(&self) -> &Arc<LedgerEngine> {
        &self.engine
    }

    /// Guarded view for a caller
    pub fn authorize(&self, caller: Caller) -> AuthorizedLedger {
        AuthorizedLedger {
            ledger: self.clone(),
            caller,
        }
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&LedgerEngine) -> Result<T> + Send + 'static,
    {
        let engine = self.engine.clone();
        tokio::task::spawn_blocking(move || op(&engine)).await?
    }

    /// Open the owner's wallet, creating it on first call
    pub async fn open_wallet(&self, owner: OwnerId) -> Result<Wallet> {
        self.run(move |engine| engine.open_wallet(&owner)).await
    }

    /// Apply an external deposit exactly once per reference
    pub async fn credit_wallet(
        &self,
        reference: impl Into<String>,
        amount: i64,
        owner: Option<OwnerId>,
    ) -> Result<CreditOutcome> {
        let reference = reference.into();
        self.run(move |engine| engine.credit_wallet(&reference, amount, owner.as_ref()))
            .await
    }

    /// Move funds to another wallet by its number
    pub async fn transfer(
        &self,
        from: OwnerId,
        to_wallet_number: impl Into<String>,
        amount: i64,
    ) -> Result<TransferReceipt> {
        let to_wallet_number = to_wallet_number.into();
        self.run(move |engine| engine.transfer(&from, &to_wallet_number, amount))
            .await
    }

    /// The owner's wallet and balance
    pub async fn get_balance(&self, owner: OwnerId) -> Result<Wallet> {
        self.run(move |engine| engine.get_balance(&owner)).await
    }

    /// The owner's entries, newest first
    pub async fn get_transactions(&self, owner: OwnerId) -> Result<Vec<Transaction>> {
        self.run(move |engine| engine.get_transactions(&owner)).await
    }

    /// Deposit status by reference
    pub async fn get_deposit_status(&self, reference: impl Into<String>) -> Result<DepositStatus> {
        let reference = reference.into();
        self.run(move |engine| engine.get_deposit_status(&reference))
            .await
    }

    /// Both legs of a transfer
    pub async fn get_transfer(&self, reference: impl Into<String>) -> Result<Vec<Transaction>> {
        let reference = reference.into();
        self.run(move |engine| engine.get_transfer(&reference)).await
    }

    /// Compare the stored balance with the sum of the wallet's entries
    pub async fn verify_wallet(&self, owner: OwnerId) -> Result<bool> {
        self.run(move |engine| engine.verify_wallet(&owner)).await
    }

    /// Sum of every wallet balance
    pub async fn total_balance(&self) -> Result<u128> {
        self.run(|engine| engine.total_balance()).await
    }

    /// Storage statistics
    pub async fn stats(&self) -> Result<StorageStats> {
        self.run(|engine| engine.stats()).await
    }

    /// Decode a gateway webhook body and credit on `charge.success`.
    ///
    /// Returns `None` for events that do not move money.
    pub async fn handle_deposit_notification(&self, body: &[u8]) -> Result<Option<CreditOutcome>> {
        let notification = DepositNotification::from_slice(body)?;

        if !notification.is_charge_success() {
            tracing::debug!(event = %notification.event, "Ignoring gateway event");
            return Ok(None);
        }

        let owner = notification.owner();
        self.credit_wallet(notification.data.reference, notification.data.amount, owner)
            .await
            .map(Some)
    }
}

/// Ledger view that checks the caller's capabilities before each operation
#[derive(Debug, Clone)]
pub struct AuthorizedLedger {
    ledger: Ledger,
    caller: Caller,
}

impl AuthorizedLedger {
    /// Caller this view acts for
    pub fn caller(&self) -> &Caller {
        &self.caller
    }

    fn require(&self, capability: Capability) -> Result<()> {
        self.caller.require(capability).map_err(|e| {
            tracing::warn!(capability = %capability, "Caller lacks capability");
            e
        })
    }

    /// Requires `read`
    pub async fn get_balance(&self, owner: OwnerId) -> Result<Wallet> {
        self.require(Capability::Read)?;
        self.ledger.get_balance(owner).await
    }

    /// Requires `read`
    pub async fn get_transactions(&self, owner: OwnerId) -> Result<Vec<Transaction>> {
        self.require(Capability::Read)?;
        self.ledger.get_transactions(owner).await
    }

    /// Requires `read`
    pub async fn get_deposit_status(&self, reference: impl Into<String>) -> Result<DepositStatus> {
        self.require(Capability::Read)?;
        self.ledger.get_deposit_status(reference).await
    }

    /// Requires `deposit`
    pub async fn handle_deposit_notification(&self, body: &[u8]) -> Result<Option<CreditOutcome>> {
        self.require(Capability::Deposit)?;
        self.ledger.handle_deposit_notification(body).await
    }

    /// Requires `transfer`
    pub async fn transfer(
        &self,
        from: OwnerId,
        to_wallet_number: impl Into<String>,
        amount: i64,
    ) -> Result<TransferReceipt> {
        self.require(Capability::Transfer)?;
        self.ledger.transfer(from, to_wallet_number, amount).await
    }
}
