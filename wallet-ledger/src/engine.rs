//! Ledger engine: the only writer of wallet balances and ledger entries
//!
//! Every mutating operation runs in one store transaction holding the row
//! locks of the wallets it touches. The balance update and the log entries
//! commit together or not at all.
//!
//! # Invariants
//!
//! - Balances never go below zero at a commit boundary
//! - Transfers are zero-sum: one debit and one credit of equal size
//! - A deposit reference changes a balance at most once
//! - Multi-wallet locks are taken in ascending wallet ID order

use crate::{
    error::{Error, Result},
    metrics::Metrics,
    provisioning::{Provisioner, RandomWalletNumbers, WalletNumberGenerator},
    repository::WalletRepository,
    storage::{Storage, StorageStats},
    transaction_log::TransactionLog,
    types::{
        CreditOutcome, DepositStatus, OwnerId, Transaction, TransactionType, TransferReceipt,
        Wallet, WalletId, WalletNumber,
    },
    Config,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

const DEPOSIT_DESCRIPTION: &str = "Deposit";

/// Synchronous ledger engine.
///
/// Operations block only while waiting for row locks; share it across
/// threads behind an `Arc`.
#[derive(Debug)]
pub struct LedgerEngine {
    storage: Arc<Storage>,
    wallets: WalletRepository,
    log: TransactionLog,
    provisioner: Provisioner,
    metrics: Metrics,
    config: Config,
}

impl LedgerEngine {
    /// Open engine with random wallet numbers
    pub fn open(config: Config) -> Result<Self> {
        Self::with_generator(config, Box::new(RandomWalletNumbers))
    }

    /// Open engine with a custom wallet number source
    pub fn with_generator(
        config: Config,
        generator: Box<dyn WalletNumberGenerator>,
    ) -> Result<Self> {
        config.validate()?;

        let storage = Arc::new(Storage::open(&config)?);
        let wallets = WalletRepository::new(storage.clone());
        let log = TransactionLog::new(storage.clone());
        let provisioner = Provisioner::new(
            storage.clone(),
            wallets.clone(),
            generator,
            config.provisioning.max_attempts,
        );

        Ok(Self {
            storage,
            wallets,
            log,
            provisioner,
            metrics: Metrics::new()?,
            config,
        })
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Storage statistics
    pub fn stats(&self) -> Result<StorageStats> {
        self.storage.get_stats()
    }

    /// Open the owner's wallet, creating it on first call.
    ///
    /// One wallet per owner: later calls return the existing wallet.
    pub fn open_wallet(&self, owner: &OwnerId) -> Result<Wallet> {
        if let Some(existing) = self.wallets.find_by_owner(owner)? {
            return Ok(existing);
        }

        let mut wallet = Wallet::new(owner.clone(), self.config.default_currency);
        let txn = self.storage.transaction();

        if self.config.provisioning.eager {
            self.provisioner.assign_wallet_number(&txn, &mut wallet)?;
        }

        match self.wallets.insert(&txn, &wallet) {
            Ok(()) => {}
            Err(Error::DuplicateOperation(_)) => {
                // Lost a race with a concurrent open for the same owner
                txn.rollback()?;
                return self
                    .wallets
                    .find_by_owner(owner)?
                    .ok_or_else(|| Error::NotFound(format!("wallet for {} not found", owner)));
            }
            Err(e) => return Err(e),
        }
        txn.commit()?;

        self.metrics.record_wallet_provisioned();
        tracing::info!(
            wallet_id = %wallet.id,
            owner = %wallet.owner,
            wallet_number = ?wallet.wallet_number.as_ref().map(WalletNumber::as_str),
            currency = %wallet.currency,
            "Wallet opened"
        );

        Ok(wallet)
    }

    /// Apply an external deposit exactly once per reference.
    ///
    /// A reference that was already committed returns
    /// [`CreditOutcome::Duplicate`] without touching any balance, including
    /// when the replay races the original.
    pub fn credit_wallet(
        &self,
        reference: &str,
        amount: i64,
        owner: Option<&OwnerId>,
    ) -> Result<CreditOutcome> {
        let timer = self.metrics.duration("credit").start_timer();
        let result = self.try_credit(reference, amount, owner);
        timer.observe_duration();

        match &result {
            Ok(CreditOutcome::Applied(_)) => self.metrics.record_credit(),
            Ok(CreditOutcome::Duplicate) => self.metrics.record_duplicate_credit(),
            Err(e) => {
                self.metrics.record_rejection("credit", e);
                tracing::warn!(reference, amount, error = %e, "Credit rejected");
            }
        }
        result
    }

    fn try_credit(
        &self,
        reference: &str,
        amount: i64,
        owner: Option<&OwnerId>,
    ) -> Result<CreditOutcome> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(Error::Validation("deposit reference is required".to_string()));
        }

        // Fast path for replays; the unique claim below is what guarantees it
        if self.log.exists(TransactionType::Deposit, reference)? {
            tracing::debug!(reference, "Deposit already applied");
            return Ok(CreditOutcome::Duplicate);
        }

        let owner = owner.ok_or_else(|| {
            Error::Validation("owner id missing in deposit metadata".to_string())
        })?;
        let credit = positive_amount(amount)?;

        let txn = self.storage.transaction();
        let mut wallet = self
            .wallets
            .find_by_owner_for_update(&txn, owner)?
            .ok_or_else(|| Error::NotFound(format!("wallet not found for owner {}", owner)))?;

        let entry = Transaction::success(
            wallet.id,
            amount,
            TransactionType::Deposit,
            reference,
            DEPOSIT_DESCRIPTION,
        );

        match self.log.append(&txn, std::slice::from_ref(&entry)) {
            Ok(()) => {}
            Err(Error::DuplicateOperation(_)) => {
                txn.rollback()?;
                tracing::debug!(reference, "Concurrent deposit replay absorbed");
                return Ok(CreditOutcome::Duplicate);
            }
            Err(e) => return Err(e),
        }

        wallet.balance = wallet.balance.checked_add(credit).ok_or_else(|| {
            Error::InvariantViolation(format!("balance overflow on wallet {}", wallet.id))
        })?;
        wallet.updated_at = entry.created_at;
        self.wallets.save(&txn, &wallet)?;
        txn.commit()?;

        tracing::info!(
            wallet_id = %wallet.id,
            reference,
            amount,
            balance = wallet.balance,
            "Deposit credited"
        );

        Ok(CreditOutcome::Applied(entry))
    }

    /// Move funds from the owner's wallet to the wallet with `to_wallet_number`.
    ///
    /// Both wallets are locked in ascending ID order for the whole operation.
    /// On any failure neither balance changes and no entry is written.
    pub fn transfer(
        &self,
        from: &OwnerId,
        to_wallet_number: &str,
        amount: i64,
    ) -> Result<TransferReceipt> {
        let timer = self.metrics.duration("transfer").start_timer();
        let result = self.try_transfer(from, to_wallet_number, amount);
        timer.observe_duration();

        match &result {
            Ok(_) => self.metrics.record_transfer(),
            Err(e) => {
                self.metrics.record_rejection("transfer", e);
                tracing::warn!(
                    from = %from,
                    to_wallet_number,
                    amount,
                    error = %e,
                    "Transfer rejected"
                );
            }
        }
        result
    }

    fn try_transfer(
        &self,
        from: &OwnerId,
        to_wallet_number: &str,
        amount: i64,
    ) -> Result<TransferReceipt> {
        let debit_amount = positive_amount(amount)?;
        let to_number = WalletNumber::parse(to_wallet_number)?;

        let sender_id = self
            .wallets
            .resolve_owner(from)?
            .ok_or_else(|| Error::NotFound("sender wallet not found".to_string()))?;
        let recipient_id = match self.wallets.resolve_wallet_number(&to_number)? {
            Some(id) => id,
            None => return Err(self.missing_recipient(sender_id, debit_amount)),
        };

        if sender_id == recipient_id {
            return Err(Error::Validation(
                "cannot transfer to the sender's own wallet".to_string(),
            ));
        }

        let txn = self.storage.transaction();
        let (mut sender, mut recipient) = self.wallets.lock_pair(&txn, sender_id, recipient_id)?;

        if sender.currency != recipient.currency {
            return Err(Error::Validation(format!(
                "currency mismatch: {} to {}",
                sender.currency, recipient.currency
            )));
        }

        if sender.balance < debit_amount {
            return Err(Error::InsufficientFunds {
                required: debit_amount,
                available: sender.balance,
            });
        }

        sender.balance -= debit_amount;
        recipient.balance = recipient.balance.checked_add(debit_amount).ok_or_else(|| {
            Error::InvariantViolation(format!("balance overflow on wallet {}", recipient.id))
        })?;

        let reference = transfer_reference(&sender);
        let sender_label = wallet_label(&sender);
        let recipient_label = wallet_label(&recipient);
        let debit = Transaction::success(
            sender.id,
            -amount,
            TransactionType::Transfer,
            reference.clone(),
            format!("Transfer to wallet {}", recipient_label),
        );
        let mut credit = Transaction::success(
            recipient.id,
            amount,
            TransactionType::Transfer,
            reference.clone(),
            format!("Transfer from wallet {}", sender_label),
        );
        credit.created_at = debit.created_at;

        let now = debit.created_at;
        sender.updated_at = now;
        recipient.updated_at = now;

        self.wallets.save(&txn, &sender)?;
        self.wallets.save(&txn, &recipient)?;
        self.log
            .append(&txn, &[debit.clone(), credit.clone()])
            .map_err(|e| match e {
                Error::DuplicateOperation(msg) => {
                    Error::Retryable(format!("transfer reference collision: {}", msg))
                }
                other => other,
            })?;
        txn.commit()?;

        tracing::info!(
            reference = %reference,
            from_wallet = %sender.id,
            to_wallet = %recipient.id,
            amount,
            "Transfer committed"
        );

        Ok(TransferReceipt {
            reference,
            debit,
            credit,
        })
    }

    /// Error for a transfer whose recipient does not exist.
    ///
    /// Sender funds are checked first, under the sender's row lock, so an
    /// overdraft reports `InsufficientFunds` whatever the recipient.
    fn missing_recipient(&self, sender_id: WalletId, amount: u64) -> Error {
        let txn = self.storage.transaction();
        let sender = match self.wallets.lock(&txn, sender_id) {
            Ok(Some(sender)) => sender,
            Ok(None) => return Error::NotFound("sender wallet not found".to_string()),
            Err(e) => return e,
        };
        drop(txn);

        if sender.balance < amount {
            Error::InsufficientFunds {
                required: amount,
                available: sender.balance,
            }
        } else {
            Error::NotFound("recipient wallet not found".to_string())
        }
    }

    /// The owner's wallet, with a wallet number assigned if it had none
    pub fn get_balance(&self, owner: &OwnerId) -> Result<Wallet> {
        let wallet = self
            .wallets
            .find_by_owner(owner)?
            .ok_or_else(|| Error::NotFound("wallet not found".to_string()))?;

        self.ensure_wallet_number(&wallet)
    }

    /// Assign and persist a wallet number if the wallet has none
    pub fn ensure_wallet_number(&self, wallet: &Wallet) -> Result<Wallet> {
        self.provisioner.ensure_wallet_number(wallet)
    }

    /// The owner's ledger entries, newest first.
    ///
    /// Empty when the owner has no wallet.
    pub fn get_transactions(&self, owner: &OwnerId) -> Result<Vec<Transaction>> {
        match self.wallets.resolve_owner(owner)? {
            Some(wallet_id) => self.log.find_by_wallet(wallet_id),
            None => Ok(Vec::new()),
        }
    }

    /// Status of a deposit by its external reference
    pub fn get_deposit_status(&self, reference: &str) -> Result<DepositStatus> {
        let reference = reference.trim();
        self.log
            .find_by_reference(TransactionType::Deposit, reference)?
            .first()
            .map(DepositStatus::from)
            .ok_or_else(|| Error::NotFound(format!("transaction {} not found", reference)))
    }

    /// Both legs of a transfer, debit first
    pub fn get_transfer(&self, reference: &str) -> Result<Vec<Transaction>> {
        let reference = reference.trim();
        let legs = self
            .log
            .find_by_reference(TransactionType::Transfer, reference)?;
        if legs.is_empty() {
            return Err(Error::NotFound(format!("transfer {} not found", reference)));
        }
        Ok(legs)
    }

    /// Rebuild the owner's balance from its entries and compare with the stored one.
    ///
    /// Holds the wallet row lock while scanning: entries for a wallet are only
    /// written under that lock, so the row and the scan see the same commits.
    pub fn verify_wallet(&self, owner: &OwnerId) -> Result<bool> {
        let txn = self.storage.transaction();
        let wallet = self
            .wallets
            .find_by_owner_for_update(&txn, owner)?
            .ok_or_else(|| Error::NotFound("wallet not found".to_string()))?;

        let replayed: i128 = self
            .log
            .find_by_wallet(wallet.id)?
            .iter()
            .map(|entry| entry.amount as i128)
            .sum();
        txn.rollback()?;

        let consistent = replayed == wallet.balance as i128;
        if !consistent {
            tracing::error!(
                wallet_id = %wallet.id,
                stored = wallet.balance,
                replayed = %replayed,
                "Wallet balance does not match its ledger entries"
            );
        }
        Ok(consistent)
    }

    /// Sum of every wallet balance
    pub fn total_balance(&self) -> Result<u128> {
        Ok(self
            .wallets
            .all()?
            .iter()
            .map(|wallet| wallet.balance as u128)
            .sum())
    }
}

fn positive_amount(amount: i64) -> Result<u64> {
    if amount <= 0 {
        return Err(Error::Validation(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    Ok(amount as u64)
}

fn wallet_label(wallet: &Wallet) -> String {
    match &wallet.wallet_number {
        Some(number) => number.to_string(),
        None => wallet.id.to_string(),
    }
}

/// `TRF-<millis>-<sender fragment>-<random>`, unique per transfer
fn transfer_reference(sender: &Wallet) -> String {
    let nonce = Uuid::new_v4().simple().to_string();
    format!(
        "TRF-{}-{}-{}",
        Utc::now().timestamp_millis(),
        sender.id.fragment(),
        &nonce[..8]
    )
}
