//! Wallet number provisioning
//!
//! Numbers are nine random digits in `100000000..=999999999`. Collisions are
//! caught by the unique wallet-number index and retried with a fresh draw,
//! up to `provisioning.max_attempts`. Eager assignment at wallet creation
//! and lazy assignment on first balance query share [`Provisioner::assign_wallet_number`].

use crate::{
    error::{Error, Result},
    repository::WalletRepository,
    storage::{StoreTxn, Storage},
    types::{Wallet, WalletNumber},
};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;

/// Source of candidate wallet numbers
pub trait WalletNumberGenerator: Send + Sync {
    /// Next candidate; uniqueness is checked by the caller
    fn generate(&self) -> WalletNumber;
}

/// Uniform random nine-digit numbers without a leading zero
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomWalletNumbers;

impl WalletNumberGenerator for RandomWalletNumbers {
    fn generate(&self) -> WalletNumber {
        WalletNumber::from_digits(rand::thread_rng().gen_range(100_000_000..=999_999_999))
    }
}

/// Assigns external numbers to wallets
pub struct Provisioner {
    storage: Arc<Storage>,
    wallets: WalletRepository,
    generator: Box<dyn WalletNumberGenerator>,
    max_attempts: u32,
}

impl std::fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provisioner")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl Provisioner {
    /// Create provisioner
    pub fn new(
        storage: Arc<Storage>,
        wallets: WalletRepository,
        generator: Box<dyn WalletNumberGenerator>,
        max_attempts: u32,
    ) -> Self {
        Self {
            storage,
            wallets,
            generator,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Claim a fresh number for `wallet` inside `txn`.
    ///
    /// No-op when the wallet already has one. The caller persists the wallet
    /// row and commits.
    pub fn assign_wallet_number(&self, txn: &StoreTxn<'_>, wallet: &mut Wallet) -> Result<()> {
        if wallet.wallet_number.is_some() {
            return Ok(());
        }

        for attempt in 1..=self.max_attempts {
            let candidate = self.generator.generate();
            match self.wallets.claim_wallet_number(txn, &candidate, wallet.id) {
                Ok(()) => {
                    wallet.wallet_number = Some(candidate);
                    wallet.updated_at = Utc::now();
                    return Ok(());
                }
                Err(Error::DuplicateOperation(_)) => {
                    tracing::warn!(
                        wallet_id = %wallet.id,
                        attempt,
                        "Wallet number collision, drawing again"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::Provisioning(format!(
            "no unused wallet number after {} attempts",
            self.max_attempts
        )))
    }

    /// Return `wallet` with a number, assigning and persisting one if absent.
    ///
    /// Re-reads the row under lock so concurrent callers agree on the number.
    pub fn ensure_wallet_number(&self, wallet: &Wallet) -> Result<Wallet> {
        if wallet.wallet_number.is_some() {
            return Ok(wallet.clone());
        }

        let txn = self.storage.transaction();
        let mut locked = self
            .wallets
            .lock(&txn, wallet.id)?
            .ok_or_else(|| Error::NotFound(format!("wallet {} not found", wallet.id)))?;

        if locked.wallet_number.is_some() {
            txn.rollback()?;
            return Ok(locked);
        }

        self.assign_wallet_number(&txn, &mut locked)?;
        self.wallets.save(&txn, &locked)?;
        txn.commit()?;

        tracing::info!(
            wallet_id = %locked.id,
            owner = %locked.owner,
            "Wallet number assigned lazily"
        );

        Ok(locked)
    }
}
