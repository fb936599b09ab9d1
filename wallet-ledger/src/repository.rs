//! Typed wallet accessors over the store
//!
//! Lookups come in two flavours: plain reads for balance and history
//! queries, and `*_for_update` reads that take the wallet row lock inside a
//! [`StoreTxn`]. The owner and wallet-number indexes are written once and
//! never change, so resolving them without a lock is safe; only the wallet
//! row itself is locked.

use crate::{
    error::{Error, Result},
    storage::{StoreTxn, Storage, CF_OWNERS, CF_WALLETS, CF_WALLET_NUMBERS},
    types::{OwnerId, Wallet, WalletId, WalletNumber},
};
use std::sync::Arc;

/// Wallet repository
#[derive(Debug, Clone)]
pub struct WalletRepository {
    storage: Arc<Storage>,
}

impl WalletRepository {
    /// Create repository over shared storage
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Wallet by internal ID (non-locking)
    pub fn find_by_id(&self, id: WalletId) -> Result<Option<Wallet>> {
        self.storage.get(CF_WALLETS, id.as_bytes())
    }

    /// Wallet by owner (non-locking)
    pub fn find_by_owner(&self, owner: &OwnerId) -> Result<Option<Wallet>> {
        match self.resolve_owner(owner)? {
            Some(id) => self.find_existing(id).map(Some),
            None => Ok(None),
        }
    }

    /// Wallet ID registered for an owner
    pub fn resolve_owner(&self, owner: &OwnerId) -> Result<Option<WalletId>> {
        self.storage.get(CF_OWNERS, owner.as_str().as_bytes())
    }

    /// Wallet ID registered for an external number
    pub fn resolve_wallet_number(&self, number: &WalletNumber) -> Result<Option<WalletId>> {
        self.storage.get(CF_WALLET_NUMBERS, number.as_str().as_bytes())
    }

    /// Lock a wallet row for the rest of the transaction
    pub fn lock(&self, txn: &StoreTxn<'_>, id: WalletId) -> Result<Option<Wallet>> {
        txn.get_for_update(CF_WALLETS, id.as_bytes())
    }

    /// Lock and load the owner's wallet
    pub fn find_by_owner_for_update(
        &self,
        txn: &StoreTxn<'_>,
        owner: &OwnerId,
    ) -> Result<Option<Wallet>> {
        match self.resolve_owner(owner)? {
            Some(id) => self.lock(txn, id),
            None => Ok(None),
        }
    }

    /// Lock and load the wallet carrying an external number
    pub fn find_by_wallet_number_for_update(
        &self,
        txn: &StoreTxn<'_>,
        number: &WalletNumber,
    ) -> Result<Option<Wallet>> {
        match self.resolve_wallet_number(number)? {
            Some(id) => self.lock(txn, id),
            None => Ok(None),
        }
    }

    /// Lock two distinct wallets in ascending ID order.
    ///
    /// Returns them in argument order. Any two operations locking the same
    /// pair acquire the locks in the same sequence and cannot deadlock.
    pub fn lock_pair(
        &self,
        txn: &StoreTxn<'_>,
        first: WalletId,
        second: WalletId,
    ) -> Result<(Wallet, Wallet)> {
        if first == second {
            return Err(Error::Validation(
                "cannot lock the same wallet twice".to_string(),
            ));
        }

        let (low, high) = if first < second { (first, second) } else { (second, first) };
        let low_wallet = self.lock_existing(txn, low)?;
        let high_wallet = self.lock_existing(txn, high)?;

        if first == low {
            Ok((low_wallet, high_wallet))
        } else {
            Ok((high_wallet, low_wallet))
        }
    }

    /// Insert a new wallet, enforcing one wallet per owner.
    ///
    /// Fails with `DuplicateOperation` when the owner already has one.
    pub fn insert(&self, txn: &StoreTxn<'_>, wallet: &Wallet) -> Result<()> {
        txn.insert_unique(CF_OWNERS, wallet.owner.as_str().as_bytes(), &wallet.id)?;
        txn.put(CF_WALLETS, wallet.id.as_bytes(), wallet)
    }

    /// Stage an updated wallet row
    pub fn save(&self, txn: &StoreTxn<'_>, wallet: &Wallet) -> Result<()> {
        txn.put(CF_WALLETS, wallet.id.as_bytes(), wallet)
    }

    /// Reserve an external number for a wallet.
    ///
    /// Fails with `DuplicateOperation` when the number belongs to any wallet.
    pub fn claim_wallet_number(
        &self,
        txn: &StoreTxn<'_>,
        number: &WalletNumber,
        id: WalletId,
    ) -> Result<()> {
        txn.insert_unique(CF_WALLET_NUMBERS, number.as_str().as_bytes(), &id)
    }

    /// All wallets
    pub fn all(&self) -> Result<Vec<Wallet>> {
        self.storage.scan_values(CF_WALLETS)
    }

    fn find_existing(&self, id: WalletId) -> Result<Wallet> {
        self.find_by_id(id)?.ok_or_else(|| dangling_index(id))
    }

    fn lock_existing(&self, txn: &StoreTxn<'_>, id: WalletId) -> Result<Wallet> {
        self.lock(txn, id)?.ok_or_else(|| dangling_index(id))
    }
}

fn dangling_index(id: WalletId) -> Error {
    Error::InvariantViolation(format!("index points to missing wallet {}", id))
}
