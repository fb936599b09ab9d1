//! Append-only transaction log
//!
//! Every balance mutation writes its entries here in the same store
//! transaction as the wallet update. Entries are never updated or deleted.
//!
//! References are claimed in the `references` index, scoped by entry type:
//! a deposit reference can be committed once, and a transfer reference
//! names exactly the two legs written with it. The claim goes through
//! [`StoreTxn::insert_unique`], so a replayed deposit racing its original
//! fails the insert instead of slipping past an existence check.

use crate::{
    error::{Error, Result},
    storage::{StoreTxn, Storage, CF_REFERENCES, CF_TRANSACTIONS, CF_WALLET_ENTRIES},
    types::{Transaction, TransactionType, WalletId},
};
use std::sync::Arc;
use uuid::Uuid;

/// Transaction log
#[derive(Debug, Clone)]
pub struct TransactionLog {
    storage: Arc<Storage>,
}

impl TransactionLog {
    /// Create log over shared storage
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Stage entries that share one type and reference.
    ///
    /// Fails with `DuplicateOperation` if the reference was already committed
    /// for this entry type.
    pub fn append(&self, txn: &StoreTxn<'_>, entries: &[Transaction]) -> Result<()> {
        let first = entries
            .first()
            .ok_or_else(|| Error::InvariantViolation("empty log append".to_string()))?;

        if entries
            .iter()
            .any(|e| e.tx_type != first.tx_type || e.reference != first.reference)
        {
            return Err(Error::InvariantViolation(
                "entries in one append must share type and reference".to_string(),
            ));
        }

        let ids: Vec<Uuid> = entries.iter().map(|e| e.id).collect();
        txn.insert_unique(
            CF_REFERENCES,
            &reference_key(first.tx_type, &first.reference),
            &ids,
        )?;

        for entry in entries {
            txn.put(CF_TRANSACTIONS, entry.id.as_bytes(), entry)?;
            txn.put_marker(CF_WALLET_ENTRIES, &wallet_entry_key(entry))?;

            tracing::debug!(
                entry_id = %entry.id,
                wallet_id = %entry.wallet_id,
                amount = entry.amount,
                tx_type = entry.tx_type.as_str(),
                "Entry staged"
            );
        }

        Ok(())
    }

    /// Whether a reference has been committed for this entry type
    pub fn exists(&self, tx_type: TransactionType, reference: &str) -> Result<bool> {
        Ok(self
            .storage
            .get::<Vec<Uuid>>(CF_REFERENCES, &reference_key(tx_type, reference))?
            .is_some())
    }

    /// Entry by ID
    pub fn get(&self, id: Uuid) -> Result<Option<Transaction>> {
        self.storage.get(CF_TRANSACTIONS, id.as_bytes())
    }

    /// Entries committed under a reference, in append order
    pub fn find_by_reference(
        &self,
        tx_type: TransactionType,
        reference: &str,
    ) -> Result<Vec<Transaction>> {
        let ids = match self
            .storage
            .get::<Vec<Uuid>>(CF_REFERENCES, &reference_key(tx_type, reference))?
        {
            Some(ids) => ids,
            None => return Ok(Vec::new()),
        };

        ids.into_iter().map(|id| self.get_existing(id)).collect()
    }

    /// A wallet's entries, newest first
    pub fn find_by_wallet(&self, wallet_id: WalletId) -> Result<Vec<Transaction>> {
        let keys = self
            .storage
            .scan_prefix_keys(CF_WALLET_ENTRIES, wallet_id.as_bytes())?;

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys.iter().rev() {
            // wallet_id (16) || created_at (8) || entry_id (16)
            if key.len() != 40 {
                return Err(Error::InvariantViolation(format!(
                    "malformed wallet entry key of {} bytes",
                    key.len()
                )));
            }
            let mut id_bytes = [0u8; 16];
            id_bytes.copy_from_slice(&key[24..40]);
            entries.push(self.get_existing(Uuid::from_bytes(id_bytes))?);
        }

        Ok(entries)
    }

    fn get_existing(&self, id: Uuid) -> Result<Transaction> {
        self.get(id)?.ok_or_else(|| {
            Error::InvariantViolation(format!("index points to missing entry {}", id))
        })
    }
}

fn reference_key(tx_type: TransactionType, reference: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(reference.len() + 2);
    key.push(tx_type as u8);
    key.push(b':');
    key.extend_from_slice(reference.as_bytes());
    key
}

fn wallet_entry_key(entry: &Transaction) -> Vec<u8> {
    let nanos = entry.created_at.timestamp_nanos_opt().unwrap_or(0).max(0) as u64;
    let mut key = Vec::with_capacity(40);
    key.extend_from_slice(entry.wallet_id.as_bytes());
    key.extend_from_slice(&nanos.to_be_bytes());
    key.extend_from_slice(entry.id.as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use tempfile::TempDir;

    fn test_log() -> (TransactionLog, Arc<Storage>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        config.locking.lock_timeout_ms = 100;
        let storage = Arc::new(Storage::open(&config).unwrap());
        (TransactionLog::new(storage.clone()), storage, temp_dir)
    }

    fn deposit(wallet_id: WalletId, reference: &str, amount: i64) -> Transaction {
        Transaction::success(wallet_id, amount, TransactionType::Deposit, reference, "Deposit")
    }

    #[test]
    fn test_append_and_exists() {
        let (log, storage, _temp) = test_log();
        let wallet_id = WalletId::generate();

        assert!(!log.exists(TransactionType::Deposit, "D1").unwrap());

        let txn = storage.transaction();
        log.append(&txn, &[deposit(wallet_id, "D1", 500)]).unwrap();
        txn.commit().unwrap();

        assert!(log.exists(TransactionType::Deposit, "D1").unwrap());
        // Scoped by type
        assert!(!log.exists(TransactionType::Transfer, "D1").unwrap());
    }

    #[test]
    fn test_duplicate_reference_rejected() {
        let (log, storage, _temp) = test_log();
        let wallet_id = WalletId::generate();

        let txn = storage.transaction();
        log.append(&txn, &[deposit(wallet_id, "D1", 500)]).unwrap();
        txn.commit().unwrap();

        let txn = storage.transaction();
        let err = log.append(&txn, &[deposit(wallet_id, "D1", 500)]).unwrap_err();
        assert!(matches!(err, Error::DuplicateOperation(_)));
        drop(txn);

        assert_eq!(log.find_by_wallet(wallet_id).unwrap().len(), 1);
    }

    #[test]
    fn test_uncommitted_append_leaves_no_trace() {
        let (log, storage, _temp) = test_log();
        let wallet_id = WalletId::generate();

        let txn = storage.transaction();
        log.append(&txn, &[deposit(wallet_id, "D1", 500)]).unwrap();
        txn.rollback().unwrap();

        assert!(!log.exists(TransactionType::Deposit, "D1").unwrap());
        assert!(log.find_by_wallet(wallet_id).unwrap().is_empty());
    }

    #[test]
    fn test_find_by_wallet_newest_first() {
        let (log, storage, _temp) = test_log();
        let wallet_id = WalletId::generate();
        let other_wallet = WalletId::generate();

        for (i, reference) in ["D1", "D2", "D3"].iter().enumerate() {
            let txn = storage.transaction();
            log.append(&txn, &[deposit(wallet_id, reference, (i as i64 + 1) * 100)])
                .unwrap();
            txn.commit().unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        let txn = storage.transaction();
        log.append(&txn, &[deposit(other_wallet, "X1", 1)]).unwrap();
        txn.commit().unwrap();

        let entries = log.find_by_wallet(wallet_id).unwrap();
        let references: Vec<&str> = entries.iter().map(|e| e.reference.as_str()).collect();
        assert_eq!(references, vec!["D3", "D2", "D1"]);
    }

    #[test]
    fn test_mixed_append_rejected() {
        let (log, storage, _temp) = test_log();
        let wallet_id = WalletId::generate();

        let txn = storage.transaction();
        let err = log
            .append(&txn, &[deposit(wallet_id, "D1", 1), deposit(wallet_id, "D2", 1)])
            .unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
        assert!(matches!(log.append(&txn, &[]), Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn test_find_by_reference_returns_both_legs() {
        let (log, storage, _temp) = test_log();
        let sender = WalletId::generate();
        let recipient = WalletId::generate();

        let debit = Transaction::success(sender, -300, TransactionType::Transfer, "TRF-1", "out");
        let credit = Transaction::success(recipient, 300, TransactionType::Transfer, "TRF-1", "in");

        let txn = storage.transaction();
        log.append(&txn, &[debit.clone(), credit.clone()]).unwrap();
        txn.commit().unwrap();

        let legs = log.find_by_reference(TransactionType::Transfer, "TRF-1").unwrap();
        assert_eq!(legs, vec![debit, credit]);
        assert!(log
            .find_by_reference(TransactionType::Deposit, "TRF-1")
            .unwrap()
            .is_empty());
    }
}
