//! Storage layer using a RocksDB pessimistic `TransactionDB`
//!
//! # Column Families
//!
//! - `wallets` - Wallet records (key: wallet_id)
//! - `owners` - Owner index, unique (key: owner_id -> wallet_id)
//! - `wallet_numbers` - Wallet number index, unique (key: number -> wallet_id)
//! - `transactions` - Append-only ledger entries (key: entry_id)
//! - `references` - Reference index, unique per type (key: type || reference -> entry ids)
//! - `wallet_entries` - Per-wallet history (key: wallet_id || created_at || entry_id)
//!
//! # Locking
//!
//! All balance mutations run inside a [`StoreTxn`]. `get_for_update` takes an
//! exclusive lock on the key that is held until commit or rollback; a second
//! transaction asking for the same key blocks until then, or fails with a
//! retryable error once the configured lock timeout elapses. Dropping a
//! `StoreTxn` without committing rolls it back.

use crate::{
    error::{Error, Result},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options,
    SingleThreaded, TransactionDB, TransactionDBOptions, TransactionOptions, WriteOptions,
};
use serde::{de::DeserializeOwned, Serialize};

/// Column family names
pub(crate) const CF_WALLETS: &str = "wallets";
pub(crate) const CF_OWNERS: &str = "owners";
pub(crate) const CF_WALLET_NUMBERS: &str = "wallet_numbers";
pub(crate) const CF_TRANSACTIONS: &str = "transactions";
pub(crate) const CF_REFERENCES: &str = "references";
pub(crate) const CF_WALLET_ENTRIES: &str = "wallet_entries";

const ALL_CFS: [&str; 6] = [
    CF_WALLETS,
    CF_OWNERS,
    CF_WALLET_NUMBERS,
    CF_TRANSACTIONS,
    CF_REFERENCES,
    CF_WALLET_ENTRIES,
];

type Db = TransactionDB<SingleThreaded>;

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Db,
    lock_timeout_ms: i64,
    deadlock_detect: bool,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("lock_timeout_ms", &self.lock_timeout_ms)
            .field("deadlock_detect", &self.deadlock_detect)
            .finish_non_exhaustive()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        // Database options
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let mut txn_db_opts = TransactionDBOptions::default();
        txn_db_opts.set_txn_lock_timeout(config.locking.lock_timeout_ms);
        txn_db_opts.set_default_lock_timeout(config.locking.lock_timeout_ms);

        let cf_descriptors = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Self::cf_options(name)))
            .collect::<Vec<_>>();

        let db: Db = TransactionDB::open_cf_descriptors(&db_opts, &txn_db_opts, path, cf_descriptors)?;

        tracing::info!(
            path = ?path,
            column_families = ALL_CFS.len(),
            lock_timeout_ms = config.locking.lock_timeout_ms,
            "Opened RocksDB transaction store"
        );

        Ok(Self {
            db,
            lock_timeout_ms: config.locking.lock_timeout_ms,
            deadlock_detect: config.locking.deadlock_detect,
        })
    }

    fn cf_options(name: &str) -> Options {
        let mut opts = Options::default();
        match name {
            // Append-only history compresses well
            CF_TRANSACTIONS | CF_WALLET_ENTRIES => {
                opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
            }
            // Point lookups on every operation
            CF_OWNERS | CF_WALLET_NUMBERS | CF_REFERENCES => {
                opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
                let mut block_opts = rocksdb::BlockBasedOptions::default();
                block_opts.set_bloom_filter(10.0, false);
                opts.set_block_based_table_factory(&block_opts);
            }
            _ => {
                opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
            }
        }
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    /// Begin a pessimistic transaction
    pub fn transaction(&self) -> StoreTxn<'_> {
        let write_opts = WriteOptions::default();
        let mut txn_opts = TransactionOptions::default();
        txn_opts.set_lock_timeout(self.lock_timeout_ms);
        txn_opts.set_deadlock_detect(self.deadlock_detect);

        StoreTxn {
            storage: self,
            txn: self.db.transaction_opt(&write_opts, &txn_opts),
        }
    }

    /// Committed value for a key (non-locking)
    pub fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf_handle(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Keys starting with `prefix`, in ascending key order
    pub fn scan_prefix_keys(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<Box<[u8]>>> {
        let cf = self.cf_handle(cf_name)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        let mut keys = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key);
        }
        Ok(keys)
    }

    /// Every value in a column family
    pub fn scan_values<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf_handle(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            values.push(decode(&value)?);
        }
        Ok(values)
    }

    fn count(&self, cf_name: &str) -> Result<u64> {
        let cf = self.cf_handle(cf_name)?;
        let mut count = 0u64;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            total_wallets: self.count(CF_WALLETS)?,
            total_transactions: self.count(CF_TRANSACTIONS)?,
        })
    }
}

/// Scoped store transaction.
///
/// Locks taken through it are released on commit, rollback or drop.
pub struct StoreTxn<'a> {
    storage: &'a Storage,
    txn: rocksdb::Transaction<'a, Db>,
}

impl std::fmt::Debug for StoreTxn<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreTxn").finish_non_exhaustive()
    }
}

impl<'a> StoreTxn<'a> {
    /// Read a key and hold an exclusive lock on it until the transaction ends.
    ///
    /// Locks absent keys too, which is what makes unique claims race-free.
    pub fn get_for_update<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.storage.cf_handle(cf_name)?;
        match self.txn.get_for_update_cf(cf, key, true)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Stage a write
    pub fn put<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.storage.cf_handle(cf_name)?;
        self.txn.put_cf(cf, key, encode(value)?)?;
        Ok(())
    }

    /// Stage a raw write with an empty value (index entries)
    pub fn put_marker(&self, cf_name: &str, key: &[u8]) -> Result<()> {
        let cf = self.storage.cf_handle(cf_name)?;
        self.txn.put_cf(cf, key, b"")?;
        Ok(())
    }

    /// Stage a write only if the key has never been committed.
    ///
    /// Fails with `DuplicateOperation` when the key exists. Concurrent
    /// claimants serialize on the key lock, so exactly one of them wins.
    pub fn insert_unique<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.storage.cf_handle(cf_name)?;
        if self.txn.get_for_update_cf(cf, key, true)?.is_some() {
            return Err(Error::DuplicateOperation(format!(
                "{} key {} already exists",
                cf_name,
                String::from_utf8_lossy(key)
            )));
        }
        self.txn.put_cf(cf, key, encode(value)?)?;
        Ok(())
    }

    /// Atomically apply every staged write and release locks
    pub fn commit(self) -> Result<()> {
        self.txn.commit()?;
        Ok(())
    }

    /// Discard staged writes and release locks
    pub fn rollback(self) -> Result<()> {
        self.txn.rollback()?;
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

/// Storage statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Wallet rows
    pub total_wallets: u64,
    /// Ledger entries
    pub total_transactions: u64,
}
