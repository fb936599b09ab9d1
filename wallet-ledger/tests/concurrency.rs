//! Concurrent access to shared wallets
//!
//! Threads call the synchronous engine directly so that they really contend
//! on the same row locks.

use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;
use wallet_ledger::{Config, CreditOutcome, Error, LedgerEngine, OwnerId, Result};

fn shared_engine() -> (Arc<LedgerEngine>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();
    config.locking.lock_timeout_ms = 10_000;
    (Arc::new(LedgerEngine::open(config).unwrap()), temp_dir)
}

fn open_funded(engine: &LedgerEngine, owner: &str, balance: i64) -> (OwnerId, String) {
    let owner = OwnerId::new(owner);
    let wallet = engine.open_wallet(&owner).unwrap();
    if balance > 0 {
        engine
            .credit_wallet(&format!("seed-{}", owner), balance, Some(&owner))
            .unwrap();
    }
    (owner, wallet.wallet_number.unwrap().to_string())
}

/// Retry an operation while it fails with a retryable error
fn with_retry<T>(mut op: impl FnMut() -> Result<T>) -> Result<T> {
    loop {
        match op() {
            Err(e) if e.is_retryable() => thread::yield_now(),
            other => return other,
        }
    }
}

#[test]
fn concurrent_debits_never_overdraw() {
    let (engine, _temp) = shared_engine();
    let (sender, _) = open_funded(&engine, "sender", 1000);

    let threads = 20;
    let amount = 100;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let engine = engine.clone();
            let barrier = barrier.clone();
            let sender = sender.clone();
            let (_, recipient) = open_funded(&engine, &format!("recipient-{}", i), 0);
            thread::spawn(move || {
                barrier.wait();
                with_retry(|| engine.transfer(&sender, &recipient, amount))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(Error::InsufficientFunds { .. })))
        .count();

    assert_eq!(succeeded, 10);
    assert_eq!(refused, threads - 10);
    assert_eq!(engine.get_balance(&sender).unwrap().balance, 0);
    assert_eq!(engine.total_balance().unwrap(), 1000);
    assert!(engine.verify_wallet(&sender).unwrap());
}

#[test]
fn opposite_transfers_do_not_deadlock() {
    let (engine, _temp) = shared_engine();
    let (alice, alice_number) = open_funded(&engine, "alice", 10_000);
    let (bob, bob_number) = open_funded(&engine, "bob", 10_000);

    let rounds = 50;
    let barrier = Arc::new(Barrier::new(2));

    let forward = {
        let engine = engine.clone();
        let barrier = barrier.clone();
        let alice = alice.clone();
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..rounds {
                with_retry(|| engine.transfer(&alice, &bob_number, 7)).unwrap();
            }
        })
    };
    let backward = {
        let engine = engine.clone();
        let barrier = barrier.clone();
        let bob = bob.clone();
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..rounds {
                with_retry(|| engine.transfer(&bob, &alice_number, 3)).unwrap();
            }
        })
    };
    forward.join().unwrap();
    backward.join().unwrap();

    assert_eq!(engine.get_balance(&alice).unwrap().balance, 10_000 - rounds * 4);
    assert_eq!(engine.get_balance(&bob).unwrap().balance, 10_000 + rounds * 4);
    assert_eq!(engine.total_balance().unwrap(), 20_000);
}

/// Without deadlock detection a lock cycle would stall until the lock
/// timeout; ordered locking means every call succeeds on first attempt.
#[test]
fn opposite_transfers_need_no_retry() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();
    config.locking.lock_timeout_ms = 2_000;
    config.locking.deadlock_detect = false;
    let engine = Arc::new(LedgerEngine::open(config).unwrap());

    let (alice, alice_number) = open_funded(&engine, "alice", 10_000);
    let (bob, bob_number) = open_funded(&engine, "bob", 10_000);

    let rounds = 50;
    let barrier = Arc::new(Barrier::new(2));
    let spawn_leg = |from: OwnerId, to: String, amount: i64| {
        let engine = engine.clone();
        let barrier = barrier.clone();
        thread::spawn(move || {
            barrier.wait();
            (0..rounds)
                .map(|_| engine.transfer(&from, &to, amount))
                .collect::<Vec<_>>()
        })
    };
    let forward = spawn_leg(alice.clone(), bob_number, 7);
    let backward = spawn_leg(bob.clone(), alice_number, 3);

    for result in forward.join().unwrap().into_iter().chain(backward.join().unwrap()) {
        if let Err(e) = result {
            panic!("transfer failed: {}", e);
        }
    }

    assert_eq!(engine.get_balance(&alice).unwrap().balance, 10_000 - rounds * 4);
    assert_eq!(engine.get_balance(&bob).unwrap().balance, 10_000 + rounds * 4);
}

#[test]
fn verify_is_consistent_while_credits_commit() {
    let (engine, _temp) = shared_engine();
    let (owner, _) = open_funded(&engine, "owner", 1000);

    let writer = {
        let engine = engine.clone();
        let owner = owner.clone();
        thread::spawn(move || {
            for i in 0..100 {
                with_retry(|| engine.credit_wallet(&format!("D{}", i), 5, Some(&owner))).unwrap();
            }
        })
    };

    while !writer.is_finished() {
        assert!(with_retry(|| engine.verify_wallet(&owner)).unwrap());
    }
    writer.join().unwrap();

    assert!(engine.verify_wallet(&owner).unwrap());
    assert_eq!(engine.get_balance(&owner).unwrap().balance, 1500);
}

#[test]
fn concurrent_replays_credit_once() {
    let (engine, _temp) = shared_engine();
    let (owner, _) = open_funded(&engine, "owner", 0);

    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let engine = engine.clone();
            let barrier = barrier.clone();
            let owner = owner.clone();
            thread::spawn(move || {
                barrier.wait();
                with_retry(|| engine.credit_wallet("D1", 500, Some(&owner))).unwrap()
            })
        })
        .collect();

    let outcomes: Vec<CreditOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(outcomes.iter().filter(|o| o.is_applied()).count(), 1);

    assert_eq!(engine.get_balance(&owner).unwrap().balance, 500);
    assert_eq!(engine.get_transactions(&owner).unwrap().len(), 1);
}

#[test]
fn concurrent_opens_yield_one_wallet() {
    let (engine, _temp) = shared_engine();
    let owner = OwnerId::new("owner");

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let engine = engine.clone();
            let barrier = barrier.clone();
            let owner = owner.clone();
            thread::spawn(move || {
                barrier.wait();
                with_retry(|| engine.open_wallet(&owner)).unwrap()
            })
        })
        .collect();

    let wallets: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(wallets.iter().all(|w| w.id == wallets[0].id));
    assert_eq!(engine.stats().unwrap().total_wallets, 1);
}
