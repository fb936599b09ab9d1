//! Property-based tests for ledger invariants
//!
//! - Money conservation: transfers never create or destroy funds
//! - No overdraft: rejected debits leave balances untouched
//! - Idempotency: each deposit reference credits at most once
//! - Reconstruction: balances equal the sum of their entries

use proptest::prelude::*;
use std::collections::HashMap;
use tempfile::TempDir;
use wallet_ledger::{Config, Error, LedgerEngine, OwnerId};

const OWNERS: [&str; 3] = ["alice", "bob", "carol"];

#[derive(Debug, Clone)]
enum Op {
    Deposit { owner: usize, reference: u8, amount: i64 },
    Transfer { from: usize, to: usize, amount: i64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..OWNERS.len(), 0u8..16, 1i64..5_000)
            .prop_map(|(owner, reference, amount)| Op::Deposit { owner, reference, amount }),
        (0..OWNERS.len(), 0..OWNERS.len(), 1i64..5_000)
            .prop_map(|(from, to, amount)| Op::Transfer { from, to, amount }),
    ]
}

/// Create test engine with temp directory
fn create_test_engine() -> (LedgerEngine, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();
    (LedgerEngine::open(config).unwrap(), temp_dir)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: total balance equals the sum of distinct deposits, whatever transfers ran
    #[test]
    fn prop_money_conservation(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let (engine, _temp) = create_test_engine();
        let owners: Vec<OwnerId> = OWNERS.iter().map(|o| OwnerId::new(*o)).collect();
        let numbers: Vec<String> = owners
            .iter()
            .map(|o| engine.open_wallet(o).unwrap().wallet_number.unwrap().to_string())
            .collect();

        let mut deposited: HashMap<u8, i64> = HashMap::new();
        let mut expected = vec![0i64; owners.len()];

        for op in ops {
            match op {
                Op::Deposit { owner, reference, amount } => {
                    let outcome = engine
                        .credit_wallet(&format!("D{}", reference), amount, Some(&owners[owner]))
                        .unwrap();
                    prop_assert_eq!(outcome.is_applied(), !deposited.contains_key(&reference));
                    if outcome.is_applied() {
                        deposited.insert(reference, amount);
                        expected[owner] += amount;
                    }
                }
                Op::Transfer { from, to, amount } => {
                    match engine.transfer(&owners[from], &numbers[to], amount) {
                        Ok(_) => {
                            expected[from] -= amount;
                            expected[to] += amount;
                        }
                        Err(Error::Validation(_)) => prop_assert_eq!(from, to),
                        Err(Error::InsufficientFunds { available, .. }) => {
                            prop_assert!(expected[from] < amount);
                            prop_assert_eq!(available as i64, expected[from]);
                        }
                        Err(e) => prop_assert!(false, "unexpected error: {}", e),
                    }
                }
            }
        }

        let total: i64 = deposited.values().sum();
        prop_assert_eq!(engine.total_balance().unwrap(), total as u128);

        for (i, owner) in owners.iter().enumerate() {
            prop_assert_eq!(engine.get_balance(owner).unwrap().balance as i64, expected[i]);
            prop_assert!(engine.verify_wallet(owner).unwrap());
        }
    }

    /// Property: replaying deposit references never changes a balance twice
    #[test]
    fn prop_deposit_idempotence(references in prop::collection::vec(0u8..8, 1..30)) {
        let (engine, _temp) = create_test_engine();
        let owner = OwnerId::new("alice");
        engine.open_wallet(&owner).unwrap();

        let mut seen = std::collections::HashSet::new();
        for reference in &references {
            let amount = 100 + *reference as i64;
            engine
                .credit_wallet(&format!("D{}", reference), amount, Some(&owner))
                .unwrap();
            seen.insert(*reference);
        }

        let expected: u64 = seen.iter().map(|r| 100 + *r as u64).sum();
        prop_assert_eq!(engine.get_balance(&owner).unwrap().balance, expected);
        prop_assert_eq!(engine.get_transactions(&owner).unwrap().len(), seen.len());
    }
}
