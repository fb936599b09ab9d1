//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `wallet_ledger_credits_total` - Deposits applied
//! - `wallet_ledger_duplicate_credits_total` - Deposit replays absorbed
//! - `wallet_ledger_transfers_total` - Transfers committed
//! - `wallet_ledger_rejected_operations_total` - Failed operations by reason
//! - `wallet_ledger_wallets_provisioned_total` - Wallets opened
//! - `wallet_ledger_operation_duration_seconds` - Latency by operation

use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Deposits applied
    pub credits_total: IntCounter,

    /// Deposit replays absorbed
    pub duplicate_credits_total: IntCounter,

    /// Transfers committed
    pub transfers_total: IntCounter,

    /// Failed operations by error type
    pub rejected_total: IntCounterVec,

    /// Wallets opened
    pub wallets_provisioned: IntCounter,

    /// Operation latency
    pub operation_duration: HistogramVec,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("credits_total", &self.credits_total.get())
            .field("transfers_total", &self.transfers_total.get())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let credits_total = IntCounter::new("wallet_ledger_credits_total", "Deposits applied")?;
        registry.register(Box::new(credits_total.clone()))?;

        let duplicate_credits_total = IntCounter::new(
            "wallet_ledger_duplicate_credits_total",
            "Deposit replays absorbed without a balance change",
        )?;
        registry.register(Box::new(duplicate_credits_total.clone()))?;

        let transfers_total =
            IntCounter::new("wallet_ledger_transfers_total", "Transfers committed")?;
        registry.register(Box::new(transfers_total.clone()))?;

        let rejected_total = IntCounterVec::new(
            Opts::new(
                "wallet_ledger_rejected_operations_total",
                "Failed operations by reason",
            ),
            &["operation", "reason"],
        )?;
        registry.register(Box::new(rejected_total.clone()))?;

        let wallets_provisioned =
            IntCounter::new("wallet_ledger_wallets_provisioned_total", "Wallets opened")?;
        registry.register(Box::new(wallets_provisioned.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "wallet_ledger_operation_duration_seconds",
                "Ledger operation latency",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            credits_total,
            duplicate_credits_total,
            transfers_total,
            rejected_total,
            wallets_provisioned,
            operation_duration,
            registry,
        })
    }

    /// Record applied credit
    pub fn record_credit(&self) {
        self.credits_total.inc();
    }

    /// Record absorbed deposit replay
    pub fn record_duplicate_credit(&self) {
        self.duplicate_credits_total.inc();
    }

    /// Record committed transfer
    pub fn record_transfer(&self) {
        self.transfers_total.inc();
    }

    /// Record failed operation
    pub fn record_rejection(&self, operation: &str, error: &crate::Error) {
        self.rejected_total
            .with_label_values(&[operation, error.error_type()])
            .inc();
    }

    /// Record opened wallet
    pub fn record_wallet_provisioned(&self) {
        self.wallets_provisioned.inc();
    }

    /// Latency histogram for one operation
    pub fn duration(&self, operation: &str) -> Histogram {
        self.operation_duration.with_label_values(&[operation])
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
