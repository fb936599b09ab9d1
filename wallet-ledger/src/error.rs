//! Error types for the wallet ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// Any error raised inside a store transaction aborts it; callers never see
/// a partially applied credit or transfer.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing input, non-positive amount
    #[error("Validation error: {0}")]
    Validation(String),

    /// Wallet or transaction absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Sender balance too low
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Requested debit
        required: u64,
        /// Balance at lock time
        available: u64,
    },

    /// Unique key already claimed (deposit reference, wallet number, owner)
    #[error("Duplicate operation: {0}")]
    DuplicateOperation(String),

    /// Wallet number generation exhausted its attempts
    #[error("Provisioning error: {0}")]
    Provisioning(String),

    /// Lock wait timeout or transient storage failure; safe to retry
    #[error("Retryable error: {0}")]
    Retryable(String),

    /// Caller lacks the capability for the operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Invariant violation (negative balance, overflow, broken index)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Concurrency error (blocking task panicked or was cancelled)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the caller may safely retry the whole operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Retryable(_))
    }

    /// Stable snake-case code for boundary mapping
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::NotFound(_) => "not_found",
            Error::InsufficientFunds { .. } => "insufficient_funds",
            Error::DuplicateOperation(_) => "duplicate_operation",
            Error::Provisioning(_) => "provisioning_error",
            Error::Retryable(_) => "retryable",
            Error::Unauthorized(_) => "unauthorized",
            Error::Storage(_) => "storage_error",
            Error::Serialization(_) => "serialization_error",
            Error::InvariantViolation(_) => "invariant_violation",
            Error::Concurrency(_) => "concurrency_error",
            Error::Config(_) => "config_error",
            Error::Io(_) => "io_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        use rocksdb::ErrorKind;

        match err.kind() {
            // Lock wait timeout, detected deadlock, write conflict
            ErrorKind::TimedOut | ErrorKind::Busy | ErrorKind::TryAgain => {
                Error::Retryable(err.to_string())
            }
            _ => Error::Storage(err.to_string()),
        }
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::Other(format!("metrics: {}", err))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Concurrency(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_retryable_is_retryable() {
        assert!(Error::Retryable("lock timeout".into()).is_retryable());
        assert!(!Error::Validation("bad".into()).is_retryable());
        assert!(!Error::InsufficientFunds { required: 10, available: 1 }.is_retryable());
    }

    #[test]
    fn test_error_types_are_distinct_for_transfer_failures() {
        let not_found = Error::NotFound("recipient wallet not found".into());
        let insufficient = Error::InsufficientFunds { required: 500, available: 100 };
        assert_ne!(not_found.error_type(), insufficient.error_type());
        assert_eq!(
            insufficient.to_string(),
            "Insufficient funds: required 500, available 100"
        );
    }
}
