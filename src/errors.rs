//! Error types for the wallet coin ledger, storage and recovery layers
//!
//! Every fallible operation in the crate returns [`WalletResult`]. The variants
//! mirror how each failure is handled: `UnknownSerial` is benign and only tells
//! the caller a revealed coin belongs to someone else, `DenominationUnsupported`
//! rejects a single record, `ValueMismatch` and `ConflictingLink` are surfaced to
//! the caller, and `SecretsCorrupted` halts startup.

use thiserror::Error;

use crate::data_structures::{
    denomination::CoinEpoch,
    types::{Amount, SerialNumber, TxId},
};

/// Result alias used across the crate
pub type WalletResult<T> = Result<T, WalletError>;

/// Wallet error taxonomy
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// A spend revealed a serial with no matching local secret
    #[error("Unknown serial number {0}")]
    UnknownSerial(SerialNumber),

    /// A value outside the enumerated denomination set of the epoch
    #[error("Denomination {value} is not supported by {epoch}")]
    DenominationUnsupported { value: Amount, epoch: CoinEpoch },

    /// A coin conversion whose outputs do not balance its inputs
    #[error("Conversion does not balance: inputs {inputs}, outputs {outputs}, fee {fee}")]
    ValueMismatch {
        inputs: Amount,
        outputs: Amount,
        fee: Amount,
    },

    /// A serial already linked to a different spend transaction
    #[error("Serial {serial} is already spent by {existing}, refusing link to {attempted}")]
    ConflictingLink {
        serial: SerialNumber,
        existing: TxId,
        attempted: TxId,
    },

    /// The secrets table holds a record that cannot be decoded
    #[error("Mint secrets are corrupted: {0}")]
    SecretsCorrupted(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Scanning error: {0}")]
    ScanningError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Amount, available: Amount },

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Rebuilt state diverges from the state it replaced
    #[error("Consistency failure: {0}")]
    ConsistencyFailure(String),

    #[error("Recovery did not reach height {target} within {waited_secs}s (at {height:?})")]
    RecoveryTimeout {
        waited_secs: u64,
        height: Option<u64>,
        target: u64,
    },
}

impl WalletError {
    /// Errors that only mean "not ours" and never abort anything
    pub fn is_benign(&self) -> bool {
        matches!(self, WalletError::UnknownSerial(_))
    }

    /// Errors that must halt wallet startup
    pub fn is_fatal(&self) -> bool {
        matches!(self, WalletError::SecretsCorrupted(_))
    }
}

#[cfg(feature = "storage")]
impl From<tokio_rusqlite::Error> for WalletError {
    fn from(e: tokio_rusqlite::Error) -> Self {
        WalletError::StorageError(e.to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(e: serde_json::Error) -> Self {
        WalletError::StorageError(format!("Serialization failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let unknown = WalletError::UnknownSerial(SerialNumber::new([1u8; 32]));
        assert!(unknown.is_benign());
        assert!(!unknown.is_fatal());

        let corrupted = WalletError::SecretsCorrupted("row 3".to_string());
        assert!(corrupted.is_fatal());
        assert!(!corrupted.is_benign());

        let mismatch = WalletError::ValueMismatch {
            inputs: 10,
            outputs: 9,
            fee: 0,
        };
        assert!(!mismatch.is_benign());
        assert!(mismatch.to_string().contains("does not balance"));
    }
}
