//! Error types for the transaction submitter

use thiserror::Error;

/// Main error type for contract interactions
#[derive(Error, Debug)]
pub enum SubmitterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("RPC endpoint unreachable: {0}")]
    Connectivity(String),

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Invalid contract interface: {0}")]
    InvalidInterface(String),

    #[error("Invalid address {address}: {message}")]
    InvalidAddress { address: String, message: String },

    #[error("Function {name} with {arg_count} argument(s) not found in interface")]
    UnknownFunction { name: String, arg_count: usize },

    #[error("Argument encoding error: {0}")]
    Encoding(String),

    #[error("Return value decoding error: {0}")]
    Decoding(String),

    #[error("Execution reverted: {reason}")]
    Revert {
        reason: String,
        data: Option<Vec<u8>>,
    },

    #[error("Insufficient funds: have {have} wei, need {need} wei")]
    InsufficientFunds { have: String, need: String },

    #[error("Transaction {tx_hash} reverted in block {block_number} (gas used {gas_used})")]
    TransactionFailed {
        tx_hash: String,
        block_number: u64,
        gas_used: String,
    },

    #[error("Timed out after {waited_secs}s waiting for {tx_hash}; it may have been dropped or replaced")]
    Timeout { tx_hash: String, waited_secs: u64 },

    #[error("Gas estimation error: {0}")]
    GasEstimation(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
}

impl SubmitterError {
    /// Stable name of the error kind, used in logs and exit reporting
    pub fn kind(&self) -> &'static str {
        match self {
            SubmitterError::Config(_) => "ConfigError",
            SubmitterError::Connectivity(_) => "ConnectivityError",
            SubmitterError::InvalidKey(_) => "InvalidKeyError",
            SubmitterError::InvalidInterface(_) => "InvalidInterfaceError",
            SubmitterError::InvalidAddress { .. } => "InvalidAddressError",
            SubmitterError::UnknownFunction { .. } => "UnknownFunctionError",
            SubmitterError::Encoding(_) => "EncodingError",
            SubmitterError::Decoding(_) => "DecodingError",
            SubmitterError::Revert { .. } => "RevertError",
            SubmitterError::InsufficientFunds { .. } => "InsufficientFundsError",
            SubmitterError::TransactionFailed { .. } => "TransactionFailedError",
            SubmitterError::Timeout { .. } => "TimeoutError",
            SubmitterError::GasEstimation(_) => "GasEstimationError",
            SubmitterError::Rpc(_) => "RpcError",
            SubmitterError::InvalidStateTransition { .. } => "InvalidStateTransitionError",
        }
    }

    /// True when the transaction may already be on chain
    pub fn after_broadcast(&self) -> bool {
        matches!(
            self,
            SubmitterError::TransactionFailed { .. } | SubmitterError::Timeout { .. }
        )
    }
}

/// Result type for submitter operations
pub type SubmitterResult<T> = Result<T, SubmitterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        let err = SubmitterError::InsufficientFunds {
            have: "0".to_string(),
            need: "21000".to_string(),
        };
        assert_eq!(err.kind(), "InsufficientFundsError");
        assert!(!err.after_broadcast());

        let err = SubmitterError::Timeout {
            tx_hash: "0xabc".to_string(),
            waited_secs: 5,
        };
        assert_eq!(err.kind(), "TimeoutError");
        assert!(err.after_broadcast());
    }

    #[test]
    fn test_revert_message() {
        let err = SubmitterError::Revert {
            reason: "Ownable: caller is not the owner".to_string(),
            data: None,
        };
        assert_eq!(
            err.to_string(),
            "Execution reverted: Ownable: caller is not the owner"
        );
    }
}
