//! Call requests, overrides and results

use super::state::TxState;
use crate::contract::{parse_amount, token_to_json};
use crate::error::SubmitterResult;

use ethers::abi::Token;
use ethers::types::{Address, TransactionReceipt, H256, U256, U64};
use serde::Serialize;
use serde_json::Value;

/// Explicit transaction fields; whatever is `None` is estimated
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub gas_price: Option<U256>,
    pub gas_limit: Option<U256>,
    pub value: Option<U256>,
}

impl Overrides {
    /// Parse overrides given as amount strings (`"10 gwei"`, `"0x1C9C380"`)
    pub fn parse(
        gas_price: Option<&str>,
        gas_limit: Option<&str>,
        value: Option<&str>,
    ) -> SubmitterResult<Self> {
        Ok(Self {
            gas_price: gas_price.map(parse_amount).transpose()?,
            gas_limit: gas_limit.map(parse_amount).transpose()?,
            value: value.map(parse_amount).transpose()?,
        })
    }
}

/// One contract function invocation
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub function: String,
    pub args: Vec<Value>,
    /// Simulate with `eth_call` instead of sending a transaction
    pub read_only: bool,
    pub overrides: Overrides,
    /// Block until the transaction is confirmed
    pub wait: bool,
}

impl CallRequest {
    pub fn read(function: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            function: function.into(),
            args,
            read_only: true,
            overrides: Overrides::default(),
            wait: false,
        }
    }

    pub fn write(function: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            read_only: false,
            ..Self::read(function, args)
        }
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn wait_for_receipt(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }
}

/// Decoded return value of a read-only call
#[derive(Debug, Clone, Serialize)]
pub struct DecodedValue {
    pub function: String,
    pub values: Vec<Value>,
    #[serde(skip)]
    pub tokens: Vec<Token>,
}

impl DecodedValue {
    pub fn new(function: impl Into<String>, tokens: Vec<Token>) -> Self {
        Self {
            function: function.into(),
            values: tokens.iter().map(token_to_json).collect(),
            tokens,
        }
    }

    /// The only return value, for single-output functions
    pub fn single(&self) -> Option<&Token> {
        match self.tokens.as_slice() {
            [token] => Some(token),
            _ => None,
        }
    }
}

/// Outcome of an invocation
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallResult {
    /// State-changing call; `receipt` is `None` while pending
    Submitted {
        tx_hash: H256,
        nonce: U256,
        state: TxState,
        receipt: Option<Receipt>,
    },
    /// Read-only call
    Value(DecodedValue),
}

impl CallResult {
    pub fn tx_hash(&self) -> Option<H256> {
        match self {
            CallResult::Submitted { tx_hash, .. } => Some(*tx_hash),
            CallResult::Value(_) => None,
        }
    }
}

/// Mined transaction summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    pub tx_hash: H256,
    pub success: bool,
    pub block_number: u64,
    pub gas_used: U256,
    pub effective_gas_price: Option<U256>,
    pub contract_address: Option<Address>,
}

impl Receipt {
    /// `None` while the node reports the receipt without a block
    pub fn from_rpc(receipt: &TransactionReceipt) -> Option<Self> {
        let block_number = receipt.block_number?;

        Some(Self {
            tx_hash: receipt.transaction_hash,
            // Pre-Byzantium receipts carry no status and are not proof of a revert
            success: receipt.status.map_or(true, |status| status == U64::from(1)),
            block_number: block_number.as_u64(),
            gas_used: receipt.gas_used.unwrap_or_default(),
            effective_gas_price: receipt.effective_gas_price,
            contract_address: receipt.contract_address,
        })
    }
}

/// Outcome of a contract deployment
#[derive(Debug, Clone, Serialize)]
pub struct DeployResult {
    pub tx_hash: H256,
    pub nonce: U256,
    pub contract_address: Address,
    pub state: TxState,
    pub receipt: Option<Receipt>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overrides_parse() {
        let overrides = Overrides::parse(Some("10 gwei"), Some("0x1C9C380"), None).unwrap();
        assert_eq!(overrides.gas_price, Some(U256::from(10_000_000_000u64)));
        assert_eq!(overrides.gas_limit, Some(U256::from(30_000_000u64)));
        assert_eq!(overrides.value, None);

        assert!(Overrides::parse(Some("cheap"), None, None).is_err());
    }

    #[test]
    fn test_request_builders() {
        let read = CallRequest::read("name", vec![]);
        assert!(read.read_only);
        assert!(!read.wait);

        let write = CallRequest::write("batchMint", vec![json!("0x00")]).wait_for_receipt(true);
        assert!(!write.read_only);
        assert!(write.wait);
        assert_eq!(write.args.len(), 1);
    }

    #[test]
    fn test_receipt_requires_block() {
        let mut raw = TransactionReceipt::default();
        assert!(Receipt::from_rpc(&raw).is_none());

        raw.block_number = Some(U64::from(12));
        raw.status = Some(U64::from(0));
        let receipt = Receipt::from_rpc(&raw).unwrap();
        assert_eq!(receipt.block_number, 12);
        assert!(!receipt.success);
    }

    #[test]
    fn test_receipt_without_status_is_not_a_revert() {
        let raw = TransactionReceipt {
            block_number: Some(U64::from(3)),
            status: None,
            ..Default::default()
        };
        assert!(Receipt::from_rpc(&raw).unwrap().success);
    }

    #[test]
    fn test_result_serialization() {
        let value = CallResult::Value(DecodedValue::new(
            "totalSupply",
            vec![Token::Uint(U256::exp10(24))],
        ));
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["kind"], "value");
        assert_eq!(json["values"][0], "1000000000000000000000000");
        assert!(value.tx_hash().is_none());
    }
}
