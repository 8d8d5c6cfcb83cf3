//! Chain module - the RPC capability surface the submitter depends on
//!
//! This module provides:
//! - The `Client` trait: balance, nonce, gas, call, sign, broadcast, receipt
//! - `RpcClient`, the ethers-rs binding over HTTP JSON-RPC with a local signer

pub mod provider;

pub use provider::{GasPrice, RpcClient};

use crate::error::SubmitterResult;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};

/// Everything a contract interaction needs from a node and a signer
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Client: Send + Sync {
    /// Address of the bound signer
    fn address(&self) -> Address;

    /// Chain ID reported by the node at connect time
    fn chain_id(&self) -> u64;

    async fn get_balance(&self, address: Address) -> SubmitterResult<U256>;

    /// Next nonce for `address`, counting pending transactions
    async fn get_transaction_count(&self, address: Address) -> SubmitterResult<U256>;

    async fn get_gas_price(&self) -> SubmitterResult<GasPrice>;

    async fn get_block_number(&self) -> SubmitterResult<u64>;

    async fn estimate_gas(&self, tx: &TypedTransaction) -> SubmitterResult<U256>;

    /// Execute against latest state without creating a transaction
    async fn call(&self, tx: &TypedTransaction) -> SubmitterResult<Bytes>;

    /// Sign with the bound key, returning the raw RLP bytes
    async fn sign_transaction(&self, tx: &TypedTransaction) -> SubmitterResult<Bytes>;

    async fn send_raw_transaction(&self, raw: Bytes) -> SubmitterResult<H256>;

    async fn get_receipt(&self, tx_hash: H256) -> SubmitterResult<Option<TransactionReceipt>>;
}
