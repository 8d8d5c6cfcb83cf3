//! JSON-RPC client bound to a local signing key

use super::Client;
use crate::config::{ConnectionConfig, GasPriceStrategy};
use crate::error::{SubmitterError, SubmitterResult};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider, RpcError};
use ethers::types::transaction::eip2718::TypedTransaction;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

/// HTTP provider plus the wallet that signs for it
pub struct RpcClient {
    provider: Provider<Http>,
    wallet: LocalWallet,
    chain_id: u64,
    request_timeout: Duration,
    gas_price_strategy: GasPriceStrategy,
    max_gas_price_gwei: u64,
}

impl RpcClient {
    /// Connect to the endpoint and bind the signing key
    ///
    /// The key is parsed before any network traffic, and the node must answer
    /// `eth_chainId` before a client is handed out.
    pub async fn connect(config: &ConnectionConfig) -> SubmitterResult<Self> {
        let wallet = parse_signing_key(&config.signing_key)?;

        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| {
                SubmitterError::Connectivity(format!("Invalid RPC URL {}: {}", config.rpc_url, e))
            })?
            .interval(Duration::from_millis(500));

        let chain_id = match timeout(config.request_timeout, provider.get_chainid()).await {
            Ok(Ok(id)) => id.as_u64(),
            Ok(Err(e)) => {
                return Err(SubmitterError::Connectivity(format!(
                    "{} did not answer eth_chainId: {}",
                    config.rpc_url, e
                )))
            }
            Err(_) => {
                return Err(SubmitterError::Connectivity(format!(
                    "{} timed out after {:?}",
                    config.rpc_url, config.request_timeout
                )))
            }
        };

        if let Some(expected) = config.expected_chain_id {
            if expected != chain_id {
                return Err(SubmitterError::Connectivity(format!(
                    "Endpoint reports chain {} but configuration expects {}",
                    chain_id, expected
                )));
            }
        }

        let wallet = wallet.with_chain_id(chain_id);
        info!(
            "Connected to chain {} as {:?}",
            chain_id,
            wallet.address()
        );

        Ok(Self {
            provider,
            wallet,
            chain_id,
            request_timeout: config.request_timeout,
            gas_price_strategy: GasPriceStrategy::Legacy,
            max_gas_price_gwei: 500,
        })
    }

    /// Select how gas prices are quoted when no override is given
    pub fn with_gas_price_strategy(mut self, strategy: GasPriceStrategy, max_gas_price_gwei: u64) -> Self {
        self.gas_price_strategy = strategy;
        self.max_gas_price_gwei = max_gas_price_gwei;
        self
    }

    /// Run one RPC request under the request timeout
    async fn request<T, F>(&self, operation: &str, fut: F) -> SubmitterResult<T>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        match timeout(self.request_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                debug!("{} failed: {}", operation, e);
                Err(classify_provider_error(e))
            }
            Err(_) => Err(SubmitterError::Connectivity(format!(
                "{} timed out after {:?}",
                operation, self.request_timeout
            ))),
        }
    }

    /// Estimate EIP-1559 fees
    async fn estimate_eip1559_fees(&self) -> SubmitterResult<(U256, U256)> {
        let block = self
            .request("eth_getBlockByNumber", self.provider.get_block(BlockNumber::Latest))
            .await?
            .ok_or_else(|| SubmitterError::GasEstimation("No latest block".to_string()))?;

        let base_fee = block
            .base_fee_per_gas
            .ok_or_else(|| SubmitterError::GasEstimation("No base fee in block".to_string()))?;

        let priority_fee = U256::from(2_000_000_000u64); // 2 gwei

        // Max fee = 2 * base_fee + priority_fee (buffer for block variability)
        let max_fee = base_fee * 2 + priority_fee;

        let max_gwei = U256::from(self.max_gas_price_gwei) * U256::from(1_000_000_000u64);
        let max_fee = std::cmp::min(max_fee, max_gwei);

        Ok((max_fee, std::cmp::min(priority_fee, max_fee)))
    }
}

#[async_trait]
impl Client for RpcClient {
    fn address(&self) -> Address {
        self.wallet.address()
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn get_balance(&self, address: Address) -> SubmitterResult<U256> {
        self.request("eth_getBalance", self.provider.get_balance(address, None))
            .await
    }

    async fn get_transaction_count(&self, address: Address) -> SubmitterResult<U256> {
        self.request(
            "eth_getTransactionCount",
            self.provider
                .get_transaction_count(address, Some(BlockNumber::Pending.into())),
        )
        .await
    }

    async fn get_gas_price(&self) -> SubmitterResult<GasPrice> {
        match self.gas_price_strategy {
            GasPriceStrategy::Legacy => {
                let price = self
                    .request("eth_gasPrice", self.provider.get_gas_price())
                    .await
                    .map_err(|e| SubmitterError::GasEstimation(e.to_string()))?;
                Ok(GasPrice::Legacy(price))
            }
            GasPriceStrategy::Eip1559 => {
                let (max_fee, priority_fee) = self.estimate_eip1559_fees().await?;
                Ok(GasPrice::Eip1559 {
                    max_fee_per_gas: max_fee,
                    max_priority_fee_per_gas: priority_fee,
                })
            }
        }
    }

    async fn get_block_number(&self) -> SubmitterResult<u64> {
        self.request("eth_blockNumber", self.provider.get_block_number())
            .await
            .map(|b| b.as_u64())
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> SubmitterResult<U256> {
        self.request("eth_estimateGas", self.provider.estimate_gas(tx, None))
            .await
    }

    async fn call(&self, tx: &TypedTransaction) -> SubmitterResult<Bytes> {
        self.request("eth_call", self.provider.call(tx, None)).await
    }

    async fn sign_transaction(&self, tx: &TypedTransaction) -> SubmitterResult<Bytes> {
        let mut tx = tx.clone();
        if tx.chain_id().is_none() {
            tx.set_chain_id(self.chain_id);
        }

        let signature = self
            .wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| SubmitterError::InvalidKey(format!("Signing failed: {}", e)))?;

        Ok(tx.rlp_signed(&signature))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> SubmitterResult<H256> {
        let pending = self
            .request(
                "eth_sendRawTransaction",
                self.provider.send_raw_transaction(raw),
            )
            .await?;
        Ok(pending.tx_hash())
    }

    async fn get_receipt(&self, tx_hash: H256) -> SubmitterResult<Option<TransactionReceipt>> {
        self.request(
            "eth_getTransactionReceipt",
            self.provider.get_transaction_receipt(tx_hash),
        )
        .await
    }
}

/// Gas price types
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GasPrice {
    Legacy(U256),
    Eip1559 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
}

impl GasPrice {
    /// Highest price per gas unit this quote can charge
    pub fn max_per_gas(&self) -> U256 {
        match self {
            GasPrice::Legacy(price) => *price,
            GasPrice::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }
}

/// Parse a hex private key, with or without `0x`
pub fn parse_signing_key(key: &str) -> SubmitterResult<LocalWallet> {
    let trimmed = key.trim();
    let hex_key = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex_key.len() != 64 || !hex_key.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(SubmitterError::InvalidKey(
            "expected 32 bytes of hex".to_string(),
        ));
    }

    // The key itself never goes into the error message
    hex_key
        .parse::<LocalWallet>()
        .map_err(|_| SubmitterError::InvalidKey("not a valid secp256k1 scalar".to_string()))
}

/// Map a provider failure onto the submitter's error kinds
pub fn classify_provider_error(err: ProviderError) -> SubmitterError {
    if let Some(response) = RpcError::as_error_response(&err) {
        let message = response.message.to_lowercase();

        if let Some(data) = response.as_revert_data() {
            return SubmitterError::Revert {
                reason: response.message.clone(),
                data: Some(data.to_vec()),
            };
        }
        if message.contains("revert") {
            return SubmitterError::Revert {
                reason: response.message.clone(),
                data: None,
            };
        }
        if message.contains("insufficient funds") {
            return SubmitterError::InsufficientFunds {
                have: "unknown".to_string(),
                need: "unknown".to_string(),
            };
        }

        return SubmitterError::Rpc(format!("{} (code {})", response.message, response.code));
    }

    SubmitterError::Connectivity(err.to_string())
}
