//! Gas limit and price resolution

use super::request::Overrides;
use crate::chain::{Client, GasPrice};
use crate::error::SubmitterResult;

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::U256;
use tracing::debug;

/// Gas estimator for transactions
pub struct GasEstimator {
    /// Buffer percentage for gas limit (e.g., 20 = 20% buffer)
    gas_limit_buffer_percent: u64,
    /// Buffer percentage for gas price
    gas_price_buffer_percent: u64,
}

impl GasEstimator {
    /// Create a new gas estimator
    pub fn new(gas_limit_buffer_percent: u64, gas_price_buffer_percent: u64) -> Self {
        Self {
            gas_limit_buffer_percent,
            gas_price_buffer_percent,
        }
    }

    /// Explicit gas limit, or the node's estimate plus buffer
    pub async fn gas_limit<C: Client + ?Sized>(
        &self,
        client: &C,
        tx: &TypedTransaction,
        overrides: &Overrides,
    ) -> SubmitterResult<U256> {
        if let Some(limit) = overrides.gas_limit {
            return Ok(limit);
        }

        let estimate = client.estimate_gas(tx).await?;
        let buffered = estimate + estimate * self.gas_limit_buffer_percent / 100;
        debug!("Gas estimate {} -> limit {}", estimate, buffered);
        Ok(buffered)
    }

    /// Explicit gas price (always legacy), or the node's quote plus buffer
    pub async fn gas_price<C: Client + ?Sized>(
        &self,
        client: &C,
        overrides: &Overrides,
    ) -> SubmitterResult<GasPrice> {
        if let Some(price) = overrides.gas_price {
            return Ok(GasPrice::Legacy(price));
        }

        let quoted = client.get_gas_price().await?;
        let buffered = self.buffered(&quoted);
        debug!("Gas price for chain {}: {:?}", client.chain_id(), buffered);
        Ok(buffered)
    }

    fn buffered(&self, gas_price: &GasPrice) -> GasPrice {
        match gas_price {
            GasPrice::Legacy(price) => {
                let buffer = *price * self.gas_price_buffer_percent / 100;
                GasPrice::Legacy(*price + buffer)
            }
            GasPrice::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let fee_buffer = *max_fee_per_gas * self.gas_price_buffer_percent / 100;
                let priority_buffer =
                    *max_priority_fee_per_gas * self.gas_price_buffer_percent / 100;
                GasPrice::Eip1559 {
                    max_fee_per_gas: *max_fee_per_gas + fee_buffer,
                    max_priority_fee_per_gas: *max_priority_fee_per_gas + priority_buffer,
                }
            }
        }
    }

    /// Calculate total gas cost in wei
    pub fn calculate_cost(gas_limit: U256, gas_price: &GasPrice) -> U256 {
        gas_limit.saturating_mul(gas_price.max_per_gas())
    }

    /// Most the signer can be charged: gas cost plus transferred value
    pub fn max_cost(gas_limit: U256, gas_price: &GasPrice, value: U256) -> U256 {
        Self::calculate_cost(gas_limit, gas_price).saturating_add(value)
    }
}

impl Default for GasEstimator {
    fn default() -> Self {
        Self::new(20, 0)
    }
}
