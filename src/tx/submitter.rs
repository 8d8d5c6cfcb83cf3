//! Transaction submitter: one contract interaction from calldata to receipt
//!
//! A state-changing call goes through balance check, nonce lookup, gas
//! resolution, optional simulation, signing and broadcast. Nothing is retried;
//! the first failure is returned to the caller.

use super::confirmation::ConfirmationWatcher;
use super::gas::GasEstimator;
use super::request::{CallRequest, CallResult, DecodedValue, DeployResult, Overrides, Receipt};
use super::state::{TrackedTransaction, TxState};
use crate::chain::{Client, GasPrice};
use crate::config::SubmissionConfig;
use crate::contract::{decode_revert, encode_deployment, tokenize_all, BoundContract, ContractArtifact};
use crate::error::{SubmitterError, SubmitterResult};

use ethers::abi::{Abi, StateMutability};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Eip1559TransactionRequest, TransactionRequest, H256, U256};
use ethers::utils::get_contract_address;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Builds, signs and broadcasts transactions for one signer
pub struct TransactionSubmitter {
    gas_estimator: GasEstimator,
    watcher: ConfirmationWatcher,
    simulate_before_broadcast: bool,
}

impl TransactionSubmitter {
    pub fn new(config: &SubmissionConfig) -> Self {
        Self {
            gas_estimator: GasEstimator::new(
                config.gas_limit_buffer_percent,
                config.gas_price_buffer_percent,
            ),
            watcher: ConfirmationWatcher::new(
                config.confirmations,
                Duration::from_millis(config.poll_interval_ms),
                Duration::from_secs(config.confirmation_timeout_secs),
            ),
            simulate_before_broadcast: config.simulate_before_broadcast,
        }
    }

    /// Toggle the `eth_call` dry run that precedes every broadcast
    pub fn with_simulation(mut self, enabled: bool) -> Self {
        self.simulate_before_broadcast = enabled;
        self
    }

    /// Call a function on a bound contract
    ///
    /// Read-only requests are answered with `eth_call` and never produce a
    /// transaction. Anything else is broadcast and its hash returned; the
    /// receipt is only awaited when the request asks for it.
    pub async fn invoke<C: Client>(
        &self,
        contract: &BoundContract<C>,
        request: CallRequest,
    ) -> SubmitterResult<CallResult> {
        let function = contract.function(&request.function, request.args.len())?;
        let tokens = tokenize_all(&function.inputs, &request.args)?;
        let data: Bytes = function
            .encode_input(&tokens)
            .map_err(|e| SubmitterError::Encoding(e.to_string()))?
            .into();
        let client = contract.client().as_ref();

        if request.read_only {
            let mut call = TransactionRequest::new()
                .from(client.address())
                .to(contract.address())
                .data(data);
            if let Some(value) = request.overrides.value {
                call = call.value(value);
            }

            debug!("eth_call {} on {:?}", function.name, contract.address());
            let output = client
                .call(&call.into())
                .await
                .map_err(|e| refine_revert(e, Some(contract.abi())))?;

            let decoded = function
                .decode_output(&output)
                .map_err(|e| SubmitterError::Decoding(format!("{}: {}", function.name, e)))?;
            return Ok(CallResult::Value(DecodedValue::new(function.name.clone(), decoded)));
        }

        let value = request.overrides.value.unwrap_or_default();
        if !value.is_zero() && function.state_mutability != StateMutability::Payable {
            return Err(SubmitterError::Encoding(format!(
                "{} is not payable but a value of {} wei was given",
                function.name, value
            )));
        }

        let mut tracked = self
            .submit(
                client,
                Some(contract.address()),
                data,
                &request.overrides,
                Some(contract.abi()),
            )
            .await?;

        let receipt = if request.wait {
            Some(self.settle(client, &mut tracked).await?)
        } else {
            None
        };

        Ok(CallResult::Submitted {
            tx_hash: pending_hash(&tracked)?,
            nonce: tracked.nonce(),
            state: tracked.state(),
            receipt,
        })
    }

    /// Deploy init bytecode plus encoded constructor arguments
    ///
    /// The address is predicted from the sender and the nonce used; a mined
    /// receipt's `contractAddress` takes precedence.
    pub async fn deploy<C: Client + ?Sized>(
        &self,
        client: &C,
        artifact: &ContractArtifact,
        args: &[Value],
        overrides: &Overrides,
        wait: bool,
    ) -> SubmitterResult<DeployResult> {
        let data = encode_deployment(&artifact.abi, &artifact.bytecode, args)?;
        let mut tracked = self
            .submit(client, None, data, overrides, Some(&artifact.abi))
            .await?;

        let nonce = tracked.nonce();
        let predicted = get_contract_address(client.address(), nonce);
        info!("Deployment pending, expected address {:?}", predicted);

        let receipt = if wait {
            Some(self.settle(client, &mut tracked).await?)
        } else {
            None
        };

        let contract_address = match receipt.as_ref().and_then(|r| r.contract_address) {
            Some(mined) => {
                if mined != predicted {
                    warn!(
                        "Receipt reports contract at {:?}, predicted {:?}",
                        mined, predicted
                    );
                }
                mined
            }
            None => predicted,
        };

        Ok(DeployResult {
            tx_hash: pending_hash(&tracked)?,
            nonce,
            contract_address,
            state: tracked.state(),
            receipt,
        })
    }

    /// Wait for an already broadcast transaction
    pub async fn wait_for_confirmation<C: Client + ?Sized>(
        &self,
        client: &C,
        tx_hash: H256,
    ) -> SubmitterResult<Receipt> {
        self.watcher.wait(client, tx_hash).await
    }

    async fn submit<C: Client + ?Sized>(
        &self,
        client: &C,
        to: Option<Address>,
        data: Bytes,
        overrides: &Overrides,
        abi: Option<&Abi>,
    ) -> SubmitterResult<TrackedTransaction> {
        let from = client.address();
        let value = overrides.value.unwrap_or_default();

        let balance = client.get_balance(from).await?;
        if balance.is_zero() {
            return Err(SubmitterError::InsufficientFunds {
                have: "0".to_string(),
                need: "a non-zero balance".to_string(),
            });
        }

        let nonce = client.get_transaction_count(from).await?;

        let mut probe = TransactionRequest::new()
            .from(from)
            .data(data.clone())
            .value(value)
            .nonce(nonce);
        if let Some(to) = to {
            probe = probe.to(to);
        }

        let gas_limit = self
            .gas_estimator
            .gas_limit(client, &probe.into(), overrides)
            .await
            .map_err(|e| match e {
                SubmitterError::Rpc(message) => SubmitterError::GasEstimation(message),
                other => refine_revert(other, abi),
            })?;
        let gas_price = self.gas_estimator.gas_price(client, overrides).await?;

        let need = GasEstimator::max_cost(gas_limit, &gas_price, value);
        if balance < need {
            return Err(SubmitterError::InsufficientFunds {
                have: balance.to_string(),
                need: need.to_string(),
            });
        }

        let tx = build_tx(from, to, data, value, nonce, gas_limit, &gas_price, client.chain_id());
        let mut tracked = TrackedTransaction::new(tx);

        if self.simulate_before_broadcast {
            debug!("Simulating transaction with nonce {}", nonce);
            client
                .call(tracked.tx())
                .await
                .map_err(|e| refine_revert(e, abi))?;
        }

        let raw = client.sign_transaction(tracked.tx()).await?;
        let local_hash = tracked.mark_signed(&raw)?;
        debug!("Signed {:?} ({} bytes)", local_hash, raw.len());

        tracked.mark_broadcast()?;
        let node_hash = client
            .send_raw_transaction(raw)
            .await
            .map_err(|e| refine_revert(e, abi))?;
        tracked.mark_pending(node_hash)?;

        info!(
            "Transaction sent: {:?} (nonce {}, gas limit {}, {:?})",
            node_hash, nonce, gas_limit, gas_price
        );

        Ok(tracked)
    }

    async fn settle<C: Client + ?Sized>(
        &self,
        client: &C,
        tracked: &mut TrackedTransaction,
    ) -> SubmitterResult<Receipt> {
        let tx_hash = pending_hash(tracked)?;

        match self.watcher.wait(client, tx_hash).await {
            Ok(receipt) => {
                tracked.settle(TxState::Confirmed)?;
                Ok(receipt)
            }
            Err(e) => {
                let outcome = match e {
                    SubmitterError::TransactionFailed { .. } => Some(TxState::Reverted),
                    SubmitterError::Timeout { .. } => Some(TxState::Dropped),
                    _ => None,
                };
                if let Some(outcome) = outcome {
                    tracked.settle(outcome)?;
                }
                Err(e)
            }
        }
    }
}

/// Replace the node's generic revert message with the decoded reason
pub fn refine_revert(err: SubmitterError, abi: Option<&Abi>) -> SubmitterError {
    match err {
        SubmitterError::Revert {
            reason,
            data: Some(data),
        } if !data.is_empty() => SubmitterError::Revert {
            reason: decode_revert(&data, abi).unwrap_or(reason),
            data: Some(data),
        },
        other => other,
    }
}

fn pending_hash(tracked: &TrackedTransaction) -> SubmitterResult<H256> {
    tracked.hash().ok_or_else(|| SubmitterError::InvalidStateTransition {
        from: tracked.state().to_string(),
        to: TxState::Pending.to_string(),
    })
}

#[allow(clippy::too_many_arguments)]
fn build_tx(
    from: Address,
    to: Option<Address>,
    data: Bytes,
    value: U256,
    nonce: U256,
    gas_limit: U256,
    gas_price: &GasPrice,
    chain_id: u64,
) -> TypedTransaction {
    match gas_price {
        GasPrice::Legacy(price) => {
            let mut tx = TransactionRequest::new()
                .from(from)
                .data(data)
                .value(value)
                .nonce(nonce)
                .gas(gas_limit)
                .gas_price(*price)
                .chain_id(chain_id);
            if let Some(to) = to {
                tx = tx.to(to);
            }
            TypedTransaction::Legacy(tx)
        }
        GasPrice::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } => {
            let mut tx = Eip1559TransactionRequest::new()
                .from(from)
                .data(data)
                .value(value)
                .nonce(nonce)
                .gas(gas_limit)
                .max_fee_per_gas(*max_fee_per_gas)
                .max_priority_fee_per_gas(*max_priority_fee_per_gas)
                .chain_id(chain_id);
            if let Some(to) = to {
                tx = tx.to(to);
            }
            TypedTransaction::Eip1559(tx)
        }
    }
}
