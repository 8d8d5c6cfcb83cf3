//! Static calls, arbitrary contract calls and receipt waiting

use super::bind_from_file;
use crate::chain::Client;
use crate::error::{SubmitterError, SubmitterResult};
use crate::tx::{CallRequest, CallResult, Overrides, Receipt, TransactionSubmitter};

use ethers::types::H256;
use serde_json::Value;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct CallPlan {
    pub contract: String,
    pub abi: PathBuf,
    pub function: String,
    pub args: Vec<Value>,
    /// Simulate with `eth_call`, whatever the function's declared mutability
    pub read_only: bool,
    pub overrides: Overrides,
    pub wait: bool,
}

pub async fn run_call<C: Client>(
    client: Arc<C>,
    submitter: &TransactionSubmitter,
    plan: CallPlan,
) -> SubmitterResult<CallResult> {
    let contract = bind_from_file(client, &plan.contract, &plan.abi)?;

    info!(
        "{} {}.{} with {} argument(s)",
        if plan.read_only { "Static call" } else { "Calling" },
        plan.contract,
        plan.function,
        plan.args.len()
    );

    let request = CallRequest {
        function: plan.function,
        args: plan.args,
        read_only: plan.read_only,
        overrides: plan.overrides,
        wait: plan.wait,
    };

    submitter.invoke(&contract, request).await
}

/// Wait for a transaction sent earlier, by hash
pub async fn run_wait<C: Client>(
    client: Arc<C>,
    submitter: &TransactionSubmitter,
    tx_hash: &str,
) -> SubmitterResult<Receipt> {
    let trimmed = tx_hash.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if hex_part.len() != 64 {
        return Err(SubmitterError::Config(format!(
            "Transaction hash {:?} is not 32 bytes of hex",
            tx_hash
        )));
    }
    let hash = H256::from_str(hex_part)
        .map_err(|e| SubmitterError::Config(format!("Invalid transaction hash: {}", e)))?;

    info!("Waiting for {:?}", hash);
    submitter.wait_for_confirmation(client.as_ref(), hash).await
}
