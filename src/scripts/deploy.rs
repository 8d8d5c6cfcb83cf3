//! Token deployment followed by a metadata read-back

use crate::chain::Client;
use crate::contract::{bind, BoundContract, ContractArtifact, ContractDescriptor};
use crate::error::{SubmitterError, SubmitterResult};
use crate::tx::{CallRequest, CallResult, DeployResult, Overrides, TransactionSubmitter};

use ethers::abi::Token;
use ethers::types::U256;
use ethers::utils::{format_ether, to_checksum};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

const TOKEN_READS: [&str; 4] = ["name", "symbol", "totalSupply", "balanceOf"];

#[derive(Debug, Clone)]
pub struct DeployPlan {
    pub artifact: PathBuf,
    pub constructor_args: Vec<Value>,
    pub overrides: Overrides,
    pub wait: bool,
    /// Unit label for the signer balance log line
    pub native_symbol: String,
}

/// ERC-20 metadata read from the fresh contract, amounts in ether units
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub total_supply: String,
    pub deployer_balance: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    #[serde(flatten)]
    pub deployment: DeployResult,
    pub token: Option<TokenInfo>,
    pub explorer_url: Option<String>,
}

pub async fn run_deploy<C: Client>(
    client: Arc<C>,
    submitter: &TransactionSubmitter,
    plan: DeployPlan,
) -> SubmitterResult<DeployReport> {
    let artifact = ContractArtifact::load(&plan.artifact)?;

    let deployer = client.address();
    info!("Deploying from address: {}", to_checksum(&deployer, None));
    let balance = client.get_balance(deployer).await?;
    info!("Balance: {} {}", format_ether(balance), plan.native_symbol);

    let deployment = submitter
        .deploy(
            client.as_ref(),
            &artifact,
            &plan.constructor_args,
            &plan.overrides,
            plan.wait,
        )
        .await?;
    info!("Transaction hash: {:?}", deployment.tx_hash);

    let token = if deployment.receipt.is_some() {
        info!(
            "Contract deployed at {}",
            to_checksum(&deployment.contract_address, None)
        );
        read_token_info(client, submitter, &artifact, &deployment).await?
    } else {
        None
    };

    Ok(DeployReport {
        deployment,
        token,
        explorer_url: None,
    })
}

async fn read_token_info<C: Client>(
    client: Arc<C>,
    submitter: &TransactionSubmitter,
    artifact: &ContractArtifact,
    deployment: &DeployResult,
) -> SubmitterResult<Option<TokenInfo>> {
    if artifact.abi.functions.is_empty() {
        return Ok(None);
    }

    let deployer = to_checksum(&client.address(), None);
    let contract = bind(
        client,
        ContractDescriptor {
            address: deployment.contract_address,
            abi: artifact.abi.clone(),
        },
    )?;

    if !TOKEN_READS.iter().all(|name| contract.has_function(name)) {
        debug!("Artifact is not an ERC-20 interface, skipping token reads");
        return Ok(None);
    }

    let name = read_single(submitter, &contract, CallRequest::read("name", vec![])).await?;
    let symbol = read_single(submitter, &contract, CallRequest::read("symbol", vec![])).await?;
    let total_supply =
        read_single(submitter, &contract, CallRequest::read("totalSupply", vec![])).await?;
    let deployer_balance = read_single(
        submitter,
        &contract,
        CallRequest::read("balanceOf", vec![json!(deployer)]),
    )
    .await?;

    let info = TokenInfo {
        name: as_string(name)?,
        symbol: as_string(symbol)?,
        total_supply: format_ether(as_uint(total_supply)?),
        deployer_balance: format_ether(as_uint(deployer_balance)?),
    };
    info!(
        "Token {} ({}), total supply {}, deployer balance {}",
        info.name, info.symbol, info.total_supply, info.deployer_balance
    );

    Ok(Some(info))
}

async fn read_single<C: Client>(
    submitter: &TransactionSubmitter,
    contract: &BoundContract<C>,
    request: CallRequest,
) -> SubmitterResult<Token> {
    let function = request.function.clone();
    match submitter.invoke(contract, request).await? {
        CallResult::Value(value) => value.single().cloned().ok_or_else(|| {
            SubmitterError::Decoding(format!("{} did not return exactly one value", function))
        }),
        CallResult::Submitted { .. } => Err(SubmitterError::Decoding(format!(
            "{} was sent as a transaction",
            function
        ))),
    }
}

fn as_string(token: Token) -> SubmitterResult<String> {
    match token {
        Token::String(s) => Ok(s),
        other => Err(SubmitterError::Decoding(format!("expected string, got {:?}", other))),
    }
}

fn as_uint(token: Token) -> SubmitterResult<U256> {
    match token {
        Token::Uint(u) => Ok(u),
        other => Err(SubmitterError::Decoding(format!("expected uint, got {:?}", other))),
    }
}
