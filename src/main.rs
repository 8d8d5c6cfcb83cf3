//! tx-submitter - deploy contracts and submit contract calls on EVM chains
//!
//! Each run connects one signer to one RPC endpoint, performs a single contract
//! interaction and prints its result as JSON on stdout.

use anyhow::Result;
use clap::Parser;
use ethers::utils::to_checksum;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

mod chain;
mod cli;
mod config;
mod contract;
mod error;
mod scripts;
mod tx;

use chain::RpcClient;
use cli::{Cli, Command};
use config::Settings;
use error::SubmitterError;
use tx::TransactionSubmitter;

#[tokio::main]
async fn main() -> ExitCode {
    // Keys and RPC URLs usually live in .env
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.json_logs);

    info!("Starting tx-submitter v{}", env!("CARGO_PKG_VERSION"));

    match run(cli).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            let kind = e
                .downcast_ref::<SubmitterError>()
                .map(SubmitterError::kind)
                .unwrap_or("Error");
            error!(kind, "{:#}", e);
            if e
                .downcast_ref::<SubmitterError>()
                .map_or(false, SubmitterError::after_broadcast)
            {
                warn!("The transaction was broadcast and may still be mined; check it before resending");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<String> {
    let settings = Settings::load(cli.config.as_deref())?;
    info!(
        "Loaded configuration for network {}",
        settings.network.name
    );

    let connection = settings.connection(Some(cli.signing_key_env(&settings)))?;
    let client = Arc::new(
        RpcClient::connect(&connection)
            .await?
            .with_gas_price_strategy(
                settings.network.gas_price_strategy.clone(),
                settings.network.max_gas_price_gwei,
            ),
    );

    let simulate = settings.submission.simulate_before_broadcast && !cli.no_simulate;
    let submitter = TransactionSubmitter::new(&settings.submission).with_simulation(simulate);

    let output = match cli.command {
        Command::Deploy(args) => {
            let plan = args.into_plan(settings.deploy.as_ref(), &settings.network.native_symbol)?;
            let mut report = scripts::run_deploy(client, &submitter, plan).await?;

            report.explorer_url = settings
                .explorer_address_url(&to_checksum(&report.deployment.contract_address, None));
            if let Some(url) = &report.explorer_url {
                info!("Explorer: {}", url);
            }
            serde_json::to_string_pretty(&report)?
        }
        Command::BatchMint(args) => {
            let plan = args.into_plan(settings.batch_mint.as_ref())?;
            let result = scripts::run_batch_mint(client, &submitter, plan).await?;
            serde_json::to_string_pretty(&result)?
        }
        Command::StaticCall(args) => {
            let plan = args.into_plan(settings.static_call.as_ref())?;
            let result = scripts::run_call(client, &submitter, plan).await?;
            serde_json::to_string_pretty(&result)?
        }
        Command::Call(args) => {
            let result = scripts::run_call(client, &submitter, args.into_plan()?).await?;
            serde_json::to_string_pretty(&result)?
        }
        Command::Wait(args) => {
            let receipt = scripts::run_wait(client, &submitter, &args.tx_hash).await?;
            serde_json::to_string_pretty(&receipt)?
        }
    };

    Ok(output)
}

fn init_logging(json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tx_submitter=debug,hyper=warn"));

    // stdout carries the JSON result, logs go to stderr
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
