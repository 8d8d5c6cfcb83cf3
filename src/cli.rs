//! Command-line interface
//!
//! Every subcommand has a matching section in the settings file; flags given
//! on the command line take precedence over the section's values.

use crate::config::{BatchMintConfig, DeployConfig, Settings, StaticCallConfig};
use crate::contract::parse_cli_arg;
use crate::scripts::{BatchMintPlan, CallPlan, DeployPlan};
use crate::tx::Overrides;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Deploy contracts and submit contract calls on an EVM chain
#[derive(Parser, Debug)]
#[command(name = "tx-submitter", author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (defaults to config/default.toml)
    #[arg(long, global = true, env = "SUBMITTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Environment variable holding the signing key
    #[arg(long, global = true)]
    pub key_env: Option<String>,

    /// Broadcast without the eth_call dry run
    #[arg(long, global = true)]
    pub no_simulate: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Deploy a compiled token and read back its metadata
    Deploy(DeployArgs),
    /// Mint a batch of token URIs in a single transaction
    BatchMint(BatchMintArgs),
    /// Simulate a function call with eth_call and print the decoded result
    StaticCall(StaticCallArgs),
    /// Call any contract function
    Call(CallArgs),
    /// Wait for a transaction receipt
    Wait(WaitArgs),
}

#[derive(Args, Debug, Default)]
pub struct DeployArgs {
    /// Hardhat or Foundry artifact with abi and bytecode
    #[arg(long)]
    pub artifact: Option<PathBuf>,
    /// Constructor argument (repeatable, JSON or plain string)
    #[arg(long = "arg")]
    pub args: Vec<String>,
    #[arg(long)]
    pub gas_price: Option<String>,
    #[arg(long)]
    pub gas_limit: Option<String>,
    /// Return as soon as the deployment is broadcast
    #[arg(long)]
    pub no_wait: bool,
}

impl DeployArgs {
    pub fn into_plan(self, section: Option<&DeployConfig>, native_symbol: &str) -> Result<DeployPlan> {
        let artifact = self
            .artifact
            .or_else(|| section.map(|s| s.artifact.clone()))
            .ok_or_else(|| anyhow!("No artifact given: pass --artifact or set [deploy].artifact"))?;

        let constructor_args = if self.args.is_empty() {
            section.map(|s| s.constructor_args.clone()).unwrap_or_default()
        } else {
            self.args.iter().map(|a| parse_cli_arg(a)).collect()
        };

        let gas_price = self.gas_price.or_else(|| section.and_then(|s| s.gas_price.clone()));
        let gas_limit = self.gas_limit.or_else(|| section.and_then(|s| s.gas_limit.clone()));

        Ok(DeployPlan {
            artifact,
            constructor_args,
            overrides: Overrides::parse(gas_price.as_deref(), gas_limit.as_deref(), None)?,
            wait: !self.no_wait,
            native_symbol: native_symbol.to_string(),
        })
    }
}

#[derive(Args, Debug, Default)]
pub struct BatchMintArgs {
    #[arg(long)]
    pub contract: Option<String>,
    #[arg(long)]
    pub abi: Option<PathBuf>,
    #[arg(long)]
    pub function: Option<String>,
    #[arg(long)]
    pub recipient: Option<String>,
    /// URI template; `{index}` is replaced by the item index
    #[arg(long)]
    pub uri_template: Option<String>,
    #[arg(long)]
    pub count: Option<usize>,
    #[arg(long)]
    pub start_index: Option<usize>,
    #[arg(long)]
    pub gas_price: Option<String>,
    #[arg(long)]
    pub gas_limit: Option<String>,
    /// Wait for the receipt
    #[arg(long)]
    pub wait: bool,
}

impl BatchMintArgs {
    pub fn into_plan(self, section: Option<&BatchMintConfig>) -> Result<BatchMintPlan> {
        let missing = |flag: &str| anyhow!("--{} is required when [batch_mint] is not configured", flag);

        let uri_template = match self.uri_template.or_else(|| section.map(|s| s.uri_template.clone())) {
            Some(template) => template,
            None => return Err(missing("uri-template")),
        };
        if !uri_template.contains("{index}") {
            anyhow::bail!("URI template {:?} has no {{index}} placeholder", uri_template);
        }

        let gas_price = self.gas_price.or_else(|| section.and_then(|s| s.gas_price.clone()));
        let gas_limit = self.gas_limit.or_else(|| section.and_then(|s| s.gas_limit.clone()));

        Ok(BatchMintPlan {
            contract: self
                .contract
                .or_else(|| section.map(|s| s.contract.clone()))
                .ok_or_else(|| missing("contract"))?,
            abi: self
                .abi
                .or_else(|| section.map(|s| s.abi.clone()))
                .ok_or_else(|| missing("abi"))?,
            function: self
                .function
                .or_else(|| section.map(|s| s.function.clone()))
                .unwrap_or_else(|| "batchMint".to_string()),
            recipient: self
                .recipient
                .or_else(|| section.map(|s| s.recipient.clone()))
                .ok_or_else(|| missing("recipient"))?,
            uri_template,
            start_index: self
                .start_index
                .or_else(|| section.map(|s| s.start_index))
                .unwrap_or(0),
            count: self
                .count
                .or_else(|| section.map(|s| s.count))
                .ok_or_else(|| missing("count"))?,
            overrides: Overrides::parse(gas_price.as_deref(), gas_limit.as_deref(), None)?,
            wait: self.wait || section.map(|s| s.wait).unwrap_or(false),
        })
    }
}

#[derive(Args, Debug, Default)]
pub struct StaticCallArgs {
    #[arg(long)]
    pub contract: Option<String>,
    #[arg(long)]
    pub abi: Option<PathBuf>,
    #[arg(long)]
    pub function: Option<String>,
    /// Value sent along with the simulated call
    #[arg(long)]
    pub value: Option<String>,
    /// Function arguments (JSON or plain strings)
    pub args: Vec<String>,
}

impl StaticCallArgs {
    pub fn into_plan(self, section: Option<&StaticCallConfig>) -> Result<CallPlan> {
        let missing = |flag: &str| anyhow!("--{} is required when [static_call] is not configured", flag);

        let args = if self.args.is_empty() {
            section.map(|s| s.args.clone()).unwrap_or_default()
        } else {
            self.args.iter().map(|a| parse_cli_arg(a)).collect()
        };
        let value = self.value.or_else(|| section.and_then(|s| s.value.clone()));

        Ok(CallPlan {
            contract: self
                .contract
                .or_else(|| section.map(|s| s.contract.clone()))
                .ok_or_else(|| missing("contract"))?,
            abi: self
                .abi
                .or_else(|| section.map(|s| s.abi.clone()))
                .ok_or_else(|| missing("abi"))?,
            function: self
                .function
                .or_else(|| section.map(|s| s.function.clone()))
                .ok_or_else(|| missing("function"))?,
            args,
            read_only: true,
            overrides: Overrides::parse(None, None, value.as_deref())?,
            wait: false,
        })
    }
}

#[derive(Args, Debug)]
pub struct CallArgs {
    #[arg(long)]
    pub contract: String,
    #[arg(long)]
    pub abi: PathBuf,
    pub function: String,
    /// Function arguments (JSON or plain strings)
    pub args: Vec<String>,
    /// Simulate only; nothing is broadcast
    #[arg(long)]
    pub read_only: bool,
    #[arg(long)]
    pub value: Option<String>,
    #[arg(long)]
    pub gas_price: Option<String>,
    #[arg(long)]
    pub gas_limit: Option<String>,
    /// Wait for the receipt
    #[arg(long)]
    pub wait: bool,
}

impl CallArgs {
    pub fn into_plan(self) -> Result<CallPlan> {
        Ok(CallPlan {
            overrides: Overrides::parse(
                self.gas_price.as_deref(),
                self.gas_limit.as_deref(),
                self.value.as_deref(),
            )?,
            contract: self.contract,
            abi: self.abi,
            function: self.function,
            args: self.args.iter().map(|a| parse_cli_arg(a)).collect(),
            read_only: self.read_only,
            wait: self.wait,
        })
    }
}

#[derive(Args, Debug)]
pub struct WaitArgs {
    /// Hash of a broadcast transaction
    pub tx_hash: String,
}

impl Cli {
    /// Environment variable to read the signing key from
    pub fn signing_key_env<'a>(&'a self, settings: &'a Settings) -> &'a str {
        if let Some(var) = &self.key_env {
            return var;
        }
        if let Command::StaticCall(_) = self.command {
            if let Some(var) = settings
                .static_call
                .as_ref()
                .and_then(|s| s.private_key_env.as_deref())
            {
                return var;
            }
        }
        &settings.wallet.private_key_env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U256;
    use serde_json::json;

    const SETTINGS: &str = r#"
        [network]
        name = "bsc-testnet"
        rpc_url = "http://127.0.0.1:8545"

        [batch_mint]
        contract = "0xa1d19005917C7aC862a6A9a9900c3A493B790bee"
        abi = "abi/Marketplace.json"
        recipient = "0x8AF10C657337358111C0ABC2991b53EbF0B52C79"
        uri_template = "ipfs://cid/cItem{index}.json"
        count = 60
        gas_price = "10 gwei"
        gas_limit = "0x1C9C380"

        [static_call]
        contract = "0xf647f1f7e21dbee538e676930dd5ae3133a82db5"
        abi = "abi/ERC721.json"
        function = "buy"
        args = [8, "0x1a2093ac3ff9798ae4609f5fa2ead3152f33b99a"]
        private_key_env = "ACCOUNT2"
    "#;

    fn settings() -> Settings {
        Settings::from_toml(SETTINGS).unwrap()
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from([
            "tx-submitter",
            "deploy",
            "--artifact",
            "out/CMCcoin.json",
            "--no-simulate",
            "--key-env",
            "OTHER_KEY",
        ])
        .unwrap();

        assert!(cli.no_simulate);
        assert_eq!(cli.signing_key_env(&settings()), "OTHER_KEY");
        assert!(matches!(cli.command, Command::Deploy(_)));
    }

    #[test]
    fn test_static_call_uses_section_key() {
        let cli = Cli::try_parse_from(["tx-submitter", "static-call"]).unwrap();
        assert_eq!(cli.signing_key_env(&settings()), "ACCOUNT2");

        let cli = Cli::try_parse_from(["tx-submitter", "batch-mint"]).unwrap();
        assert_eq!(cli.signing_key_env(&settings()), "DEPLOYER");
    }

    #[test]
    fn test_batch_mint_flags_override_section() {
        let settings = settings();
        let cli = Cli::try_parse_from(["tx-submitter", "batch-mint", "--count", "3", "--wait"]).unwrap();
        let Command::BatchMint(args) = cli.command else {
            panic!("expected batch-mint");
        };

        let plan = args.into_plan(settings.batch_mint.as_ref()).unwrap();
        assert_eq!(plan.count, 3);
        assert!(plan.wait);
        assert_eq!(plan.function, "batchMint");
        assert_eq!(plan.overrides.gas_price, Some(U256::from(10_000_000_000u64)));
        assert_eq!(plan.overrides.gas_limit, Some(U256::from(30_000_000u64)));
    }

    #[test]
    fn test_batch_mint_without_section() {
        let err = BatchMintArgs::default().into_plan(None).unwrap_err();
        assert!(err.to_string().contains("--uri-template"));

        let args = BatchMintArgs {
            uri_template: Some("ipfs://cid/static.json".to_string()),
            ..BatchMintArgs::default()
        };
        assert!(args.into_plan(None).is_err());
    }

    #[test]
    fn test_static_call_plan() {
        let settings = settings();
        let plan = StaticCallArgs::default()
            .into_plan(settings.static_call.as_ref())
            .unwrap();
        assert!(plan.read_only);
        assert_eq!(plan.function, "buy");
        assert_eq!(plan.args, vec![json!(8), json!("0x1a2093ac3ff9798ae4609f5fa2ead3152f33b99a")]);

        let cli = Cli::try_parse_from([
            "tx-submitter",
            "static-call",
            "--function",
            "price",
            "7",
            "1000000000000000000",
        ])
        .unwrap();
        let Command::StaticCall(args) = cli.command else {
            panic!("expected static-call");
        };
        let plan = args.into_plan(settings.static_call.as_ref()).unwrap();
        assert_eq!(plan.function, "price");
        assert_eq!(plan.args, vec![json!(7), json!("1000000000000000000")]);
    }

    #[test]
    fn test_call_and_wait_parsing() {
        let cli = Cli::try_parse_from([
            "tx-submitter",
            "call",
            "--contract",
            "0xf647f1f7e21dbee538e676930dd5ae3133a82db5",
            "--abi",
            "abi/ERC721.json",
            "--value",
            "0.5 ether",
            "--wait",
            "deposit",
        ])
        .unwrap();
        let Command::Call(args) = cli.command else {
            panic!("expected call");
        };
        let plan = args.into_plan().unwrap();
        assert_eq!(plan.function, "deposit");
        assert!(!plan.read_only);
        assert!(plan.wait);
        assert_eq!(plan.overrides.value, Some(U256::from(500_000_000_000_000_000u64)));

        let cli = Cli::try_parse_from(["tx-submitter", "wait", "0xabc"]).unwrap();
        assert!(matches!(cli.command, Command::Wait(WaitArgs { ref tx_hash }) if tx_hash == "0xabc"));

        assert!(Cli::try_parse_from(["tx-submitter", "wait"]).is_err());
        assert!(Cli::try_parse_from(["tx-submitter"]).is_err());
    }

    #[test]
    fn test_deploy_plan_requires_artifact() {
        let err = DeployArgs::default().into_plan(None, "ETH").unwrap_err();
        assert!(err.to_string().contains("--artifact"));

        let plan = DeployArgs {
            artifact: Some(PathBuf::from("out/Token.json")),
            args: vec!["1000".to_string()],
            ..DeployArgs::default()
        }
        .into_plan(None, "BNB")
        .unwrap();
        assert!(plan.wait);
        assert_eq!(plan.constructor_args, vec![json!(1000)]);
        assert_eq!(plan.native_symbol, "BNB");
    }
}
