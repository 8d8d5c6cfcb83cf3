//! Batch minting: every token URI goes into a single call

use super::bind_from_file;
use crate::chain::Client;
use crate::contract::parse_address;
use crate::error::{SubmitterError, SubmitterResult};
use crate::tx::{CallRequest, CallResult, Overrides, TransactionSubmitter};

use ethers::utils::to_checksum;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct BatchMintPlan {
    pub contract: String,
    pub abi: PathBuf,
    pub function: String,
    pub recipient: String,
    pub uri_template: String,
    pub start_index: usize,
    pub count: usize,
    pub overrides: Overrides,
    pub wait: bool,
}

/// Expand `{index}` in the template for `count` consecutive indices
pub fn token_uris(
    template: &str,
    start_index: usize,
    count: usize,
) -> SubmitterResult<Vec<String>> {
    let end = start_index.checked_add(count).ok_or_else(|| {
        SubmitterError::Config(format!(
            "start index {} plus count {} overflows",
            start_index, count
        ))
    })?;

    Ok((start_index..end)
        .map(|i| template.replace("{index}", &i.to_string()))
        .collect())
}

/// Mint `plan.count` tokens to the recipient in one transaction
pub async fn run_batch_mint<C: Client>(
    client: Arc<C>,
    submitter: &TransactionSubmitter,
    plan: BatchMintPlan,
) -> SubmitterResult<CallResult> {
    let recipient = parse_address(&plan.recipient)?;
    let contract = bind_from_file(client, &plan.contract, &plan.abi)?;

    let uris = token_uris(&plan.uri_template, plan.start_index, plan.count)?;
    info!(
        "Minting {} tokens to {} via {}.{}",
        uris.len(),
        to_checksum(&recipient, None),
        plan.contract,
        plan.function
    );

    let args = vec![
        json!(to_checksum(&recipient, None)),
        Value::Array(uris.into_iter().map(Value::String).collect()),
    ];
    let request = CallRequest::write(plan.function, args)
        .with_overrides(plan.overrides)
        .wait_for_receipt(plan.wait);

    let result = submitter.invoke(&contract, request).await?;
    if let Some(tx_hash) = result.tx_hash() {
        info!("Batch mint transaction: {:?}", tx_hash);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::test_support::funded_client;
    use crate::config::SubmissionConfig;
    use crate::tx::TxState;
    use ethers::abi::{ParamType, Token};
    use ethers::types::transaction::eip2718::TypedTransaction;
    use ethers::types::{Bytes, H256, U256};
    use ethers::utils::{id, keccak256, parse_ether};
    use std::io::Write;
    use std::sync::Mutex;

    const TEMPLATE: &str =
        "ipfs://QmVcNNAmbbcSVvxacQGZoMacKQQDtSDMBcKynUy73f1Mpk/cItems/cItem{index}.json";

    fn marketplace_abi() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            json!(["function batchMint(address to, string[] tokenURIs)"])
        )
        .unwrap();
        file
    }

    #[test]
    fn test_token_uris() {
        let uris = token_uris(TEMPLATE, 0, 60).unwrap();
        assert_eq!(uris.len(), 60);
        assert_eq!(
            uris[0],
            "ipfs://QmVcNNAmbbcSVvxacQGZoMacKQQDtSDMBcKynUy73f1Mpk/cItems/cItem0.json"
        );
        assert!(uris[59].ends_with("cItem59.json"));

        let offset = token_uris("uri/{index}", 100, 2).unwrap();
        assert_eq!(offset, vec!["uri/100", "uri/101"]);
        assert!(token_uris(TEMPLATE, 0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_token_uris_range_overflow() {
        let err = token_uris(TEMPLATE, usize::MAX, 2).unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
    }

    #[tokio::test]
    async fn test_sixty_uris_one_transaction() {
        let abi = marketplace_abi();
        let signed: Arc<Mutex<Vec<TypedTransaction>>> = Arc::default();
        let captured = signed.clone();

        let mut mock = funded_client(parse_ether(1).unwrap(), 12);
        mock.expect_call().returning(|_| Ok(Bytes::new()));
        mock.expect_sign_transaction().times(1).returning(move |tx| {
            captured.lock().unwrap().push(tx.clone());
            Ok(tx.rlp())
        });
        mock.expect_send_raw_transaction()
            .times(1)
            .returning(|raw| Ok(H256::from(keccak256(&raw))));

        let plan = BatchMintPlan {
            contract: "0xa1d19005917C7aC862a6A9a9900c3A493B790bee".to_string(),
            abi: abi.path().to_path_buf(),
            function: "batchMint".to_string(),
            recipient: "0x8AF10C657337358111C0ABC2991b53EbF0B52C79".to_string(),
            uri_template: TEMPLATE.to_string(),
            start_index: 0,
            count: 60,
            overrides: Overrides::parse(Some("10 gwei"), Some("0x1C9C380"), None).unwrap(),
            wait: false,
        };

        let submitter = TransactionSubmitter::new(&SubmissionConfig::default());
        let result = run_batch_mint(Arc::new(mock), &submitter, plan).await.unwrap();

        match result {
            CallResult::Submitted { nonce, state, .. } => {
                assert_eq!(nonce, U256::from(12));
                assert_eq!(state, TxState::Pending);
            }
            other => panic!("unexpected result {:?}", other),
        }

        let signed = signed.lock().unwrap();
        assert_eq!(signed.len(), 1);

        let data = signed[0].data().unwrap();
        assert_eq!(&data[..4], &id("batchMint(address,string[])")[..]);

        let decoded = ethers::abi::decode(
            &[
                ParamType::Address,
                ParamType::Array(Box::new(ParamType::String)),
            ],
            &data[4..],
        )
        .unwrap();
        assert_eq!(
            decoded[0],
            Token::Address(parse_address("0x8AF10C657337358111C0ABC2991b53EbF0B52C79").unwrap())
        );
        match &decoded[1] {
            Token::Array(uris) => {
                assert_eq!(uris.len(), 60);
                assert_eq!(
                    uris[59],
                    Token::String(
                        "ipfs://QmVcNNAmbbcSVvxacQGZoMacKQQDtSDMBcKynUy73f1Mpk/cItems/cItem59.json"
                            .to_string()
                    )
                );
            }
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bad_recipient_rejected_before_rpc() {
        let abi = marketplace_abi();
        let plan = BatchMintPlan {
            contract: "0xa1d19005917C7aC862a6A9a9900c3A493B790bee".to_string(),
            abi: abi.path().to_path_buf(),
            function: "batchMint".to_string(),
            recipient: "0x8AF1".to_string(),
            uri_template: TEMPLATE.to_string(),
            start_index: 0,
            count: 3,
            overrides: Overrides::default(),
            wait: false,
        };

        let submitter = TransactionSubmitter::new(&SubmissionConfig::default());
        let err = run_batch_mint(Arc::new(crate::chain::MockClient::new()), &submitter, plan)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidAddressError");
    }
}
