//! Contract descriptors, artifacts and local binding

use super::tokens::tokenize_all;
use crate::chain::Client;
use crate::error::{SubmitterError, SubmitterResult};

use ethers::abi::{Abi, Function};
use ethers::types::{Address, Bytes};
use ethers::utils::to_checksum;
use serde_json::Value;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Address plus interface of a deployed contract
#[derive(Debug, Clone)]
pub struct ContractDescriptor {
    pub address: Address,
    pub abi: Abi,
}

impl ContractDescriptor {
    pub fn new(address: &str, abi: Abi) -> SubmitterResult<Self> {
        Ok(Self {
            address: parse_address(address)?,
            abi,
        })
    }

    /// Descriptor with the ABI read from a JSON file
    pub fn from_abi_file(address: &str, path: &Path) -> SubmitterResult<Self> {
        Self::new(address, load_abi(path)?)
    }
}

/// Compiled contract: interface plus init bytecode
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub abi: Abi,
    pub bytecode: Bytes,
}

impl ContractArtifact {
    pub fn load(path: &Path) -> SubmitterResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SubmitterError::InvalidInterface(format!("Cannot read artifact {:?}: {}", path, e))
        })?;
        Self::from_json(&text)
    }

    /// Parse a Hardhat or Foundry artifact
    ///
    /// Foundry nests the bytecode as `{"object": "0x..."}`; Hardhat stores the
    /// string directly.
    pub fn from_json(text: &str) -> SubmitterResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| SubmitterError::InvalidInterface(format!("Artifact is not JSON: {}", e)))?;

        let abi_value = value
            .get("abi")
            .cloned()
            .ok_or_else(|| SubmitterError::InvalidInterface("Artifact has no abi".to_string()))?;
        let abi = abi_from_value(abi_value)?;

        let code = match value.get("bytecode") {
            Some(Value::String(s)) => s.as_str(),
            Some(Value::Object(obj)) => obj.get("object").and_then(Value::as_str).unwrap_or(""),
            _ => "",
        };

        let hex_code = code.trim().trim_start_matches("0x");
        if hex_code.is_empty() {
            return Err(SubmitterError::InvalidInterface(
                "Artifact has no bytecode (is the contract abstract or uncompiled?)".to_string(),
            ));
        }

        let bytecode = hex::decode(hex_code).map_err(|e| {
            SubmitterError::InvalidInterface(format!("Bytecode is not valid hex: {}", e))
        })?;

        Ok(Self {
            abi,
            bytecode: bytecode.into(),
        })
    }
}

/// Read an ABI from a JSON file
pub fn load_abi(path: &Path) -> SubmitterResult<Abi> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        SubmitterError::InvalidInterface(format!("Cannot read ABI {:?}: {}", path, e))
    })?;
    parse_abi_json(&text)
}

/// Parse a JSON ABI array, an artifact object, or a list of human-readable signatures
pub fn parse_abi_json(text: &str) -> SubmitterResult<Abi> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| SubmitterError::InvalidInterface(format!("ABI is not JSON: {}", e)))?;
    abi_from_value(value)
}

fn abi_from_value(value: Value) -> SubmitterResult<Abi> {
    match value {
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_string) => {
            let signatures: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            ethers::abi::parse_abi(&signatures)
                .map_err(|e| SubmitterError::InvalidInterface(e.to_string()))
        }
        Value::Array(_) => serde_json::from_value::<Abi>(value)
            .map_err(|e| SubmitterError::InvalidInterface(e.to_string())),
        Value::Object(mut obj) => match obj.remove("abi") {
            Some(inner) => abi_from_value(inner),
            None => Err(SubmitterError::InvalidInterface(
                "Expected an ABI array or an object with an abi field".to_string(),
            )),
        },
        _ => Err(SubmitterError::InvalidInterface(
            "Expected an ABI array".to_string(),
        )),
    }
}

/// Parse a 20-byte hex address, enforcing EIP-55 when the input is mixed case
pub fn parse_address(input: &str) -> SubmitterResult<Address> {
    let invalid = |message: &str| SubmitterError::InvalidAddress {
        address: input.to_string(),
        message: message.to_string(),
    };

    let trimmed = input.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid("expected 40 hex characters"));
    }

    let address = Address::from_str(hex_part).map_err(|e| invalid(&e.to_string()))?;

    let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    if has_upper && has_lower && to_checksum(&address, None)[2..] != *hex_part {
        return Err(invalid("EIP-55 checksum mismatch"));
    }

    Ok(address)
}

/// Init bytecode followed by the ABI-encoded constructor arguments
pub fn encode_deployment(abi: &Abi, bytecode: &Bytes, args: &[Value]) -> SubmitterResult<Bytes> {
    match abi.constructor() {
        Some(constructor) => {
            let tokens = tokenize_all(&constructor.inputs, args)?;
            constructor
                .encode_input(bytecode.to_vec(), &tokens)
                .map(Bytes::from)
                .map_err(|e| SubmitterError::Encoding(e.to_string()))
        }
        None if args.is_empty() => Ok(bytecode.clone()),
        None => Err(SubmitterError::Encoding(format!(
            "Interface declares no constructor but {} argument(s) were given",
            args.len()
        ))),
    }
}

/// A descriptor bound to a client and signer
pub struct BoundContract<C> {
    client: Arc<C>,
    address: Address,
    abi: Abi,
}

impl<C: Client> BoundContract<C> {
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn abi(&self) -> &Abi {
        &self.abi
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// True if the interface declares `name` at all
    pub fn has_function(&self, name: &str) -> bool {
        self.abi.functions.contains_key(name)
    }

    /// Resolve `name`, picking the overload that takes `arg_count` inputs
    pub fn function(&self, name: &str, arg_count: usize) -> SubmitterResult<&Function> {
        self.abi
            .functions
            .get(name)
            .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == arg_count))
            .ok_or_else(|| SubmitterError::UnknownFunction {
                name: name.to_string(),
                arg_count,
            })
    }
}

/// Associate a client with a contract address and interface
///
/// No network call is made.
pub fn bind<C: Client>(
    client: Arc<C>,
    descriptor: ContractDescriptor,
) -> SubmitterResult<BoundContract<C>> {
    let ContractDescriptor { address, abi } = descriptor;

    if abi.functions.is_empty() {
        return Err(SubmitterError::InvalidInterface(
            "Interface declares no functions".to_string(),
        ));
    }

    for (name, overloads) in &abi.functions {
        for function in overloads {
            if function.name != *name {
                return Err(SubmitterError::InvalidInterface(format!(
                    "Function {} is filed under {}",
                    function.name, name
                )));
            }
        }
    }

    Ok(BoundContract {
        client,
        address,
        abi,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockClient;
    use serde_json::json;

    const ERC20_HUMAN: &str = r#"[
        "constructor()",
        "function name() view returns (string)",
        "function symbol() view returns (string)",
        "function totalSupply() view returns (uint256)",
        "function balanceOf(address) view returns (uint256)"
    ]"#;

    #[test]
    fn test_human_readable_abi() {
        let abi = parse_abi_json(ERC20_HUMAN).unwrap();
        assert!(abi.constructor().is_some());
        assert_eq!(abi.functions.len(), 4);
        assert_eq!(abi.function("balanceOf").unwrap().inputs.len(), 1);
    }

    #[test]
    fn test_json_abi_and_artifact_wrapper() {
        let abi = json!([{
            "type": "function",
            "name": "batchMint",
            "stateMutability": "nonpayable",
            "inputs": [
                {"name": "to", "type": "address"},
                {"name": "uris", "type": "string[]"}
            ],
            "outputs": []
        }]);

        let direct = parse_abi_json(&abi.to_string()).unwrap();
        assert!(direct.function("batchMint").is_ok());

        let wrapped = parse_abi_json(&json!({ "abi": abi }).to_string()).unwrap();
        assert!(wrapped.function("batchMint").is_ok());
    }

    #[test]
    fn test_malformed_abi() {
        for text in ["{", "42", r#"{"contractName": "X"}"#, r#"["function ("]"#] {
            let err = parse_abi_json(text).unwrap_err();
            assert_eq!(err.kind(), "InvalidInterfaceError", "input {}", text);
        }
    }

    #[test]
    fn test_artifact_bytecode_forms() {
        let hardhat = json!({
            "abi": ["function name() view returns (string)"],
            "bytecode": "0x6080604052"
        });
        let artifact = ContractArtifact::from_json(&hardhat.to_string()).unwrap();
        assert_eq!(artifact.bytecode.to_vec(), vec![0x60, 0x80, 0x60, 0x40, 0x52]);

        let foundry = json!({
            "abi": [],
            "bytecode": { "object": "0x6080" }
        });
        let artifact = ContractArtifact::from_json(&foundry.to_string()).unwrap();
        assert_eq!(artifact.bytecode.len(), 2);
    }

    #[test]
    fn test_artifact_placeholder_bytecode_rejected() {
        let truncated = json!({ "abi": [], "bytecode": "0x608060405234801561001057600080fd5b50..." });
        let err = ContractArtifact::from_json(&truncated.to_string()).unwrap_err();
        assert!(err.to_string().contains("not valid hex"));

        let empty = json!({ "abi": [], "bytecode": "0x" });
        assert!(ContractArtifact::from_json(&empty.to_string()).is_err());
    }

    #[test]
    fn test_parse_address() {
        let lower = parse_address("0x8af10c657337358111c0abc2991b53ebf0b52c79").unwrap();
        let checksummed = parse_address("0x8AF10C657337358111C0ABC2991b53EbF0B52C79").unwrap();
        assert_eq!(lower, checksummed);

        let no_prefix = parse_address("8af10c657337358111c0abc2991b53ebf0b52c79").unwrap();
        assert_eq!(no_prefix, lower);

        // One flipped letter breaks the checksum
        let err = parse_address("0x8aF10C657337358111C0ABC2991b53EbF0B52C79").unwrap_err();
        assert_eq!(err.kind(), "InvalidAddressError");

        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("0xzz10c657337358111c0abc2991b53ebf0b52c79").is_err());
    }

    #[test]
    fn test_encode_deployment() {
        let bytecode = Bytes::from(vec![0x60, 0x80]);

        let abi = parse_abi_json(ERC20_HUMAN).unwrap();
        let data = encode_deployment(&abi, &bytecode, &[]).unwrap();
        assert_eq!(data, bytecode);

        let abi = ethers::abi::parse_abi(&["constructor(uint256 supply)", "function name() view returns (string)"]).unwrap();
        let data = encode_deployment(&abi, &bytecode, &[json!("1000")]).unwrap();
        assert_eq!(data.len(), 2 + 32);
        assert_eq!(data[2 + 31], 0xe8); // 1000 = 0x03e8

        let err = encode_deployment(&abi, &bytecode, &[]).unwrap_err();
        assert_eq!(err.kind(), "EncodingError");
    }

    #[test]
    fn test_bind_and_resolve_overloads() {
        let abi = ethers::abi::parse_abi(&[
            "function safeTransferFrom(address from, address to, uint256 id)",
            "function safeTransferFrom(address from, address to, uint256 id, bytes data)",
        ])
        .unwrap();
        let descriptor =
            ContractDescriptor::new("0xf647f1f7e21dbee538e676930dd5ae3133a82db5", abi).unwrap();

        let bound = bind(Arc::new(MockClient::new()), descriptor).unwrap();
        assert_eq!(bound.function("safeTransferFrom", 3).unwrap().inputs.len(), 3);
        assert_eq!(bound.function("safeTransferFrom", 4).unwrap().inputs.len(), 4);

        let err = bound.function("safeTransferFrom", 2).unwrap_err();
        assert_eq!(err.kind(), "UnknownFunctionError");
        assert!(!bound.has_function("buy"));
    }

    #[test]
    fn test_bind_rejects_empty_interface() {
        let descriptor = ContractDescriptor {
            address: Address::zero(),
            abi: Abi::default(),
        };
        let err = bind(Arc::new(MockClient::new()), descriptor).err().unwrap();
        assert_eq!(err.kind(), "InvalidInterfaceError");
    }
}
