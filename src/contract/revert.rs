//! Revert data decoding
//!
//! Handles the two built-in Solidity error shapes plus any custom error the
//! contract interface declares.

use super::tokens::token_to_json;

use ethers::abi::{Abi, ParamType, Token};
use ethers::types::U256;
use ethers::utils::id;

/// `Error(string)`
const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
/// `Panic(uint256)`
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Human-readable reason for revert data, or `None` if there is no data
pub fn decode_revert(data: &[u8], abi: Option<&Abi>) -> Option<String> {
    if data.is_empty() {
        return None;
    }
    if data.len() < 4 {
        return Some(format!("0x{}", hex::encode(data)));
    }

    let (selector, payload) = data.split_at(4);

    if selector == ERROR_SELECTOR {
        if let Ok(tokens) = ethers::abi::decode(&[ParamType::String], payload) {
            if let Some(Token::String(reason)) = tokens.into_iter().next() {
                return Some(reason);
            }
        }
    }

    if selector == PANIC_SELECTOR {
        if let Ok(tokens) = ethers::abi::decode(&[ParamType::Uint(256)], payload) {
            if let Some(Token::Uint(code)) = tokens.into_iter().next() {
                return Some(format!("panic 0x{:02x} ({})", code, panic_meaning(code)));
            }
        }
    }

    if let Some(abi) = abi {
        for error in abi.errors.values().flatten() {
            let kinds: Vec<ParamType> = error.inputs.iter().map(|p| p.kind.clone()).collect();
            let signature = format!(
                "{}({})",
                error.name,
                kinds.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(",")
            );
            if id(&signature) != selector {
                continue;
            }
            if let Ok(tokens) = ethers::abi::decode(&kinds, payload) {
                let args: Vec<String> = tokens
                    .iter()
                    .map(|t| match token_to_json(t) {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect();
                return Some(format!("{}({})", error.name, args.join(", ")));
            }
        }
    }

    Some(format!("0x{}", hex::encode(data)))
}

fn panic_meaning(code: U256) -> &'static str {
    match code.low_u64() {
        0x00 => "generic compiler panic",
        0x01 => "assertion failed",
        0x11 => "arithmetic overflow or underflow",
        0x12 => "division or modulo by zero",
        0x21 => "invalid enum value",
        0x22 => "corrupted storage byte array",
        0x31 => "pop on empty array",
        0x32 => "array index out of bounds",
        0x41 => "out of memory",
        0x51 => "call to uninitialized function",
        _ => "unknown panic code",
    }
}
