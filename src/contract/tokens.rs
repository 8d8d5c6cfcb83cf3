//! Conversion between JSON values and ABI tokens

use super::descriptor::parse_address;
use crate::error::{SubmitterError, SubmitterResult};

use ethers::abi::{Param, ParamType, Token};
use ethers::types::{I256, U256};
use ethers::utils::{parse_units, to_checksum, ParseUnits};
use serde_json::Value;

/// Encode one JSON value as a token of the given ABI type
///
/// Integers may be JSON numbers or strings. Strings accept decimal, `0x` hex,
/// and `"<amount> <unit>"` forms such as `"10 gwei"` or `"1.5 ether"`.
pub fn tokenize(kind: &ParamType, value: &Value) -> SubmitterResult<Token> {
    let mismatch = || {
        SubmitterError::Encoding(format!("Expected {} but got {}", kind, value))
    };

    match kind {
        ParamType::Address => match value {
            Value::String(s) => parse_address(s)
                .map(Token::Address)
                .map_err(|e| SubmitterError::Encoding(e.to_string())),
            _ => Err(mismatch()),
        },
        ParamType::Uint(bits) => {
            let parsed = match value {
                Value::Number(n) => n.as_u64().map(U256::from).ok_or_else(|| {
                    SubmitterError::Encoding(format!(
                        "{} is not an unsigned integer that fits in 64 bits; pass large values as strings",
                        n
                    ))
                })?,
                Value::String(s) => parse_amount(s)?,
                _ => return Err(mismatch()),
            };
            if parsed.bits() > *bits {
                return Err(SubmitterError::Encoding(format!(
                    "{} does not fit in uint{}",
                    parsed, bits
                )));
            }
            Ok(Token::Uint(parsed))
        }
        ParamType::Int(bits) => {
            let parsed = match value {
                Value::Number(n) => n.as_i64().map(I256::from),
                Value::String(s) => I256::from_dec_str(s.trim()).ok(),
                _ => None,
            }
            .ok_or_else(mismatch)?;
            if !fits_signed(parsed, *bits) {
                return Err(SubmitterError::Encoding(format!(
                    "{} does not fit in int{}",
                    parsed, bits
                )));
            }
            Ok(Token::Int(parsed.into_raw()))
        }
        ParamType::Bool => match value {
            Value::Bool(b) => Ok(Token::Bool(*b)),
            Value::String(s) if s == "true" => Ok(Token::Bool(true)),
            Value::String(s) if s == "false" => Ok(Token::Bool(false)),
            _ => Err(mismatch()),
        },
        ParamType::String => match value {
            Value::String(s) => Ok(Token::String(s.clone())),
            Value::Number(n) => Ok(Token::String(n.to_string())),
            _ => Err(mismatch()),
        },
        ParamType::Bytes => match value {
            Value::String(s) => decode_hex(s).map(Token::Bytes),
            _ => Err(mismatch()),
        },
        ParamType::FixedBytes(size) => match value {
            Value::String(s) => {
                let bytes = decode_hex(s)?;
                if bytes.len() != *size {
                    return Err(SubmitterError::Encoding(format!(
                        "bytes{} needs {} bytes, got {}",
                        size,
                        size,
                        bytes.len()
                    )));
                }
                Ok(Token::FixedBytes(bytes))
            }
            _ => Err(mismatch()),
        },
        ParamType::Array(inner) => match value {
            Value::Array(items) => items
                .iter()
                .map(|item| tokenize(inner, item))
                .collect::<SubmitterResult<Vec<_>>>()
                .map(Token::Array),
            _ => Err(mismatch()),
        },
        ParamType::FixedArray(inner, size) => match value {
            Value::Array(items) if items.len() == *size => items
                .iter()
                .map(|item| tokenize(inner, item))
                .collect::<SubmitterResult<Vec<_>>>()
                .map(Token::FixedArray),
            _ => Err(mismatch()),
        },
        ParamType::Tuple(kinds) => match value {
            Value::Array(items) if items.len() == kinds.len() => kinds
                .iter()
                .zip(items)
                .map(|(k, item)| tokenize(k, item))
                .collect::<SubmitterResult<Vec<_>>>()
                .map(Token::Tuple),
            _ => Err(mismatch()),
        },
    }
}

/// Encode a full argument list against a function's inputs
pub fn tokenize_all(params: &[Param], values: &[Value]) -> SubmitterResult<Vec<Token>> {
    if params.len() != values.len() {
        return Err(SubmitterError::Encoding(format!(
            "Expected {} argument(s), got {}",
            params.len(),
            values.len()
        )));
    }

    params
        .iter()
        .zip(values)
        .enumerate()
        .map(|(i, (param, value))| {
            tokenize(&param.kind, value).map_err(|e| {
                let label = if param.name.is_empty() {
                    format!("#{}", i)
                } else {
                    param.name.clone()
                };
                SubmitterError::Encoding(format!("argument {}: {}", label, e))
            })
        })
        .collect()
}

/// Render a decoded token as JSON
///
/// Integers become decimal strings so 256-bit values survive the round trip.
pub fn token_to_json(token: &Token) -> Value {
    match token {
        Token::Address(a) => Value::String(to_checksum(a, None)),
        Token::Uint(u) => Value::String(u.to_string()),
        Token::Int(raw) => Value::String(I256::from_raw(*raw).to_string()),
        Token::Bool(b) => Value::Bool(*b),
        Token::String(s) => Value::String(s.clone()),
        Token::Bytes(b) | Token::FixedBytes(b) => Value::String(format!("0x{}", hex::encode(b))),
        Token::Array(items) | Token::FixedArray(items) | Token::Tuple(items) => {
            Value::Array(items.iter().map(token_to_json).collect())
        }
    }
}

/// Interpret one command-line argument
///
/// JSON literals (`true`, `[..]`, small numbers) are parsed as JSON; long digit
/// strings stay strings to keep their precision; anything else is a bare string.
pub fn parse_cli_arg(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.len() > 15 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Value::String(trimmed.to_string());
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Parse a wei amount: decimal, `0x` hex, or `"<amount> <unit>"`
pub fn parse_amount(raw: &str) -> SubmitterResult<U256> {
    let trimmed = raw.trim();
    let invalid = |detail: String| {
        SubmitterError::Encoding(format!("Invalid amount {:?}: {}", raw, detail))
    };

    if trimmed.starts_with('-') {
        return Err(invalid("amounts cannot be negative".to_string()));
    }

    if let Some(hex_part) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        if hex_part.is_empty() {
            return Err(invalid("no hex digits".to_string()));
        }
        return U256::from_str_radix(hex_part, 16).map_err(|e| invalid(e.to_string()));
    }

    let mut parts = trimmed.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(number), None, None) => {
            U256::from_dec_str(number).map_err(|e| invalid(e.to_string()))
        }
        (Some(number), Some(unit), None) => {
            match parse_units(number, unit.to_lowercase().as_str()) {
                Ok(ParseUnits::U256(amount)) => Ok(amount),
                Ok(ParseUnits::I256(_)) => Err(invalid("amounts cannot be negative".to_string())),
                Err(e) => Err(invalid(e.to_string())),
            }
        }
        _ => Err(invalid("expected <number> [unit]".to_string())),
    }
}

/// Whether `value` lies in the two's-complement range of `int<bits>`
fn fits_signed(value: I256, bits: usize) -> bool {
    if bits >= 256 {
        return true;
    }
    let limit = U256::one() << (bits - 1);
    let magnitude = value.unsigned_abs();
    if value.is_negative() {
        magnitude <= limit
    } else {
        magnitude < limit
    }
}

fn decode_hex(input: &str) -> SubmitterResult<Vec<u8>> {
    let trimmed = input.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(hex_part)
        .map_err(|e| SubmitterError::Encoding(format!("Invalid hex {:?}: {}", input, e)))
}
