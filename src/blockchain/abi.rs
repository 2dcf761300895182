// src/blockchain/abi.rs

//! Human-readable signatures to calldata and back.
//!
//! Entrypoints look like `balanceOf(address) returns (uint256)`. Arguments are
//! JSON values coerced against the declared parameter types.

use std::str::FromStr;

use ethers_core::abi::{encode, AbiParser, Function, ParamType, Token};
use ethers_core::types::{Address, Bytes, H256, I256, U256};
use ethers_core::utils::{keccak256, to_checksum};
use serde_json::Value;

use crate::blockchain::ledger::{Call, LedgerError};

pub fn selector(sig: &str) -> [u8; 4] {
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&keccak256(sig.as_bytes())[0..4]);
    sel
}

/// Topic-0 of an event, e.g. `Transfer(address,address,uint256)`.
pub fn event_topic(sig: &str) -> String {
    format!("{:#x}", H256::from(keccak256(sig.as_bytes())))
}

pub fn encode_call(sig: &str, tokens: &[Token]) -> Bytes {
    let mut out = selector(sig).to_vec();
    out.extend(encode(tokens));
    Bytes::from(out)
}

pub fn parse_signature(signature: &str) -> Result<Function, LedgerError> {
    let trimmed = signature.trim();
    let source = if trimmed.starts_with("function ") {
        trimmed.to_string()
    } else {
        format!("function {}", trimmed)
    };
    AbiParser::default()
        .parse_function(&source)
        .map_err(|e| LedgerError::InvalidCall(format!("bad entrypoint '{}': {}", signature, e)))
}

/// Canonical `name(type,...)` form used for the selector.
pub fn function_signature(func: &Function) -> String {
    let types: Vec<String> = func
        .inputs
        .iter()
        .map(|p| param_type_to_string(&p.kind))
        .collect();
    format!("{}({})", func.name, types.join(","))
}

pub fn param_type_to_string(p: &ParamType) -> String {
    match p {
        ParamType::Address => "address".to_string(),
        ParamType::Bytes => "bytes".to_string(),
        ParamType::FixedBytes(n) => format!("bytes{}", n),
        ParamType::Int(n) => format!("int{}", n),
        ParamType::Uint(n) => format!("uint{}", n),
        ParamType::Bool => "bool".to_string(),
        ParamType::String => "string".to_string(),
        ParamType::Array(inner) => format!("{}[]", param_type_to_string(inner)),
        ParamType::FixedArray(inner, n) => format!("{}[{}]", param_type_to_string(inner), n),
        ParamType::Tuple(components) => {
            let inner: Vec<String> = components.iter().map(param_type_to_string).collect();
            format!("({})", inner.join(","))
        }
    }
}

/// Parses bare type names such as `["address", "(string,string)[]"]`.
pub fn parse_types(types: &[String]) -> Result<Vec<ParamType>, LedgerError> {
    let func = parse_signature(&format!("args({})", types.join(",")))?;
    Ok(func.inputs.into_iter().map(|p| p.kind).collect())
}

pub fn coerce_tokens(kinds: &[ParamType], args: &[Value]) -> Result<Vec<Token>, LedgerError> {
    if kinds.len() != args.len() {
        return Err(LedgerError::InvalidCall(format!(
            "arg count mismatch: expected {}, got {}",
            kinds.len(),
            args.len()
        )));
    }
    kinds
        .iter()
        .zip(args)
        .map(|(kind, value)| coerce_token(kind, value))
        .collect()
}

fn invalid(kind: &ParamType, value: &Value) -> LedgerError {
    LedgerError::InvalidCall(format!(
        "cannot use {} as {}",
        value,
        param_type_to_string(kind)
    ))
}

fn parse_uint(value: &Value) -> Option<U256> {
    match value {
        Value::Number(n) => n.as_u64().map(U256::from),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex) => U256::from_str_radix(hex, 16).ok(),
            None => U256::from_dec_str(s).ok(),
        },
        _ => None,
    }
}

fn parse_hex(value: &Value) -> Option<Vec<u8>> {
    let s = value.as_str()?;
    hex::decode(s.strip_prefix("0x").unwrap_or(s)).ok()
}

pub fn coerce_token(kind: &ParamType, value: &Value) -> Result<Token, LedgerError> {
    let token = match kind {
        ParamType::Address => {
            let s = value.as_str().ok_or_else(|| invalid(kind, value))?;
            Token::Address(Address::from_str(s).map_err(|_| invalid(kind, value))?)
        }
        ParamType::Uint(_) => Token::Uint(parse_uint(value).ok_or_else(|| invalid(kind, value))?),
        ParamType::Int(_) => {
            let parsed = match value {
                Value::Number(n) => n.as_i64().map(I256::from),
                Value::String(s) => I256::from_dec_str(s).ok(),
                _ => None,
            };
            Token::Int(parsed.ok_or_else(|| invalid(kind, value))?.into_raw())
        }
        ParamType::Bool => match value {
            Value::Bool(b) => Token::Bool(*b),
            Value::String(s) if s == "true" || s == "false" => Token::Bool(s == "true"),
            _ => return Err(invalid(kind, value)),
        },
        ParamType::String => match value {
            Value::String(s) => Token::String(s.clone()),
            other => Token::String(other.to_string()),
        },
        ParamType::Bytes => Token::Bytes(parse_hex(value).ok_or_else(|| invalid(kind, value))?),
        ParamType::FixedBytes(n) => {
            let bytes = parse_hex(value).ok_or_else(|| invalid(kind, value))?;
            if bytes.len() != *n {
                return Err(invalid(kind, value));
            }
            Token::FixedBytes(bytes)
        }
        ParamType::Array(inner) => {
            let items = value.as_array().ok_or_else(|| invalid(kind, value))?;
            Token::Array(
                items
                    .iter()
                    .map(|item| coerce_token(inner, item))
                    .collect::<Result<_, _>>()?,
            )
        }
        ParamType::FixedArray(inner, n) => {
            let items = value.as_array().ok_or_else(|| invalid(kind, value))?;
            if items.len() != *n {
                return Err(invalid(kind, value));
            }
            Token::FixedArray(
                items
                    .iter()
                    .map(|item| coerce_token(inner, item))
                    .collect::<Result<_, _>>()?,
            )
        }
        ParamType::Tuple(components) => {
            let items = value.as_array().ok_or_else(|| invalid(kind, value))?;
            Token::Tuple(coerce_tokens(components, items)?)
        }
    };
    Ok(token)
}

/// A call resolved against its signature, ready to send.
#[derive(Debug, Clone)]
pub struct EncodedCall {
    pub to: Address,
    pub function: Function,
    pub data: Bytes,
}

pub fn encode_contract_call(call: &Call) -> Result<EncodedCall, LedgerError> {
    let to = Address::from_str(&call.contract_address).map_err(|_| {
        LedgerError::InvalidCall(format!("bad contract address '{}'", call.contract_address))
    })?;
    let function = parse_signature(&call.entrypoint)?;
    let kinds: Vec<ParamType> = function.inputs.iter().map(|p| p.kind.clone()).collect();
    let tokens = coerce_tokens(&kinds, &call.calldata)?;
    let data = encode_call(&function_signature(&function), &tokens);
    Ok(EncodedCall { to, function, data })
}

/// Decoded outputs when the signature declares them, raw 32-byte words
/// otherwise.
pub fn decode_output(func: &Function, data: &[u8]) -> Result<Vec<String>, LedgerError> {
    if func.outputs.is_empty() {
        return Ok(raw_words(data));
    }
    let tokens = func
        .decode_output(data)
        .map_err(|e| LedgerError::Rpc(format!("cannot decode {} output: {}", func.name, e)))?;
    Ok(tokens.iter().map(token_to_string).collect())
}

pub fn raw_words(data: &[u8]) -> Vec<String> {
    data.chunks(32)
        .map(|w| format!("0x{}", hex::encode(w)))
        .collect()
}

pub fn token_to_string(token: &Token) -> String {
    match token {
        Token::Address(a) => to_checksum(a, None),
        Token::Uint(n) => n.to_string(),
        Token::Int(n) => I256::from_raw(*n).to_string(),
        Token::Bool(b) => b.to_string(),
        Token::String(s) => s.clone(),
        Token::Bytes(b) | Token::FixedBytes(b) => format!("0x{}", hex::encode(b)),
        Token::Array(items) | Token::FixedArray(items) | Token::Tuple(items) => {
            let inner: Vec<String> = items.iter().map(token_to_string).collect();
            format!("[{}]", inner.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transfer_selector_matches_erc20() {
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
    }

    #[test]
    fn shorthand_signature_with_returns() {
        let f = parse_signature("balanceOf(address) returns (uint256)").unwrap();
        assert_eq!(function_signature(&f), "balanceOf(address)");
        assert_eq!(f.outputs.len(), 1);
    }

    #[test]
    fn coerces_numbers_hex_and_tuples() {
        let kinds = parse_types(&[
            "uint256".to_string(),
            "uint256".to_string(),
            "(string,string)[]".to_string(),
            "bool".to_string(),
        ])
        .unwrap();
        let tokens = coerce_tokens(
            &kinds,
            &[
                json!("1000"),
                json!("0x10"),
                json!([["agentName", "bot"]]),
                json!(true),
            ],
        )
        .unwrap();
        assert_eq!(tokens[0], Token::Uint(U256::from(1000)));
        assert_eq!(tokens[1], Token::Uint(U256::from(16)));
        assert_eq!(
            tokens[2],
            Token::Array(vec![Token::Tuple(vec![
                Token::String("agentName".into()),
                Token::String("bot".into())
            ])])
        );
    }

    #[test]
    fn wrong_arity_and_types_are_invalid_calls() {
        let kinds = vec![ParamType::Address];
        assert!(matches!(
            coerce_tokens(&kinds, &[]),
            Err(LedgerError::InvalidCall(_))
        ));
        assert!(matches!(
            coerce_tokens(&kinds, &[json!(12)]),
            Err(LedgerError::InvalidCall(_))
        ));
    }

    #[test]
    fn outputs_decode_or_fall_back_to_words() {
        let typed = parse_signature("decimals() returns (uint8)").unwrap();
        let word = encode(&[Token::Uint(U256::from(6))]);
        assert_eq!(decode_output(&typed, &word).unwrap(), vec!["6"]);

        let untyped = parse_signature("decimals()").unwrap();
        let words = decode_output(&untyped, &word).unwrap();
        assert_eq!(words.len(), 1);
        assert!(words[0].ends_with("06"));
        assert_eq!(words[0].len(), 66);
    }

    #[test]
    fn encodes_full_call() {
        let call = Call::new(
            "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
            "transfer(address,uint256)",
        )
        .with_calldata(vec![
            json!("0x000000000000000000000000000000000000dEaD"),
            json!("5"),
        ]);
        let encoded = encode_contract_call(&call).unwrap();
        assert_eq!(&encoded.data[..4], &selector("transfer(address,uint256)"));
        assert_eq!(encoded.data.len(), 4 + 64);
    }
}
