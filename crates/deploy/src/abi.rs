//! Minimal ABI encoding for static constructor and call arguments.
//!
//! Only static word types are supported, which covers every entry point the
//! provisioning sequence touches.

use alloy_core::primitives::{Address, B256, Bytes, U256, keccak256};
use anyhow::Context;

/// A single ABI-encodable argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Uint(U256),
    /// A Solidity enum, encoded as `uint8`.
    Enum(u8),
    Bool(bool),
}

impl AbiValue {
    /// The canonical ABI type name, as used in function signatures.
    pub fn type_name(&self) -> &'static str {
        match self {
            AbiValue::Address(_) => "address",
            AbiValue::Uint(_) => "uint256",
            AbiValue::Enum(_) => "uint8",
            AbiValue::Bool(_) => "bool",
        }
    }

    /// Encode as a single 32-byte word.
    pub fn word(&self) -> B256 {
        match self {
            AbiValue::Address(address) => address.into_word(),
            AbiValue::Uint(value) => B256::from(value.to_be_bytes::<32>()),
            AbiValue::Enum(value) => B256::from(U256::from(*value).to_be_bytes::<32>()),
            AbiValue::Bool(value) => B256::from(U256::from(*value as u8).to_be_bytes::<32>()),
        }
    }
}

impl From<Address> for AbiValue {
    fn from(address: Address) -> Self {
        AbiValue::Address(address)
    }
}

impl From<U256> for AbiValue {
    fn from(value: U256) -> Self {
        AbiValue::Uint(value)
    }
}

impl From<u64> for AbiValue {
    fn from(value: u64) -> Self {
        AbiValue::Uint(U256::from(value))
    }
}

impl From<bool> for AbiValue {
    fn from(value: bool) -> Self {
        AbiValue::Bool(value)
    }
}

/// Build the canonical signature, e.g. `pushVault(address,bool)`.
pub fn signature(method: &str, args: &[AbiValue]) -> String {
    let types: Vec<&str> = args.iter().map(AbiValue::type_name).collect();
    format!("{}({})", method, types.join(","))
}

/// First four bytes of the keccak256 hash of a signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Encode arguments as consecutive head words.
pub fn encode_args(args: &[AbiValue]) -> Vec<u8> {
    let mut out = Vec::with_capacity(args.len() * 32);
    for arg in args {
        out.extend_from_slice(arg.word().as_slice());
    }
    out
}

/// Encode a function call: selector followed by the argument words.
pub fn encode_call(method: &str, args: &[AbiValue]) -> Bytes {
    let mut out = selector(&signature(method, args)).to_vec();
    out.extend(encode_args(args));
    Bytes::from(out)
}

/// Append encoded constructor arguments to creation bytecode.
pub fn encode_creation(bytecode: &Bytes, args: &[AbiValue]) -> Bytes {
    let mut out = bytecode.to_vec();
    out.extend(encode_args(args));
    Bytes::from(out)
}

/// Read the `index`-th return word.
pub fn word_at(data: &[u8], index: usize) -> anyhow::Result<B256> {
    let start = index * 32;
    let end = start + 32;
    let slice = data.get(start..end).with_context(|| {
        format!(
            "Return data too short: need {} bytes, got {}",
            end,
            data.len()
        )
    })?;
    Ok(B256::from_slice(slice))
}

pub fn decode_address(data: &[u8], index: usize) -> anyhow::Result<Address> {
    let word = word_at(data, index)?;
    Ok(Address::from_word(word))
}

pub fn decode_uint(data: &[u8], index: usize) -> anyhow::Result<U256> {
    let word = word_at(data, index)?;
    Ok(U256::from_be_bytes(word.0))
}

pub fn decode_bool(data: &[u8], index: usize) -> anyhow::Result<bool> {
    Ok(!decode_uint(data, index)?.is_zero())
}
