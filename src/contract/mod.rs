//! Contract descriptors, ABI argument conversion and revert decoding
//!
//! A `ContractDescriptor` is an address plus an ABI. Binding it to a client is
//! purely local; no RPC traffic happens until the submitter invokes it.

mod descriptor;
mod revert;
mod tokens;

pub use descriptor::{
    bind, encode_deployment, parse_address, BoundContract, ContractArtifact, ContractDescriptor,
};
pub use revert::decode_revert;
pub use tokens::{parse_amount, parse_cli_arg, token_to_json, tokenize_all};
