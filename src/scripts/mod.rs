//! One-shot contract workflows run by the CLI
//!
//! Each workflow takes a connected client, a configured submitter and a plan
//! assembled from the settings file plus command-line overrides:
//! - `deploy`: deploy a token artifact and read back its metadata
//! - `batch_mint`: mint a whole URI batch in one transaction
//! - `call`: read-only static calls, arbitrary writes, and waiting on a hash

mod batch_mint;
mod call;
mod deploy;

pub use batch_mint::{run_batch_mint, BatchMintPlan};
pub use call::{run_call, run_wait, CallPlan};
pub use deploy::{run_deploy, DeployPlan};

use crate::chain::Client;
use crate::contract::{bind, BoundContract, ContractDescriptor};
use crate::error::SubmitterResult;

use std::path::Path;
use std::sync::Arc;

/// Bind a contract whose ABI lives in a file
pub(crate) fn bind_from_file<C: Client>(
    client: Arc<C>,
    address: &str,
    abi_path: &Path,
) -> SubmitterResult<BoundContract<C>> {
    bind(client, ContractDescriptor::from_abi_file(address, abi_path)?)
}
