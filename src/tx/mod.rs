//! Transaction module: requests, gas resolution, lifecycle tracking and submission

mod confirmation;
mod gas;
mod request;
mod state;
mod submitter;

pub use request::{CallRequest, CallResult, DeployResult, Overrides, Receipt};
pub use state::TxState;
pub use submitter::TransactionSubmitter;
