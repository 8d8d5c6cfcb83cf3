//! Lifecycle of a single submitted transaction
//!
//! Constructed -> Signed -> Broadcast -> Pending -> {Confirmed | Reverted | Dropped}

use crate::error::{SubmitterError, SubmitterResult};

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Bytes, H256, U256};
use ethers::utils::keccak256;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxState {
    Constructed,
    Signed,
    Broadcast,
    Pending,
    Confirmed,
    Reverted,
    /// Never mined within the wait deadline (replaced, evicted or expired)
    Dropped,
}

impl TxState {
    pub fn can_transition_to(self, next: TxState) -> bool {
        use TxState::*;
        matches!(
            (self, next),
            (Constructed, Signed)
                | (Signed, Broadcast)
                | (Broadcast, Pending)
                | (Pending, Confirmed)
                | (Pending, Reverted)
                | (Pending, Dropped)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TxState::Confirmed | TxState::Reverted | TxState::Dropped)
    }

    fn transition(self, next: TxState) -> SubmitterResult<TxState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SubmitterError::InvalidStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxState::Constructed => "constructed",
            TxState::Signed => "signed",
            TxState::Broadcast => "broadcast",
            TxState::Pending => "pending",
            TxState::Confirmed => "confirmed",
            TxState::Reverted => "reverted",
            TxState::Dropped => "dropped",
        };
        f.write_str(name)
    }
}

/// A transaction and where it is in its lifecycle
#[derive(Debug, Clone)]
pub struct TrackedTransaction {
    tx: TypedTransaction,
    hash: Option<H256>,
    state: TxState,
}

impl TrackedTransaction {
    pub fn new(tx: TypedTransaction) -> Self {
        Self {
            tx,
            hash: None,
            state: TxState::Constructed,
        }
    }

    pub fn tx(&self) -> &TypedTransaction {
        &self.tx
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn hash(&self) -> Option<H256> {
        self.hash
    }

    pub fn nonce(&self) -> U256 {
        self.tx.nonce().copied().unwrap_or_default()
    }

    /// Record the signed bytes; the hash is keccak256 of the raw transaction
    pub fn mark_signed(&mut self, raw: &Bytes) -> SubmitterResult<H256> {
        self.advance(TxState::Signed)?;
        let hash = H256::from(keccak256(raw));
        self.hash = Some(hash);
        Ok(hash)
    }

    pub fn mark_broadcast(&mut self) -> SubmitterResult<()> {
        self.advance(TxState::Broadcast)
    }

    /// Node accepted the transaction into its pool
    pub fn mark_pending(&mut self, node_hash: H256) -> SubmitterResult<()> {
        self.advance(TxState::Pending)?;
        match self.hash {
            Some(local) if local != node_hash => {
                warn!(
                    "Node reported hash {:?} but the signed bytes hash to {:?}",
                    node_hash, local
                );
                self.hash = Some(node_hash);
            }
            None => self.hash = Some(node_hash),
            _ => {}
        }
        Ok(())
    }

    pub fn settle(&mut self, outcome: TxState) -> SubmitterResult<()> {
        if !outcome.is_terminal() {
            return Err(SubmitterError::InvalidStateTransition {
                from: self.state.to_string(),
                to: outcome.to_string(),
            });
        }
        self.advance(outcome)
    }

    fn advance(&mut self, next: TxState) -> SubmitterResult<()> {
        self.state = self.state.transition(next)?;
        debug!("Transaction {:?} is now {}", self.hash, self.state);
        Ok(())
    }
}
