//! Waiting for a broadcast transaction to be mined
//!
//! Polls `eth_getTransactionReceipt` until the transaction is included with
//! the required number of confirmations. A transaction that never shows up
//! before the deadline is reported as a timeout; it may have been dropped or
//! replaced and the caller has to check the chain.

use super::request::Receipt;
use crate::chain::Client;
use crate::error::{SubmitterError, SubmitterResult};

use ethers::types::H256;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Confirmation policy for one run
#[derive(Debug, Clone)]
pub struct ConfirmationWatcher {
    /// Blocks including the mined one (1 = mined)
    confirmations: u64,
    poll_interval: Duration,
    deadline: Duration,
}

impl ConfirmationWatcher {
    pub fn new(confirmations: u64, poll_interval: Duration, deadline: Duration) -> Self {
        Self {
            confirmations: confirmations.max(1),
            poll_interval,
            deadline,
        }
    }

    /// Block until `tx_hash` is confirmed, reverted, or the deadline passes
    ///
    /// Reads chain state only, so repeated calls for a mined transaction
    /// return the same receipt.
    pub async fn wait<C: Client + ?Sized>(
        &self,
        client: &C,
        tx_hash: H256,
    ) -> SubmitterResult<Receipt> {
        match timeout(self.deadline, self.poll(client, tx_hash)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Transaction {:?} not confirmed within {:?}",
                    tx_hash, self.deadline
                );
                Err(SubmitterError::Timeout {
                    tx_hash: format!("{:?}", tx_hash),
                    waited_secs: self.deadline.as_secs(),
                })
            }
        }
    }

    async fn poll<C: Client + ?Sized>(&self, client: &C, tx_hash: H256) -> SubmitterResult<Receipt> {
        loop {
            match client.get_receipt(tx_hash).await?.as_ref().and_then(Receipt::from_rpc) {
                Some(receipt) => {
                    if !receipt.success {
                        return Err(SubmitterError::TransactionFailed {
                            tx_hash: format!("{:?}", tx_hash),
                            block_number: receipt.block_number,
                            gas_used: receipt.gas_used.to_string(),
                        });
                    }

                    let confirmations = if self.confirmations > 1 {
                        let current_block = client.get_block_number().await?;
                        current_block.saturating_sub(receipt.block_number) + 1
                    } else {
                        1
                    };

                    if confirmations >= self.confirmations {
                        info!(
                            "Transaction {:?} confirmed in block {} ({} confirmations, gas used {})",
                            tx_hash, receipt.block_number, confirmations, receipt.gas_used
                        );
                        return Ok(receipt);
                    }

                    debug!(
                        "Transaction {:?} has {} / {} confirmations",
                        tx_hash, confirmations, self.confirmations
                    );
                }
                None => debug!("Transaction {:?} not mined yet", tx_hash),
            }

            sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::test_support::mined_receipt;
    use crate::chain::MockClient;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn fast(confirmations: u64) -> ConfirmationWatcher {
        ConfirmationWatcher::new(
            confirmations,
            Duration::from_millis(1),
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn test_waits_until_mined() {
        let hash = H256::repeat_byte(0x42);
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();

        let mut client = MockClient::new();
        client.expect_get_receipt().returning(move |h| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(None)
            } else {
                Ok(Some(mined_receipt(h, 100, true, None)))
            }
        });

        let receipt = assert_ok!(fast(1).wait(&client, hash).await);
        assert!(receipt.success);
        assert_eq!(receipt.block_number, 100);
        assert_eq!(receipt.tx_hash, hash);
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_is_idempotent() {
        let hash = H256::repeat_byte(0x07);
        let mut client = MockClient::new();
        client
            .expect_get_receipt()
            .returning(|h| Ok(Some(mined_receipt(h, 55, true, None))));

        let watcher = fast(1);
        let first = watcher.wait(&client, hash).await.unwrap();
        let second = watcher.wait(&client, hash).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_reverted_receipt() {
        let mut client = MockClient::new();
        client
            .expect_get_receipt()
            .returning(|h| Ok(Some(mined_receipt(h, 9, false, None))));

        let err = fast(1).wait(&client, H256::zero()).await.unwrap_err();
        match err {
            SubmitterError::TransactionFailed { block_number, .. } => assert_eq!(block_number, 9),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_never_mined_times_out() {
        let mut client = MockClient::new();
        client.expect_get_receipt().returning(|_| Ok(None));

        let watcher = ConfirmationWatcher::new(1, Duration::from_millis(5), Duration::from_millis(30));
        let err = assert_err!(watcher.wait(&client, H256::zero()).await);
        assert_eq!(err.kind(), "TimeoutError");
    }

    #[tokio::test]
    async fn test_counts_confirmations() {
        let heads = Arc::new(AtomicUsize::new(100));
        let head = heads.clone();

        let mut client = MockClient::new();
        client
            .expect_get_receipt()
            .returning(|h| Ok(Some(mined_receipt(h, 100, true, None))));
        client
            .expect_get_block_number()
            .returning(move || Ok(head.fetch_add(1, Ordering::SeqCst) as u64));

        let receipt = fast(3).wait(&client, H256::zero()).await.unwrap();
        assert_eq!(receipt.block_number, 100);
        // Heads 100 and 101 are too shallow, 102 gives three confirmations
        assert_eq!(heads.load(Ordering::SeqCst), 103);
    }
}
