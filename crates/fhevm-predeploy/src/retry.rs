//! Bounded retries for network reads and receipt polling.

use std::{future::Future, time::Duration};

use alloy_primitives::TxHash;
use tracing::{debug, warn};

use crate::{Ledger, LedgerError, PredeployError, Result, TxReceipt};

/// Bounds every network wait of the pipeline.
///
/// Reads are retried with exponential backoff; submissions are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per read, including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_backoff: Duration,
    /// Upper bound for a single delay
    pub max_backoff: Duration,
    /// How long to wait for a receipt before giving up
    pub confirmation_timeout: Duration,
    /// Delay between two receipt polls
    pub poll_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            confirmation_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// The delay after `failures` consecutive failures: `initial_backoff * 2^(failures - 1)`,
    /// capped at `max_backoff`.
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.initial_backoff.saturating_mul(1 << exponent).min(self.max_backoff)
    }

    /// Runs an idempotent read, retrying transport errors.
    ///
    /// The last error is returned as [`PredeployError::Network`] naming `step`.
    pub async fn read<T, F, Fut>(&self, step: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, LedgerError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(step, attempt, ?delay, %err, "Read failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(PredeployError::network(step, err)),
            }
        }
    }

    /// Polls for the receipt of `tx_hash` until it arrives or `confirmation_timeout` elapses.
    pub async fn await_receipt<L: Ledger>(
        &self,
        ledger: &L,
        step: &str,
        tx_hash: TxHash,
    ) -> Result<TxReceipt> {
        tokio::time::timeout(self.confirmation_timeout, self.poll_receipt(ledger, step, tx_hash))
            .await
            .map_err(|_| PredeployError::Timeout {
                step: step.to_string(),
                waited: self.confirmation_timeout,
            })?
    }

    async fn poll_receipt<L: Ledger>(
        &self,
        ledger: &L,
        step: &str,
        tx_hash: TxHash,
    ) -> Result<TxReceipt> {
        loop {
            if let Some(receipt) = self.read(step, || ledger.receipt(tx_hash)).await? {
                return Ok(receipt);
            }
            debug!(step, %tx_hash, "Receipt not available yet");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
