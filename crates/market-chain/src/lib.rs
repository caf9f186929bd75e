//! Transaction submission for the marketplace orchestrator.
//!
//! Submission goes through a backend implementing [`ChainInterface`];
//! signing and transaction construction belong to the backend (a
//! meta-transaction relay in production), never to this crate. The service
//! adds receipt polling with a bounded timeout on top.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use market_types::{ChainId, Transaction, TransactionReceipt, TxHash};

pub mod implementations {
	pub mod relay;
}

/// Errors that can occur during transaction submission or monitoring.
#[derive(Debug, Error)]
pub enum ChainError {
	/// The submission backend failed; the message is surfaced verbatim.
	#[error("{0}")]
	Network(String),
	/// The node or relay refused the transaction.
	#[error("Transaction rejected: {0}")]
	Rejected(String),
	/// No receipt appeared within the monitoring window.
	#[error("Timed out waiting for transaction receipt")]
	Timeout,
}

/// Backend interface for transaction submission.
#[async_trait]
pub trait ChainInterface: Send + Sync {
	/// Submits a transaction and returns its hash.
	async fn submit(&self, tx: &Transaction) -> Result<TxHash, ChainError>;

	/// Fetches the receipt for a transaction, or `None` while it is
	/// still pending.
	async fn receipt(
		&self,
		hash: &TxHash,
		chain_id: ChainId,
	) -> Result<Option<TransactionReceipt>, ChainError>;
}

/// Transaction service wrapping a submission backend.
pub struct ChainService {
	backend: Box<dyn ChainInterface>,
	poll_interval: Duration,
	monitoring_timeout: Duration,
}

impl ChainService {
	pub fn new(
		backend: Box<dyn ChainInterface>,
		poll_interval: Duration,
		monitoring_timeout: Duration,
	) -> Self {
		Self {
			backend,
			poll_interval,
			monitoring_timeout,
		}
	}

	pub async fn submit(&self, tx: &Transaction) -> Result<TxHash, ChainError> {
		self.backend.submit(tx).await
	}

	/// Polls for a receipt until it appears or the monitoring window
	/// elapses. Transient lookup errors are logged and retried.
	pub async fn wait_for_receipt(
		&self,
		hash: &TxHash,
		chain_id: ChainId,
	) -> Result<TransactionReceipt, ChainError> {
		let start = tokio::time::Instant::now();

		loop {
			if start.elapsed() > self.monitoring_timeout {
				warn!(%hash, "Receipt monitoring timed out");
				return Err(ChainError::Timeout);
			}

			match self.backend.receipt(hash, chain_id).await {
				Ok(Some(receipt)) => return Ok(receipt),
				Ok(None) => {
					debug!(%hash, "Transaction not yet confirmed");
				}
				Err(e) => {
					debug!(%hash, "Receipt lookup failed: {}", e);
				}
			}

			tokio::time::sleep(self.poll_interval).await;
		}
	}
}
