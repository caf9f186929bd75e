//! Credits client for the marketplace orchestrator.
//!
//! Credits are an off-chain balance redeemable against purchase price. The
//! credits server owns the balance; this crate only reads it and asks the
//! server to spend, so there is no local state to roll back on failure.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use market_types::{Asset, CreditsBalance, CreditsEvent, EventBus, MarketEvent, Trade, TxHash, Wallet};

pub mod implementations {
	pub mod http;
}

/// Errors that can occur while talking to the credits server.
#[derive(Debug, Error)]
pub enum CreditsError {
	/// The credits server failed; the message is surfaced verbatim.
	#[error("{0}")]
	Network(String),
	/// The credits server refused the spend.
	#[error("Spend rejected: {0}")]
	Rejected(String),
}

/// Backend interface to the credits server.
#[async_trait]
pub trait CreditsInterface: Send + Sync {
	/// Returns the credits available to an address, or `None` when the
	/// address has never been granted any.
	async fn balance(&self, address: Address) -> Result<Option<CreditsBalance>, CreditsError>;

	/// Spends credits against a trade, redeeming it on-chain.
	async fn spend_with_trade(&self, trade: &Trade, wallet: &Wallet)
		-> Result<TxHash, CreditsError>;

	/// Spends credits against a direct collection-store mint.
	async fn spend_on_mint(&self, asset: &Asset, wallet: &Wallet) -> Result<TxHash, CreditsError>;
}

/// Credits service wrapping a backend, with balance-refresh scheduling.
pub struct CreditsService {
	backend: Box<dyn CreditsInterface>,
	event_bus: EventBus,
}

impl CreditsService {
	pub fn new(backend: Box<dyn CreditsInterface>, event_bus: EventBus) -> Self {
		Self { backend, event_bus }
	}

	pub async fn balance(&self, address: Address) -> Result<Option<CreditsBalance>, CreditsError> {
		self.backend.balance(address).await
	}

	pub async fn spend_with_trade(
		&self,
		trade: &Trade,
		wallet: &Wallet,
	) -> Result<TxHash, CreditsError> {
		self.backend.spend_with_trade(trade, wallet).await
	}

	pub async fn spend_on_mint(
		&self,
		asset: &Asset,
		wallet: &Wallet,
	) -> Result<TxHash, CreditsError> {
		self.backend.spend_on_mint(asset, wallet).await
	}

	/// Requests a background refresh of an address's balance after a
	/// spend. `expected_total` is the balance the refresh should
	/// converge to once the server has settled the spend.
	pub fn schedule_refresh(&self, address: Address, expected_total: U256) {
		debug!(%address, %expected_total, "Scheduling credits balance refresh");
		self.event_bus
			.publish(MarketEvent::Credits(CreditsEvent::RefreshRequested {
				address,
				expected_total,
			}))
			.ok();
	}
}
