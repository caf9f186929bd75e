use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::{Asset, AssetId, BrowseQuery, ChainId, PaymentMode, PurchaseState, TxHash};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MarketEvent {
	Catalog(CatalogEvent),
	Checkout(CheckoutEvent),
	Credits(CreditsEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CatalogEvent {
	FetchCompleted {
		query: BrowseQuery,
		assets: Vec<Asset>,
		total: u64,
		/// Unix millis at which the page was fetched.
		fetched_at: i64,
	},
	FetchFailed {
		query: BrowseQuery,
		reason: String,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CheckoutEvent {
	Started {
		asset: AssetId,
		mode: PaymentMode,
	},
	StateChanged {
		asset: AssetId,
		state: PurchaseState,
	},
	Completed {
		chain_id: ChainId,
		tx_hash: TxHash,
		asset: Asset,
	},
	Failed {
		asset: AssetId,
		reason: String,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CreditsEvent {
	RefreshRequested {
		address: Address,
		/// Balance the refresh should converge to.
		expected_total: U256,
	},
}

pub struct EventBus {
	sender: broadcast::Sender<MarketEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
		self.sender.subscribe()
	}

	pub fn publish(
		&self,
		event: MarketEvent,
	) -> Result<(), broadcast::error::SendError<MarketEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}

impl Clone for EventBus {
	fn clone(&self) -> Self {
		Self {
			sender: self.sender.clone(),
		}
	}
}
