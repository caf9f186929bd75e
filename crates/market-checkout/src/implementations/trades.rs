//! HTTP trade server backend.
//!
//! Fetches signed trades by id and asks the server to redeem them through
//! the meta-transaction relay, returning the resulting transaction hash.

use crate::{CheckoutError, TradeInterface};
use alloy_primitives::Address;
use async_trait::async_trait;
use market_types::{Trade, TxHash, Wallet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct AcceptRequest {
	user_address: Address,
	chain_id: u64,
}

#[derive(Debug, Deserialize)]
struct AcceptResponse {
	tx_hash: TxHash,
}

pub struct HttpTrades {
	client: reqwest::Client,
	base_url: String,
}

impl HttpTrades {
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			client: reqwest::Client::new(),
			base_url: base_url.into(),
		}
	}
}

#[async_trait]
impl TradeInterface for HttpTrades {
	async fn fetch_trade(&self, trade_id: &str) -> Result<Trade, CheckoutError> {
		let url = format!("{}/v1/trades/{}", self.base_url, trade_id);

		let response = self
			.client
			.get(&url)
			.send()
			.await
			.map_err(|e| CheckoutError::Network(e.to_string()))?;

		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Err(CheckoutError::Validation(format!(
				"Trade {} not found",
				trade_id
			)));
		}

		let response = response
			.error_for_status()
			.map_err(|e| CheckoutError::Network(e.to_string()))?;

		let trade: Trade = response
			.json()
			.await
			.map_err(|e| CheckoutError::Network(e.to_string()))?;

		Ok(trade)
	}

	async fn accept(&self, trade: &Trade, wallet: &Wallet) -> Result<TxHash, CheckoutError> {
		let url = format!("{}/v1/trades/{}/accept", self.base_url, trade.id);

		let response = self
			.client
			.post(&url)
			.json(&AcceptRequest {
				user_address: wallet.address,
				chain_id: wallet.chain_id,
			})
			.send()
			.await
			.map_err(|e| CheckoutError::Network(e.to_string()))?;

		if response.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
			let reason = response
				.text()
				.await
				.unwrap_or_else(|_| "unknown".to_string());
			return Err(CheckoutError::Network(reason));
		}

		let response = response
			.error_for_status()
			.map_err(|e| CheckoutError::Network(e.to_string()))?;

		let body: AcceptResponse = response
			.json()
			.await
			.map_err(|e| CheckoutError::Network(e.to_string()))?;

		Ok(body.tx_hash)
	}
}

/// Creates an HTTP trade backend from configuration.
///
/// Configuration parameters:
/// - `base_url`: trade server root (required)
pub fn create_backend(config: &toml::Value) -> Box<dyn TradeInterface> {
	let base_url = config
		.get("base_url")
		.and_then(|v| v.as_str())
		.unwrap_or("https://trades.example.com")
		.to_string();

	Box::new(HttpTrades::new(base_url))
}
