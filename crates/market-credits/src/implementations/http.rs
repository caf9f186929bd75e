//! HTTP credits backend.
//!
//! Talks to the credits server: balance reads are GETs by address, spends
//! are POSTs that return the hash of the transaction the server submitted
//! on the user's behalf.

use crate::{CreditsError, CreditsInterface};
use alloy_primitives::Address;
use async_trait::async_trait;
use market_types::{Asset, CreditsBalance, Trade, TxHash, Wallet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct SpendResponse {
	tx_hash: TxHash,
}

#[derive(Debug, Serialize)]
struct TradeSpendRequest<'a> {
	trade_id: &'a str,
	user_address: Address,
	chain_id: u64,
}

#[derive(Debug, Serialize)]
struct MintSpendRequest<'a> {
	contract_address: Address,
	item_id: &'a str,
	user_address: Address,
	chain_id: u64,
}

pub struct HttpCredits {
	client: reqwest::Client,
	base_url: String,
}

impl HttpCredits {
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			client: reqwest::Client::new(),
			base_url: base_url.into(),
		}
	}

	async fn post_spend<B: Serialize>(
		&self,
		path: &str,
		body: &B,
	) -> Result<TxHash, CreditsError> {
		let url = format!("{}{}", self.base_url, path);

		let response = self
			.client
			.post(&url)
			.json(body)
			.send()
			.await
			.map_err(|e| CreditsError::Network(e.to_string()))?;

		if response.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
			let reason = response
				.text()
				.await
				.unwrap_or_else(|_| "unknown".to_string());
			return Err(CreditsError::Rejected(reason));
		}

		let response = response
			.error_for_status()
			.map_err(|e| CreditsError::Network(e.to_string()))?;

		let body: SpendResponse = response
			.json()
			.await
			.map_err(|e| CreditsError::Network(e.to_string()))?;

		Ok(body.tx_hash)
	}
}

#[async_trait]
impl CreditsInterface for HttpCredits {
	async fn balance(&self, address: Address) -> Result<Option<CreditsBalance>, CreditsError> {
		let url = format!("{}/v1/credits/{}", self.base_url, address);

		let response = self
			.client
			.get(&url)
			.send()
			.await
			.map_err(|e| CreditsError::Network(e.to_string()))?;

		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Ok(None);
		}

		let response = response
			.error_for_status()
			.map_err(|e| CreditsError::Network(e.to_string()))?;

		let balance: CreditsBalance = response
			.json()
			.await
			.map_err(|e| CreditsError::Network(e.to_string()))?;

		Ok(Some(balance))
	}

	async fn spend_with_trade(
		&self,
		trade: &Trade,
		wallet: &Wallet,
	) -> Result<TxHash, CreditsError> {
		self.post_spend(
			"/v1/credits/spend/trade",
			&TradeSpendRequest {
				trade_id: &trade.id,
				user_address: wallet.address,
				chain_id: wallet.chain_id,
			},
		)
		.await
	}

	async fn spend_on_mint(&self, asset: &Asset, wallet: &Wallet) -> Result<TxHash, CreditsError> {
		self.post_spend(
			"/v1/credits/spend/mint",
			&MintSpendRequest {
				contract_address: asset.contract_address,
				item_id: &asset.item_id,
				user_address: wallet.address,
				chain_id: wallet.chain_id,
			},
		)
		.await
	}
}

/// Creates an HTTP credits backend from configuration.
///
/// Configuration parameters:
/// - `base_url`: credits server root (required)
pub fn create_backend(config: &toml::Value) -> Box<dyn CreditsInterface> {
	let base_url = config
		.get("base_url")
		.and_then(|v| v.as_str())
		.unwrap_or("https://credits.example.com")
		.to_string();

	Box::new(HttpCredits::new(base_url))
}
