//! HTTP card gateway backend.
//!
//! Opens a payment widget session on the on-ramp provider. Settlement
//! arrives asynchronously through gateway purchase notifications, not
//! through this call.

use crate::{CardGateway, CheckoutError};
use alloy_primitives::Address;
use async_trait::async_trait;
use market_types::Asset;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Serialize)]
struct SessionRequest<'a> {
	contract_address: Address,
	item_id: &'a str,
	chain_id: u64,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
	widget_url: String,
}

pub struct HttpGateway {
	client: reqwest::Client,
	base_url: String,
}

impl HttpGateway {
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			client: reqwest::Client::new(),
			base_url: base_url.into(),
		}
	}
}

#[async_trait]
impl CardGateway for HttpGateway {
	async fn open_widget(&self, asset: &Asset) -> Result<(), CheckoutError> {
		let url = format!("{}/v1/widget/sessions", self.base_url);

		let response = self
			.client
			.post(&url)
			.json(&SessionRequest {
				contract_address: asset.contract_address,
				item_id: &asset.item_id,
				chain_id: asset.chain_id,
			})
			.send()
			.await
			.map_err(|e| CheckoutError::Network(e.to_string()))?
			.error_for_status()
			.map_err(|e| CheckoutError::Network(e.to_string()))?;

		let session: SessionResponse = response
			.json()
			.await
			.map_err(|e| CheckoutError::Network(e.to_string()))?;

		info!(widget_url = %session.widget_url, "Opened card payment widget");
		Ok(())
	}
}

/// Creates an HTTP card gateway backend from configuration.
///
/// Configuration parameters:
/// - `base_url`: on-ramp provider root (required)
pub fn create_backend(config: &toml::Value) -> Box<dyn CardGateway> {
	let base_url = config
		.get("base_url")
		.and_then(|v| v.as_str())
		.unwrap_or("https://gateway.example.com")
		.to_string();

	Box::new(HttpGateway::new(base_url))
}
