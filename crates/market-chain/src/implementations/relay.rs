//! Meta-transaction relay backend.
//!
//! Submits transactions through a relay server that signs and broadcasts
//! on the user's behalf, then reads receipts straight from a JSON-RPC node
//! per chain.

use crate::{ChainError, ChainInterface};
use async_trait::async_trait;
use market_types::{ChainId, Transaction, TransactionReceipt, TxHash};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
struct RelayResponse {
	tx_hash: TxHash,
}

#[derive(Debug, Deserialize)]
struct RpcReceipt {
	#[serde(rename = "blockNumber")]
	block_number: String,
	status: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
	result: Option<RpcReceipt>,
}

pub struct RelayChain {
	client: reqwest::Client,
	relay_url: String,
	rpc_urls: HashMap<ChainId, String>,
}

impl RelayChain {
	pub fn new(relay_url: impl Into<String>, rpc_urls: HashMap<ChainId, String>) -> Self {
		Self {
			client: reqwest::Client::new(),
			relay_url: relay_url.into(),
			rpc_urls,
		}
	}

	fn rpc_url(&self, chain_id: ChainId) -> Result<&str, ChainError> {
		self.rpc_urls
			.get(&chain_id)
			.map(String::as_str)
			.ok_or_else(|| ChainError::Network(format!("No RPC url for chain {}", chain_id)))
	}

	fn parse_quantity(value: &str) -> Result<u64, ChainError> {
		u64::from_str_radix(value.trim_start_matches("0x"), 16)
			.map_err(|e| ChainError::Network(format!("Malformed RPC quantity: {}", e)))
	}
}

#[async_trait]
impl ChainInterface for RelayChain {
	async fn submit(&self, tx: &Transaction) -> Result<TxHash, ChainError> {
		let url = format!("{}/v1/transactions", self.relay_url);

		let response = self
			.client
			.post(&url)
			.json(tx)
			.send()
			.await
			.map_err(|e| ChainError::Network(e.to_string()))?;

		if response.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
			let reason = response
				.text()
				.await
				.unwrap_or_else(|_| "unknown".to_string());
			return Err(ChainError::Rejected(reason));
		}

		let response = response
			.error_for_status()
			.map_err(|e| ChainError::Network(e.to_string()))?;

		let body: RelayResponse = response
			.json()
			.await
			.map_err(|e| ChainError::Network(e.to_string()))?;

		Ok(body.tx_hash)
	}

	async fn receipt(
		&self,
		hash: &TxHash,
		chain_id: ChainId,
	) -> Result<Option<TransactionReceipt>, ChainError> {
		let rpc_url = self.rpc_url(chain_id)?;

		let request = json!({
			"jsonrpc": "2.0",
			"id": 1,
			"method": "eth_getTransactionReceipt",
			"params": [format!("{:?}", hash)],
		});

		let response = self
			.client
			.post(rpc_url)
			.json(&request)
			.send()
			.await
			.map_err(|e| ChainError::Network(e.to_string()))?
			.error_for_status()
			.map_err(|e| ChainError::Network(e.to_string()))?;

		let body: RpcResponse = response
			.json()
			.await
			.map_err(|e| ChainError::Network(e.to_string()))?;

		match body.result {
			None => Ok(None),
			Some(receipt) => Ok(Some(TransactionReceipt {
				hash: *hash,
				block_number: Self::parse_quantity(&receipt.block_number)?,
				success: Self::parse_quantity(&receipt.status)? == 1,
			})),
		}
	}
}

/// Creates a relay submission backend from configuration.
///
/// Configuration parameters:
/// - `relay_url`: meta-transaction relay root (required)
/// - `rpc_urls`: table of chain id -> JSON-RPC url
pub fn create_backend(config: &toml::Value) -> Box<dyn ChainInterface> {
	let relay_url = config
		.get("relay_url")
		.and_then(|v| v.as_str())
		.unwrap_or("https://transactions.example.com")
		.to_string();

	let mut rpc_urls = HashMap::new();
	if let Some(table) = config.get("rpc_urls").and_then(|v| v.as_table()) {
		for (chain_id, url) in table {
			if let (Ok(chain_id), Some(url)) = (chain_id.parse::<ChainId>(), url.as_str()) {
				rpc_urls.insert(chain_id, url.to_string());
			}
		}
	}

	Box::new(RelayChain::new(relay_url, rpc_urls))
}
