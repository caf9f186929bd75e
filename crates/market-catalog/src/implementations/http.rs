//! HTTP catalog backend.
//!
//! Talks to the remote catalog/search API. Searches are plain GET requests
//! with the filters encoded as query parameters; single assets are fetched
//! by contract address and item id.

use crate::{CatalogError, CatalogInterface};
use async_trait::async_trait;
use market_types::{Asset, AssetId, BrowseQuery, CatalogPage};
use serde::Deserialize;

const DEFAULT_PAGE_SIZE: u32 = 24;

#[derive(Debug, Deserialize)]
struct SearchResponse {
	data: Vec<Asset>,
	total: u64,
}

pub struct HttpCatalog {
	client: reqwest::Client,
	base_url: String,
	page_size: u32,
}

impl HttpCatalog {
	pub fn new(base_url: impl Into<String>, page_size: u32) -> Self {
		Self {
			client: reqwest::Client::new(),
			base_url: base_url.into(),
			page_size,
		}
	}

	fn search_params(&self, query: &BrowseQuery) -> Vec<(String, String)> {
		let mut params = vec![
			("first".to_string(), self.page_size.to_string()),
			(
				"skip".to_string(),
				(query.page * self.page_size).to_string(),
			),
		];

		let filters = &query.filters;
		if let Some(category) = &filters.category {
			params.push((
				"category".to_string(),
				serde_json::to_string(category)
					.unwrap_or_default()
					.trim_matches('"')
					.to_string(),
			));
		}
		if let Some(search) = &filters.search {
			params.push(("search".to_string(), search.clone()));
		}
		if let Some(is_on_sale) = filters.is_on_sale {
			params.push(("isOnSale".to_string(), is_on_sale.to_string()));
		}
		for rarity in &filters.rarities {
			params.push((
				"rarity".to_string(),
				serde_json::to_string(rarity)
					.unwrap_or_default()
					.trim_matches('"')
					.to_string(),
			));
		}
		for address in &filters.contract_addresses {
			params.push(("contractAddress".to_string(), address.to_string()));
		}

		params
	}
}

#[async_trait]
impl CatalogInterface for HttpCatalog {
	async fn search(&self, query: &BrowseQuery) -> Result<CatalogPage, CatalogError> {
		let url = format!("{}/v1/catalog", self.base_url);

		let response = self
			.client
			.get(&url)
			.query(&self.search_params(query))
			.send()
			.await
			.map_err(|e| CatalogError::Network(e.to_string()))?
			.error_for_status()
			.map_err(|e| CatalogError::Network(e.to_string()))?;

		let body: SearchResponse = response
			.json()
			.await
			.map_err(|e| CatalogError::Network(e.to_string()))?;

		Ok(CatalogPage {
			assets: body.data,
			total: body.total,
		})
	}

	async fn get_one(&self, id: &AssetId) -> Result<Asset, CatalogError> {
		let url = format!(
			"{}/v1/items/{}/{}",
			self.base_url, id.contract_address, id.item_id
		);

		let response = self
			.client
			.get(&url)
			.send()
			.await
			.map_err(|e| CatalogError::Network(e.to_string()))?;

		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Err(CatalogError::NotFound);
		}

		let response = response
			.error_for_status()
			.map_err(|e| CatalogError::Network(e.to_string()))?;

		response
			.json()
			.await
			.map_err(|e| CatalogError::Network(e.to_string()))
	}
}

/// Creates an HTTP catalog backend from configuration.
///
/// Configuration parameters:
/// - `base_url`: catalog API root (required)
/// - `page_size`: results per page (default: 24)
pub fn create_backend(config: &toml::Value) -> std::sync::Arc<dyn CatalogInterface> {
	let base_url = config
		.get("base_url")
		.and_then(|v| v.as_str())
		.unwrap_or("https://marketplace-api.example.com")
		.to_string();
	let page_size = config
		.get("page_size")
		.and_then(|v| v.as_integer())
		.map(|v| v as u32)
		.unwrap_or(DEFAULT_PAGE_SIZE);

	std::sync::Arc::new(HttpCatalog::new(base_url, page_size))
}
