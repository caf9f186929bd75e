//! Engine assembly and the request-facing service facade.

use anyhow::{bail, Result};
use market_config::Config;
use market_core::{MarketBuilder, MarketEngine};
use market_features::FeatureFlag;
use market_types::{
	BrowseQuery, CatalogPage, GatewayPurchase, PurchaseIntent, PurchaseOutcome, Wallet,
};
use std::sync::Arc;

/// Builds an engine from configuration, selecting backend implementations
/// by their configured names.
pub fn build_engine(config: Config) -> Result<MarketEngine> {
	let mut builder = MarketBuilder::new(config.clone());

	builder = match config.storage.backend.as_str() {
		"file" => {
			builder.with_storage_factory(market_storage::implementations::file::create_storage)
		}
		"memory" => {
			builder.with_storage_factory(market_storage::implementations::memory::create_storage)
		}
		other => bail!("Unknown storage backend: {}", other),
	};

	builder = match config.catalog.backend.as_str() {
		"http" => {
			builder.with_catalog_factory(market_catalog::implementations::http::create_backend)
		}
		other => bail!("Unknown catalog backend: {}", other),
	};

	builder = match config.credits.backend.as_str() {
		"http" => {
			builder.with_credits_factory(market_credits::implementations::http::create_backend)
		}
		other => bail!("Unknown credits backend: {}", other),
	};

	builder = match config.chain.backend.as_str() {
		"relay" => builder.with_chain_factory(market_chain::implementations::relay::create_backend),
		other => bail!("Unknown chain backend: {}", other),
	};

	builder = match config.features.backend.as_str() {
		"http" => {
			builder.with_features_factory(market_features::implementations::http::create_backend)
		}
		other => bail!("Unknown features backend: {}", other),
	};

	builder = match config.checkout.trades.backend.as_str() {
		"http" => {
			builder.with_trades_factory(market_checkout::implementations::trades::create_backend)
		}
		other => bail!("Unknown trades backend: {}", other),
	};

	builder = match config.checkout.prompt.backend.as_str() {
		"static" => {
			builder.with_prompt_factory(market_checkout::implementations::prompt::create_backend)
		}
		other => bail!("Unknown prompt backend: {}", other),
	};

	builder = match config.checkout.gateway.backend.as_str() {
		"http" => {
			builder.with_gateway_factory(market_checkout::implementations::gateway::create_backend)
		}
		other => bail!("Unknown gateway backend: {}", other),
	};

	Ok(builder.build()?)
}

/// Request-facing facade over the engine's services.
#[derive(Clone)]
pub struct MarketService {
	engine: Arc<MarketEngine>,
}

impl MarketService {
	pub fn new(engine: Arc<MarketEngine>) -> Self {
		Self { engine }
	}

	pub async fn browse(
		&self,
		query: BrowseQuery,
	) -> Result<CatalogPage, market_catalog::CatalogError> {
		self.engine.catalog().fetch(query).await
	}

	pub fn cancel_browse(&self, scope: &str) {
		self.engine.catalog().cancel(scope);
	}

	pub async fn purchase(
		&self,
		intent: PurchaseIntent,
		wallet: Option<Wallet>,
	) -> PurchaseOutcome {
		self.engine.checkout().purchase(intent, wallet).await
	}

	pub async fn handle_gateway_purchase(
		&self,
		purchase: GatewayPurchase,
	) -> Result<Option<PurchaseOutcome>, market_checkout::CheckoutError> {
		self.engine.checkout().handle_gateway_purchase(purchase).await
	}

	pub async fn is_feature_enabled(&self, flag: FeatureFlag) -> bool {
		self.engine.features().is_enabled(flag).await
	}

	pub fn flags_loaded(&self) -> bool {
		self.engine.features().has_loaded_initial_flags()
	}
}
