//! Marketplace engine and service wiring.
//!
//! The engine owns the event loop: it reacts to purchase completions by
//! persisting a record and monitoring the receipt, and to credits spends
//! by polling the balance until the server converges on the expected
//! remainder. Services are assembled through [`MarketBuilder`], which maps
//! configured backend names to factory functions.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use market_catalog::{CatalogService, FETCH_CANCELLED_MESSAGE};
use market_chain::ChainService;
use market_checkout::CheckoutService;
use market_config::Config;
use market_credits::CreditsService;
use market_features::FeaturesService;
use market_storage::StorageService;
use market_types::{
	Asset, CatalogEvent, ChainId, CheckoutEvent, CreditsEvent, EventBus, MarketEvent, TxHash,
};

const RECEIPT_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);
const BALANCE_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum MarketError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
}

/// Persisted record of a completed purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRecord {
	pub contract_address: Address,
	pub item_id: String,
	pub name: String,
	pub price: U256,
	pub chain_id: ChainId,
	pub tx_hash: TxHash,
	/// Unix millis at which the purchase settled.
	pub completed_at: i64,
}

pub struct MarketEngine {
	config: Config,
	storage: Arc<StorageService>,
	catalog: Arc<CatalogService>,
	credits: Arc<CreditsService>,
	chain: Arc<ChainService>,
	features: Arc<FeaturesService>,
	checkout: Arc<CheckoutService>,
	event_bus: EventBus,
}

impl MarketEngine {
	/// Runs the event loop until shutdown is requested.
	pub async fn run(&self) -> Result<(), MarketError> {
		self.features.start();

		let mut events = self.event_bus.subscribe();

		loop {
			tokio::select! {
				event = events.recv() => match event {
					Ok(MarketEvent::Checkout(CheckoutEvent::Completed { chain_id, tx_hash, asset })) => {
						self.handle_purchase_completed(chain_id, tx_hash, asset).await?;
					}

					Ok(MarketEvent::Checkout(CheckoutEvent::Failed { asset, reason })) => {
						debug!(%asset, %reason, "Purchase failed");
					}

					Ok(MarketEvent::Catalog(CatalogEvent::FetchFailed { query, reason })) => {
						if reason == FETCH_CANCELLED_MESSAGE {
							debug!(scope = %query.scope, "Catalog fetch superseded");
						} else {
							warn!(scope = %query.scope, %reason, "Catalog fetch failed");
						}
					}

					Ok(MarketEvent::Credits(CreditsEvent::RefreshRequested { address, expected_total })) => {
						self.spawn_balance_refresh(address, expected_total);
					}

					Ok(_) => {}

					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						warn!(skipped, "Event receiver lagging");
					}

					Err(broadcast::error::RecvError::Closed) => break,
				},

				_ = tokio::signal::ctrl_c() => {
					info!("Shutting down marketplace orchestrator");
					break;
				}
			}
		}

		Ok(())
	}

	/// Persists the purchase and monitors its receipt in the background.
	async fn handle_purchase_completed(
		&self,
		chain_id: ChainId,
		tx_hash: TxHash,
		asset: Asset,
	) -> Result<(), MarketError> {
		let record = PurchaseRecord {
			contract_address: asset.contract_address,
			item_id: asset.item_id.clone(),
			name: asset.name.clone(),
			price: asset.price,
			chain_id,
			tx_hash,
			completed_at: chrono::Utc::now().timestamp_millis(),
		};

		self.storage
			.store("purchases", &format!("{:?}", tx_hash), &record)
			.await
			.map_err(|e| MarketError::Service(e.to_string()))?;

		let chain = self.chain.clone();
		tokio::spawn(async move {
			match chain.wait_for_receipt(&tx_hash, chain_id).await {
				Ok(receipt) if receipt.success => {
					info!(%tx_hash, block = receipt.block_number, "Purchase transaction confirmed");
				}
				Ok(receipt) => {
					warn!(%tx_hash, block = receipt.block_number, "Purchase transaction reverted");
				}
				Err(e) => {
					warn!(%tx_hash, "Receipt monitoring failed: {}", e);
				}
			}
		});

		Ok(())
	}

	/// Polls the credits balance until the server reports the expected
	/// total or the monitoring window elapses.
	fn spawn_balance_refresh(&self, address: Address, expected_total: U256) {
		let credits = self.credits.clone();
		let timeout =
			std::time::Duration::from_secs(self.config.market.monitoring_timeout_secs);

		tokio::spawn(async move {
			let start = tokio::time::Instant::now();

			loop {
				if start.elapsed() > timeout {
					warn!(%address, "Balance refresh timed out");
					break;
				}

				match credits.balance(address).await {
					Ok(balance) => {
						let total = balance.map(|b| b.total).unwrap_or(U256::ZERO);
						if total == expected_total {
							debug!(%address, %total, "Credits balance settled");
							break;
						}
					}
					Err(e) => {
						debug!(%address, "Balance poll failed: {}", e);
					}
				}

				tokio::time::sleep(BALANCE_POLL_INTERVAL).await;
			}
		});
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	pub fn catalog(&self) -> &Arc<CatalogService> {
		&self.catalog
	}

	pub fn credits(&self) -> &Arc<CreditsService> {
		&self.credits
	}

	pub fn features(&self) -> &Arc<FeaturesService> {
		&self.features
	}

	pub fn checkout(&self) -> &Arc<CheckoutService> {
		&self.checkout
	}
}

// Type aliases for factory functions
type StorageFactory = Box<dyn Fn(&toml::Value) -> Box<dyn market_storage::StorageInterface> + Send>;
type CatalogFactory = Box<dyn Fn(&toml::Value) -> Arc<dyn market_catalog::CatalogInterface> + Send>;
type CreditsFactory = Box<dyn Fn(&toml::Value) -> Box<dyn market_credits::CreditsInterface> + Send>;
type ChainFactory = Box<dyn Fn(&toml::Value) -> Box<dyn market_chain::ChainInterface> + Send>;
type FeaturesFactory =
	Box<dyn Fn(&toml::Value) -> Box<dyn market_features::FeatureFlagInterface> + Send>;
type TradesFactory = Box<dyn Fn(&toml::Value) -> Box<dyn market_checkout::TradeInterface> + Send>;
type PromptFactory =
	Box<dyn Fn(&toml::Value) -> Box<dyn market_checkout::ExplanationPrompt> + Send>;
type GatewayFactory = Box<dyn Fn(&toml::Value) -> Box<dyn market_checkout::CardGateway> + Send>;

/// Factory pattern for creating services from config.
pub struct MarketBuilder {
	config: Config,
	storage_factory: Option<StorageFactory>,
	catalog_factory: Option<CatalogFactory>,
	credits_factory: Option<CreditsFactory>,
	chain_factory: Option<ChainFactory>,
	features_factory: Option<FeaturesFactory>,
	trades_factory: Option<TradesFactory>,
	prompt_factory: Option<PromptFactory>,
	gateway_factory: Option<GatewayFactory>,
}

impl MarketBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			storage_factory: None,
			catalog_factory: None,
			credits_factory: None,
			chain_factory: None,
			features_factory: None,
			trades_factory: None,
			prompt_factory: None,
			gateway_factory: None,
		}
	}

	pub fn with_storage_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Box<dyn market_storage::StorageInterface> + Send + 'static,
	{
		self.storage_factory = Some(Box::new(factory));
		self
	}

	pub fn with_catalog_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Arc<dyn market_catalog::CatalogInterface> + Send + 'static,
	{
		self.catalog_factory = Some(Box::new(factory));
		self
	}

	pub fn with_credits_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Box<dyn market_credits::CreditsInterface> + Send + 'static,
	{
		self.credits_factory = Some(Box::new(factory));
		self
	}

	pub fn with_chain_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Box<dyn market_chain::ChainInterface> + Send + 'static,
	{
		self.chain_factory = Some(Box::new(factory));
		self
	}

	pub fn with_features_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Box<dyn market_features::FeatureFlagInterface> + Send + 'static,
	{
		self.features_factory = Some(Box::new(factory));
		self
	}

	pub fn with_trades_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Box<dyn market_checkout::TradeInterface> + Send + 'static,
	{
		self.trades_factory = Some(Box::new(factory));
		self
	}

	pub fn with_prompt_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Box<dyn market_checkout::ExplanationPrompt> + Send + 'static,
	{
		self.prompt_factory = Some(Box::new(factory));
		self
	}

	pub fn with_gateway_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Box<dyn market_checkout::CardGateway> + Send + 'static,
	{
		self.gateway_factory = Some(Box::new(factory));
		self
	}

	pub fn build(self) -> Result<MarketEngine, MarketError> {
		let event_bus = EventBus::new(1000);

		let storage_backend = self
			.storage_factory
			.ok_or_else(|| MarketError::Config("Storage factory not provided".into()))?(
			&self.config.storage.config,
		);
		let storage = Arc::new(StorageService::new(storage_backend));

		let catalog_backend = self
			.catalog_factory
			.ok_or_else(|| MarketError::Config("Catalog factory not provided".into()))?(
			&self.config.catalog.config,
		);
		let catalog = Arc::new(CatalogService::new(catalog_backend, event_bus.clone()));

		let credits_backend = self
			.credits_factory
			.ok_or_else(|| MarketError::Config("Credits factory not provided".into()))?(
			&self.config.credits.config,
		);
		let credits = Arc::new(CreditsService::new(credits_backend, event_bus.clone()));

		let monitoring_timeout =
			std::time::Duration::from_secs(self.config.market.monitoring_timeout_secs);
		let chain_backend = self
			.chain_factory
			.ok_or_else(|| MarketError::Config("Chain factory not provided".into()))?(
			&self.config.chain.config,
		);
		let chain = Arc::new(ChainService::new(
			chain_backend,
			RECEIPT_POLL_INTERVAL,
			monitoring_timeout,
		));

		let features_backend = self
			.features_factory
			.ok_or_else(|| MarketError::Config("Features factory not provided".into()))?(
			&self.config.features.config,
		);
		let features = Arc::new(FeaturesService::new(
			features_backend,
			std::time::Duration::from_secs(self.config.features.refresh_interval_secs),
		));

		let trades = self
			.trades_factory
			.ok_or_else(|| MarketError::Config("Trades factory not provided".into()))?(
			&self.config.checkout.trades.config,
		);
		let prompt = self
			.prompt_factory
			.ok_or_else(|| MarketError::Config("Prompt factory not provided".into()))?(
			&self.config.checkout.prompt.config,
		);
		let gateway = self
			.gateway_factory
			.ok_or_else(|| MarketError::Config("Gateway factory not provided".into()))?(
			&self.config.checkout.gateway.config,
		);

		let checkout = Arc::new(CheckoutService::new(
			trades,
			prompt,
			gateway,
			chain.clone(),
			credits.clone(),
			catalog.clone(),
			features.clone(),
			storage.clone(),
			event_bus.clone(),
		));

		Ok(MarketEngine {
			config: self.config,
			storage,
			catalog,
			credits,
			chain,
			features,
			checkout,
			event_bus,
		})
	}
}
