//! Purchase orchestration for the marketplace.
//!
//! A [`PurchaseIntent`] names one asset and one payment mode; the service
//! resolves every intent to exactly one [`PurchaseOutcome`], publishing
//! lifecycle events on the bus as the purchase advances.
//!
//! Three payment paths exist:
//! - on-chain: accept the authorizing trade, or mint through the
//!   collection store when no trade exists
//! - credits: spend the off-chain balance through the credits server,
//!   then schedule a balance refresh toward the expected remainder
//! - card: open the external payment widget and suspend until the
//!   gateway reports the purchase settled
//!
//! The card path shows a one-time explanation before the first widget
//! open; the acknowledgement is persisted only when the user proceeds.

use alloy_primitives::U256;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use market_catalog::{CatalogError, CatalogService};
use market_chain::{ChainError, ChainService};
use market_credits::{CreditsError, CreditsService};
use market_features::{FeatureFlag, FeaturesService};
use market_storage::{StorageError, StorageService};
use market_types::{
	Asset, AssetId, CheckoutEvent, EventBus, GatewayPurchase, GatewayPurchaseStatus, MarketEvent,
	PaymentMode, PurchaseIntent, PurchaseOutcome, PurchaseState, Trade, TxHash, Wallet,
};

pub mod implementations {
	pub mod gateway;
	pub mod prompt;
	pub mod trades;
}

pub mod transactions;

/// Storage namespace for user-facing checkout preferences.
pub const PREFS_NAMESPACE: &str = "preferences";

/// Storage key recording that the card explanation has been acknowledged.
pub const CARD_EXPLANATION_KEY: &str = "card-explanation-shown";

/// Errors that can occur while orchestrating a purchase.
#[derive(Debug, Error)]
pub enum CheckoutError {
	/// No wallet was connected when a paid purchase was attempted.
	#[error("A defined wallet is required to buy an item")]
	MissingWallet,
	/// A credits purchase was attempted with an empty or absent balance.
	#[error("No credits available")]
	NoCredits,
	/// The purchase was abandoned before settling.
	#[error("Purchase cancelled")]
	Cancelled,
	/// The intent or asset cannot be turned into a transaction.
	#[error("{0}")]
	Validation(String),
	/// A downstream service failed; the message is surfaced verbatim.
	#[error("{0}")]
	Network(String),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

impl From<CreditsError> for CheckoutError {
	fn from(e: CreditsError) -> Self {
		CheckoutError::Network(e.to_string())
	}
}

impl From<ChainError> for CheckoutError {
	fn from(e: ChainError) -> Self {
		CheckoutError::Network(e.to_string())
	}
}

impl From<CatalogError> for CheckoutError {
	fn from(e: CatalogError) -> Self {
		CheckoutError::Network(e.to_string())
	}
}

/// Backend interface to the trade server.
#[async_trait]
pub trait TradeInterface: Send + Sync {
	/// Fetches a signed trade by id.
	async fn fetch_trade(&self, trade_id: &str) -> Result<Trade, CheckoutError>;

	/// Redeems a trade on-chain on behalf of the wallet.
	async fn accept(&self, trade: &Trade, wallet: &Wallet) -> Result<TxHash, CheckoutError>;
}

/// How the user answered the card explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptResponse {
	Proceed,
	Dismissed,
}

/// Presents the one-time card explanation and reports the user's choice.
#[async_trait]
pub trait ExplanationPrompt: Send + Sync {
	async fn present(&self, asset: &Asset) -> Result<PromptResponse, CheckoutError>;
}

/// Opens the external card payment widget for an asset.
#[async_trait]
pub trait CardGateway: Send + Sync {
	async fn open_widget(&self, asset: &Asset) -> Result<(), CheckoutError>;
}

/// Purchase orchestrator.
///
/// Card purchases in flight are tracked per asset; the gateway
/// notification handler resolves the matching waiter when the purchase
/// settles.
pub struct CheckoutService {
	trades: Box<dyn TradeInterface>,
	prompt: Box<dyn ExplanationPrompt>,
	gateway: Box<dyn CardGateway>,
	chain: Arc<ChainService>,
	credits: Arc<CreditsService>,
	catalog: Arc<CatalogService>,
	features: Arc<FeaturesService>,
	storage: Arc<StorageService>,
	event_bus: EventBus,
	pending_card: DashMap<AssetId, oneshot::Sender<PurchaseOutcome>>,
}

impl CheckoutService {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		trades: Box<dyn TradeInterface>,
		prompt: Box<dyn ExplanationPrompt>,
		gateway: Box<dyn CardGateway>,
		chain: Arc<ChainService>,
		credits: Arc<CreditsService>,
		catalog: Arc<CatalogService>,
		features: Arc<FeaturesService>,
		storage: Arc<StorageService>,
		event_bus: EventBus,
	) -> Self {
		Self {
			trades,
			prompt,
			gateway,
			chain,
			credits,
			catalog,
			features,
			storage,
			event_bus,
			pending_card: DashMap::new(),
		}
	}

	/// Resolves a purchase intent to its outcome.
	///
	/// Never returns an error: failures become a
	/// [`PurchaseOutcome::Failed`] carrying the reason, so callers always
	/// observe exactly one terminal outcome per intent.
	pub async fn purchase(
		&self,
		intent: PurchaseIntent,
		wallet: Option<Wallet>,
	) -> PurchaseOutcome {
		let asset_id = AssetId::from(&intent.asset);
		info!(asset = %asset_id, mode = ?intent.mode, "Starting purchase");
		self.publish(CheckoutEvent::Started {
			asset: asset_id.clone(),
			mode: intent.mode,
		});

		let result = match intent.mode {
			PaymentMode::Card => self.card_flow(&intent.asset).await,
			PaymentMode::Credits => self.direct_flow(&intent, wallet, true).await,
			PaymentMode::Chain => self.direct_flow(&intent, wallet, false).await,
		};

		let outcome = match result {
			Ok(outcome) => outcome,
			Err(e) => PurchaseOutcome::Failed {
				asset: asset_id.clone(),
				reason: e.to_string(),
			},
		};

		match &outcome {
			PurchaseOutcome::Completed {
				chain_id,
				tx_hash,
				asset,
			} => {
				info!(asset = %asset_id, tx_hash = %tx_hash, "Purchase completed");
				self.publish_state(&asset_id, PurchaseState::Confirmed);
				self.publish(CheckoutEvent::Completed {
					chain_id: *chain_id,
					tx_hash: *tx_hash,
					asset: asset.clone(),
				});
			}
			PurchaseOutcome::Failed { reason, .. } => {
				warn!(asset = %asset_id, reason = %reason, "Purchase failed");
				self.publish_state(&asset_id, PurchaseState::Failed);
				self.publish(CheckoutEvent::Failed {
					asset: asset_id.clone(),
					reason: reason.clone(),
				});
			}
		}

		outcome
	}

	/// On-chain and credits paths. Credits fall back to the on-chain path
	/// when the credits feature is disabled.
	async fn direct_flow(
		&self,
		intent: &PurchaseIntent,
		wallet: Option<Wallet>,
		want_credits: bool,
	) -> Result<PurchaseOutcome, CheckoutError> {
		let wallet = wallet.ok_or(CheckoutError::MissingWallet)?;
		let asset = &intent.asset;
		let asset_id = AssetId::from(asset);

		let use_credits =
			want_credits && self.features.is_enabled_once_loaded(FeatureFlag::Credits).await;
		if want_credits && !use_credits {
			debug!(asset = %asset_id, "Credits disabled, falling back to an on-chain purchase");
		}

		let tx_hash = if use_credits {
			self.publish_state(&asset_id, PurchaseState::AwaitingFunds);

			let total = self
				.credits
				.balance(wallet.address)
				.await?
				.map(|balance| balance.total)
				.unwrap_or(U256::ZERO);
			if total.is_zero() {
				return Err(CheckoutError::NoCredits);
			}

			self.publish_state(&asset_id, PurchaseState::AwaitingSignature);
			let hash = match &asset.trade_id {
				Some(trade_id) => {
					let trade = self.trades.fetch_trade(trade_id).await?;
					self.credits.spend_with_trade(&trade, &wallet).await?
				}
				None => self.credits.spend_on_mint(asset, &wallet).await?,
			};

			self.credits
				.schedule_refresh(wallet.address, total.saturating_sub(asset.price));
			hash
		} else {
			self.publish_state(&asset_id, PurchaseState::AwaitingSignature);
			match &asset.trade_id {
				Some(trade_id) => {
					let trade = self.trades.fetch_trade(trade_id).await?;
					self.trades.accept(&trade, &wallet).await?
				}
				None => {
					let tx = transactions::mint_transaction(asset)?;
					self.chain.submit(&tx).await?
				}
			}
		};

		Ok(PurchaseOutcome::Completed {
			chain_id: asset.chain_id,
			tx_hash,
			asset: asset.clone(),
		})
	}

	/// Card path: explanation gate, widget open, then suspension until the
	/// gateway reports the purchase settled.
	async fn card_flow(&self, asset: &Asset) -> Result<PurchaseOutcome, CheckoutError> {
		let asset_id = AssetId::from(asset);

		let acknowledged = self
			.storage
			.retrieve_optional::<bool>(PREFS_NAMESPACE, CARD_EXPLANATION_KEY)
			.await?
			.unwrap_or(false);

		if !acknowledged {
			match self.prompt.present(asset).await? {
				PromptResponse::Dismissed => {
					debug!(asset = %asset_id, "Card explanation dismissed");
					return Err(CheckoutError::Cancelled);
				}
				PromptResponse::Proceed => {
					self.storage
						.store(PREFS_NAMESPACE, CARD_EXPLANATION_KEY, &true)
						.await?;
				}
			}
		}

		// Register the waiter before opening the widget so a fast gateway
		// notification cannot slip past it.
		let (outcome_tx, outcome_rx) = oneshot::channel();
		self.pending_card.insert(asset_id.clone(), outcome_tx);

		if let Err(e) = self.gateway.open_widget(asset).await {
			self.pending_card.remove(&asset_id);
			return Err(e);
		}

		self.publish_state(&asset_id, PurchaseState::AwaitingFunds);

		match outcome_rx.await {
			Ok(outcome) => Ok(outcome),
			Err(_) => Err(CheckoutError::Cancelled),
		}
	}

	/// Processes a purchase notification from the card gateway.
	///
	/// Only notifications that settle a primary-market NFT purchase
	/// produce an outcome; pending updates, plain token purchases, and
	/// secondary-market settlements are ignored. Returns the outcome when
	/// the notification resolved one.
	pub async fn handle_gateway_purchase(
		&self,
		purchase: GatewayPurchase,
	) -> Result<Option<PurchaseOutcome>, CheckoutError> {
		match purchase.status {
			GatewayPurchaseStatus::Pending => return Ok(None),
			GatewayPurchaseStatus::Failed | GatewayPurchaseStatus::Cancelled => {
				return Ok(self.resolve_aborted_card(&purchase));
			}
			GatewayPurchaseStatus::Complete => {}
		}

		if !purchase.is_complete_primary() {
			debug!(id = %purchase.id, "Ignoring non-primary gateway purchase");
			return Ok(None);
		}

		// Guarded by is_complete_primary above.
		let (asset_ref, tx_hash) = match (&purchase.asset, purchase.tx_hash) {
			(Some(asset_ref), Some(tx_hash)) => (asset_ref, tx_hash),
			_ => return Ok(None),
		};
		let item_id = match &asset_ref.item_id {
			Some(item_id) => item_id.clone(),
			None => return Ok(None),
		};
		let asset_id = AssetId::new(asset_ref.contract_address, item_id);

		let outcome = match self.catalog.fetch_one(&asset_id).await {
			Ok(asset) => PurchaseOutcome::Completed {
				chain_id: asset.chain_id,
				tx_hash,
				asset,
			},
			Err(e) => PurchaseOutcome::Failed {
				asset: asset_id.clone(),
				reason: e.to_string(),
			},
		};

		match self.pending_card.remove(&asset_id) {
			Some((_, waiter)) => {
				// The suspended purchase publishes the terminal events.
				let _ = waiter.send(outcome.clone());
			}
			None => match &outcome {
				PurchaseOutcome::Completed {
					chain_id,
					tx_hash,
					asset,
				} => {
					info!(asset = %asset_id, tx_hash = %tx_hash, "Card purchase settled");
					self.publish(CheckoutEvent::Completed {
						chain_id: *chain_id,
						tx_hash: *tx_hash,
						asset: asset.clone(),
					});
				}
				PurchaseOutcome::Failed { reason, .. } => {
					self.publish(CheckoutEvent::Failed {
						asset: asset_id.clone(),
						reason: reason.clone(),
					});
				}
			},
		}

		Ok(Some(outcome))
	}

	fn resolve_aborted_card(&self, purchase: &GatewayPurchase) -> Option<PurchaseOutcome> {
		let asset_ref = purchase.asset.as_ref()?;
		let item_id = asset_ref.item_id.as_ref()?;
		let asset_id = AssetId::new(asset_ref.contract_address, item_id.clone());

		let (_, waiter) = self.pending_card.remove(&asset_id)?;
		let reason = match purchase.status {
			GatewayPurchaseStatus::Cancelled => "Purchase cancelled",
			_ => "Purchase failed",
		};
		let outcome = PurchaseOutcome::Failed {
			asset: asset_id,
			reason: reason.to_string(),
		};
		let _ = waiter.send(outcome.clone());
		Some(outcome)
	}

	fn publish(&self, event: CheckoutEvent) {
		self.event_bus.publish(MarketEvent::Checkout(event)).ok();
	}

	fn publish_state(&self, asset: &AssetId, state: PurchaseState) {
		self.publish(CheckoutEvent::StateChanged {
			asset: asset.clone(),
			state,
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Address, B256};
	use market_catalog::CatalogInterface;
	use market_chain::ChainInterface;
	use market_credits::CreditsInterface;
	use market_features::{FeatureFlagInterface, FeaturesError};
	use market_storage::implementations::memory::MemoryStorage;
	use market_types::{
		AssetCategory, BrowseQuery, CatalogPage, ChainId, CreditsBalance, CreditsEvent,
		GatewayAssetRef, Transaction, TransactionReceipt,
	};
	use std::collections::HashMap;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::time::Duration;

	const CHAIN_HASH: B256 = B256::repeat_byte(0xbb);
	const TRADE_HASH: B256 = B256::repeat_byte(0xaa);
	const SPEND_HASH: B256 = B256::repeat_byte(0xcc);

	#[derive(Default)]
	struct Counters {
		prompts: AtomicU32,
		widgets: AtomicU32,
		accepts: AtomicU32,
		spends: AtomicU32,
		submits: AtomicU32,
	}

	struct StubTrades {
		counters: Arc<Counters>,
	}

	#[async_trait]
	impl TradeInterface for StubTrades {
		async fn fetch_trade(&self, trade_id: &str) -> Result<Trade, CheckoutError> {
			Ok(Trade {
				id: trade_id.to_string(),
				signer: Address::repeat_byte(0x01),
				signature: "0xsig".to_string(),
				chain_id: 137,
				checks: market_types::TradeChecks {
					expiration: u64::MAX,
					effective: 0,
					uses: 1,
				},
				sent: vec![],
				received: vec![],
			})
		}

		async fn accept(&self, _trade: &Trade, _wallet: &Wallet) -> Result<TxHash, CheckoutError> {
			self.counters.accepts.fetch_add(1, Ordering::SeqCst);
			Ok(TRADE_HASH)
		}
	}

	struct StubPrompt {
		response: PromptResponse,
		counters: Arc<Counters>,
	}

	#[async_trait]
	impl ExplanationPrompt for StubPrompt {
		async fn present(&self, _asset: &Asset) -> Result<PromptResponse, CheckoutError> {
			self.counters.prompts.fetch_add(1, Ordering::SeqCst);
			Ok(self.response)
		}
	}

	struct StubGateway {
		fail: bool,
		counters: Arc<Counters>,
	}

	#[async_trait]
	impl CardGateway for StubGateway {
		async fn open_widget(&self, _asset: &Asset) -> Result<(), CheckoutError> {
			if self.fail {
				return Err(CheckoutError::Network("widget unavailable".to_string()));
			}
			self.counters.widgets.fetch_add(1, Ordering::SeqCst);
			Ok(())
		}
	}

	struct StubChain {
		fail: bool,
		counters: Arc<Counters>,
	}

	#[async_trait]
	impl ChainInterface for StubChain {
		async fn submit(&self, _tx: &Transaction) -> Result<TxHash, ChainError> {
			if self.fail {
				return Err(ChainError::Network("relay unavailable".to_string()));
			}
			self.counters.submits.fetch_add(1, Ordering::SeqCst);
			Ok(CHAIN_HASH)
		}

		async fn receipt(
			&self,
			hash: &TxHash,
			_chain_id: ChainId,
		) -> Result<Option<TransactionReceipt>, ChainError> {
			Ok(Some(TransactionReceipt {
				hash: *hash,
				block_number: 1,
				success: true,
			}))
		}
	}

	struct StubCredits {
		balance: Option<CreditsBalance>,
		counters: Arc<Counters>,
	}

	#[async_trait]
	impl CreditsInterface for StubCredits {
		async fn balance(
			&self,
			_address: Address,
		) -> Result<Option<CreditsBalance>, CreditsError> {
			Ok(self.balance.clone())
		}

		async fn spend_with_trade(
			&self,
			_trade: &Trade,
			_wallet: &Wallet,
		) -> Result<TxHash, CreditsError> {
			self.counters.spends.fetch_add(1, Ordering::SeqCst);
			Ok(SPEND_HASH)
		}

		async fn spend_on_mint(
			&self,
			_asset: &Asset,
			_wallet: &Wallet,
		) -> Result<TxHash, CreditsError> {
			self.counters.spends.fetch_add(1, Ordering::SeqCst);
			Ok(SPEND_HASH)
		}
	}

	struct StubCatalog {
		asset: Asset,
	}

	#[async_trait]
	impl CatalogInterface for StubCatalog {
		async fn search(&self, _query: &BrowseQuery) -> Result<CatalogPage, CatalogError> {
			Ok(CatalogPage {
				assets: vec![],
				total: 0,
			})
		}

		async fn get_one(&self, _id: &AssetId) -> Result<Asset, CatalogError> {
			Ok(self.asset.clone())
		}
	}

	struct StubFlags {
		credits_enabled: bool,
	}

	#[async_trait]
	impl FeatureFlagInterface for StubFlags {
		async fn fetch_flags(&self) -> Result<HashMap<FeatureFlag, bool>, FeaturesError> {
			let mut flags = HashMap::new();
			flags.insert(FeatureFlag::Credits, self.credits_enabled);
			Ok(flags)
		}
	}

	struct Options {
		credits_enabled: bool,
		credits_balance: Option<CreditsBalance>,
		prompt: PromptResponse,
		chain_fail: bool,
		gateway_fail: bool,
	}

	impl Default for Options {
		fn default() -> Self {
			Self {
				credits_enabled: true,
				credits_balance: None,
				prompt: PromptResponse::Proceed,
				chain_fail: false,
				gateway_fail: false,
			}
		}
	}

	fn sample_asset(trade_id: Option<&str>) -> Asset {
		Asset {
			contract_address: Address::repeat_byte(0x42),
			item_id: "42".to_string(),
			token_id: None,
			name: "Sample Hat".to_string(),
			category: AssetCategory::Wearable,
			price: U256::from(1_000_000u64),
			is_on_sale: true,
			trade_id: trade_id.map(String::from),
			chain_id: 137,
		}
	}

	fn sample_wallet() -> Wallet {
		Wallet {
			address: Address::repeat_byte(0x77),
			chain_id: 137,
		}
	}

	fn balance_of(total: u64) -> CreditsBalance {
		CreditsBalance {
			total: U256::from(total),
			credits: vec![],
		}
	}

	async fn build(options: Options) -> (Arc<CheckoutService>, EventBus, Arc<Counters>) {
		let counters = Arc::new(Counters::default());
		let event_bus = EventBus::new(64);

		let features = Arc::new(FeaturesService::new(
			Box::new(StubFlags {
				credits_enabled: options.credits_enabled,
			}),
			Duration::from_secs(3600),
		));
		features.refresh().await;

		let service = Arc::new(CheckoutService::new(
			Box::new(StubTrades {
				counters: counters.clone(),
			}),
			Box::new(StubPrompt {
				response: options.prompt,
				counters: counters.clone(),
			}),
			Box::new(StubGateway {
				fail: options.gateway_fail,
				counters: counters.clone(),
			}),
			Arc::new(ChainService::new(
				Box::new(StubChain {
					fail: options.chain_fail,
					counters: counters.clone(),
				}),
				Duration::from_millis(1),
				Duration::from_secs(1),
			)),
			Arc::new(CreditsService::new(
				Box::new(StubCredits {
					balance: options.credits_balance,
					counters: counters.clone(),
				}),
				event_bus.clone(),
			)),
			Arc::new(CatalogService::new(
				Arc::new(StubCatalog {
					asset: sample_asset(None),
				}),
				event_bus.clone(),
			)),
			features,
			Arc::new(StorageService::new(Box::new(MemoryStorage::new()))),
			event_bus.clone(),
		));

		(service, event_bus, counters)
	}

	fn failure_reason(outcome: &PurchaseOutcome) -> &str {
		match outcome {
			PurchaseOutcome::Failed { reason, .. } => reason,
			PurchaseOutcome::Completed { .. } => panic!("expected a failed outcome"),
		}
	}

	fn refresh_target(events: &mut tokio::sync::broadcast::Receiver<MarketEvent>) -> Option<U256> {
		while let Ok(event) = events.try_recv() {
			if let MarketEvent::Credits(CreditsEvent::RefreshRequested { expected_total, .. }) =
				event
			{
				return Some(expected_total);
			}
		}
		None
	}

	#[tokio::test]
	async fn requires_a_wallet() {
		let (service, _bus, counters) = build(Options::default()).await;

		let intent = PurchaseIntent {
			asset: sample_asset(None),
			mode: PaymentMode::Chain,
		};
		let outcome = service.purchase(intent, None).await;

		assert_eq!(
			failure_reason(&outcome),
			"A defined wallet is required to buy an item"
		);
		assert_eq!(counters.submits.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn mints_through_the_chain_backend() {
		let (service, _bus, counters) = build(Options::default()).await;

		let intent = PurchaseIntent {
			asset: sample_asset(None),
			mode: PaymentMode::Chain,
		};
		let outcome = service.purchase(intent, Some(sample_wallet())).await;

		match outcome {
			PurchaseOutcome::Completed {
				chain_id, tx_hash, ..
			} => {
				assert_eq!(chain_id, 137);
				assert_eq!(tx_hash, CHAIN_HASH);
			}
			PurchaseOutcome::Failed { reason, .. } => panic!("unexpected failure: {}", reason),
		}
		assert_eq!(counters.submits.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn accepts_the_trade_when_one_authorizes_the_sale() {
		let (service, _bus, counters) = build(Options::default()).await;

		let intent = PurchaseIntent {
			asset: sample_asset(Some("trade-1")),
			mode: PaymentMode::Chain,
		};
		let outcome = service.purchase(intent, Some(sample_wallet())).await;

		assert!(outcome.is_completed());
		assert_eq!(counters.accepts.load(Ordering::SeqCst), 1);
		assert_eq!(counters.submits.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn surfaces_chain_backend_errors() {
		let (service, _bus, _counters) = build(Options {
			chain_fail: true,
			..Options::default()
		})
		.await;

		let intent = PurchaseIntent {
			asset: sample_asset(None),
			mode: PaymentMode::Chain,
		};
		let outcome = service.purchase(intent, Some(sample_wallet())).await;

		assert!(failure_reason(&outcome).contains("relay unavailable"));
	}

	#[tokio::test]
	async fn fails_without_spending_when_no_credits_exist() {
		let (service, _bus, counters) = build(Options::default()).await;

		let intent = PurchaseIntent {
			asset: sample_asset(None),
			mode: PaymentMode::Credits,
		};
		let outcome = service.purchase(intent, Some(sample_wallet())).await;

		assert_eq!(failure_reason(&outcome), "No credits available");
		assert_eq!(counters.spends.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn treats_a_zero_balance_as_no_credits() {
		let (service, _bus, counters) = build(Options {
			credits_balance: Some(balance_of(0)),
			..Options::default()
		})
		.await;

		let intent = PurchaseIntent {
			asset: sample_asset(None),
			mode: PaymentMode::Credits,
		};
		let outcome = service.purchase(intent, Some(sample_wallet())).await;

		assert_eq!(failure_reason(&outcome), "No credits available");
		assert_eq!(counters.spends.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn refreshes_toward_the_remaining_balance() {
		let (service, bus, counters) = build(Options {
			credits_balance: Some(balance_of(1_001_000)),
			..Options::default()
		})
		.await;
		let mut events = bus.subscribe();

		let intent = PurchaseIntent {
			asset: sample_asset(Some("trade-1")),
			mode: PaymentMode::Credits,
		};
		let outcome = service.purchase(intent, Some(sample_wallet())).await;

		assert!(outcome.is_completed());
		assert_eq!(counters.spends.load(Ordering::SeqCst), 1);
		assert_eq!(refresh_target(&mut events), Some(U256::from(1000u64)));
	}

	#[tokio::test]
	async fn clamps_the_refresh_target_at_zero() {
		let (service, bus, _counters) = build(Options {
			credits_balance: Some(balance_of(999_000)),
			..Options::default()
		})
		.await;
		let mut events = bus.subscribe();

		let intent = PurchaseIntent {
			asset: sample_asset(None),
			mode: PaymentMode::Credits,
		};
		let outcome = service.purchase(intent, Some(sample_wallet())).await;

		assert!(outcome.is_completed());
		assert_eq!(refresh_target(&mut events), Some(U256::ZERO));
	}

	#[tokio::test]
	async fn falls_back_to_chain_when_credits_are_disabled() {
		let (service, _bus, counters) = build(Options {
			credits_enabled: false,
			credits_balance: Some(balance_of(2_000_000)),
			..Options::default()
		})
		.await;

		let intent = PurchaseIntent {
			asset: sample_asset(None),
			mode: PaymentMode::Credits,
		};
		let outcome = service.purchase(intent, Some(sample_wallet())).await;

		assert!(outcome.is_completed());
		assert_eq!(counters.spends.load(Ordering::SeqCst), 0);
		assert_eq!(counters.submits.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn dismissing_the_explanation_aborts_without_persisting() {
		let (service, _bus, counters) = build(Options {
			prompt: PromptResponse::Dismissed,
			..Options::default()
		})
		.await;

		let intent = PurchaseIntent {
			asset: sample_asset(None),
			mode: PaymentMode::Card,
		};
		let outcome = service.purchase(intent, None).await;

		assert_eq!(failure_reason(&outcome), "Purchase cancelled");
		assert_eq!(counters.prompts.load(Ordering::SeqCst), 1);
		assert_eq!(counters.widgets.load(Ordering::SeqCst), 0);
		let acknowledged = service
			.storage
			.retrieve_optional::<bool>(PREFS_NAMESPACE, CARD_EXPLANATION_KEY)
			.await
			.unwrap();
		assert_eq!(acknowledged, None);
	}

	#[tokio::test]
	async fn card_purchase_resolves_when_the_gateway_settles() {
		let (service, _bus, counters) = build(Options::default()).await;

		let intent = PurchaseIntent {
			asset: sample_asset(None),
			mode: PaymentMode::Card,
		};
		let purchasing = {
			let service = service.clone();
			tokio::spawn(async move { service.purchase(intent, None).await })
		};
		tokio::time::sleep(Duration::from_millis(20)).await;

		// Proceeding persisted the acknowledgement and opened the widget.
		assert_eq!(counters.prompts.load(Ordering::SeqCst), 1);
		assert_eq!(counters.widgets.load(Ordering::SeqCst), 1);
		let acknowledged = service
			.storage
			.retrieve_optional::<bool>(PREFS_NAMESPACE, CARD_EXPLANATION_KEY)
			.await
			.unwrap();
		assert_eq!(acknowledged, Some(true));

		let settled = B256::repeat_byte(0xdd);
		let resolved = service
			.handle_gateway_purchase(GatewayPurchase {
				id: "gw-1".to_string(),
				status: GatewayPurchaseStatus::Complete,
				tx_hash: Some(settled),
				asset: Some(GatewayAssetRef {
					contract_address: Address::repeat_byte(0x42),
					item_id: Some("42".to_string()),
					token_id: None,
				}),
			})
			.await
			.unwrap();
		assert!(resolved.is_some());

		let outcome = purchasing.await.unwrap();
		match outcome {
			PurchaseOutcome::Completed { tx_hash, .. } => assert_eq!(tx_hash, settled),
			PurchaseOutcome::Failed { reason, .. } => panic!("unexpected failure: {}", reason),
		}
	}

	#[tokio::test]
	async fn skips_the_explanation_once_acknowledged() {
		let (service, _bus, counters) = build(Options::default()).await;
		service
			.storage
			.store(PREFS_NAMESPACE, CARD_EXPLANATION_KEY, &true)
			.await
			.unwrap();

		let intent = PurchaseIntent {
			asset: sample_asset(None),
			mode: PaymentMode::Card,
		};
		let purchasing = {
			let service = service.clone();
			tokio::spawn(async move { service.purchase(intent, None).await })
		};
		tokio::time::sleep(Duration::from_millis(20)).await;

		assert_eq!(counters.prompts.load(Ordering::SeqCst), 0);
		assert_eq!(counters.widgets.load(Ordering::SeqCst), 1);

		service
			.handle_gateway_purchase(GatewayPurchase {
				id: "gw-2".to_string(),
				status: GatewayPurchaseStatus::Cancelled,
				tx_hash: None,
				asset: Some(GatewayAssetRef {
					contract_address: Address::repeat_byte(0x42),
					item_id: Some("42".to_string()),
					token_id: None,
				}),
			})
			.await
			.unwrap();

		let outcome = purchasing.await.unwrap();
		assert_eq!(failure_reason(&outcome), "Purchase cancelled");
	}

	#[tokio::test]
	async fn widget_failure_clears_the_pending_waiter() {
		let (service, _bus, _counters) = build(Options {
			gateway_fail: true,
			..Options::default()
		})
		.await;

		let intent = PurchaseIntent {
			asset: sample_asset(None),
			mode: PaymentMode::Card,
		};
		let outcome = service.purchase(intent, None).await;

		assert!(failure_reason(&outcome).contains("widget unavailable"));
		assert!(service.pending_card.is_empty());
	}

	#[tokio::test]
	async fn ignores_gateway_notifications_that_settle_nothing() {
		let (service, _bus, _counters) = build(Options::default()).await;

		// Still pending.
		let pending = service
			.handle_gateway_purchase(GatewayPurchase {
				id: "gw-3".to_string(),
				status: GatewayPurchaseStatus::Pending,
				tx_hash: None,
				asset: None,
			})
			.await
			.unwrap();
		assert!(pending.is_none());

		// Complete but hashless.
		let hashless = service
			.handle_gateway_purchase(GatewayPurchase {
				id: "gw-4".to_string(),
				status: GatewayPurchaseStatus::Complete,
				tx_hash: None,
				asset: Some(GatewayAssetRef {
					contract_address: Address::repeat_byte(0x42),
					item_id: Some("42".to_string()),
					token_id: None,
				}),
			})
			.await
			.unwrap();
		assert!(hashless.is_none());

		// Secondary-market settlement.
		let secondary = service
			.handle_gateway_purchase(GatewayPurchase {
				id: "gw-5".to_string(),
				status: GatewayPurchaseStatus::Complete,
				tx_hash: Some(B256::repeat_byte(0xee)),
				asset: Some(GatewayAssetRef {
					contract_address: Address::repeat_byte(0x42),
					item_id: None,
					token_id: Some("7".to_string()),
				}),
			})
			.await
			.unwrap();
		assert!(secondary.is_none());

		// Plain token purchase with no asset attached.
		let token = service
			.handle_gateway_purchase(GatewayPurchase {
				id: "gw-6".to_string(),
				status: GatewayPurchaseStatus::Complete,
				tx_hash: Some(B256::repeat_byte(0xef)),
				asset: None,
			})
			.await
			.unwrap();
		assert!(token.is_none());
	}
}
