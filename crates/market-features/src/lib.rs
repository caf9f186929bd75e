//! Feature-flag service for the marketplace orchestrator.
//!
//! Flags are loaded from a remote flag store. Until the initial load
//! completes, every query answers `false` so early flows cannot race ahead
//! of configuration; flows that need a definitive answer suspend on
//! [`FeaturesService::wait_until_loaded`] first.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, RwLock};
use tracing::{debug, warn};

pub mod implementations {
	pub mod http;
}

/// Errors that can occur while fetching feature flags.
#[derive(Debug, Error)]
pub enum FeaturesError {
	#[error("Network error: {0}")]
	Network(String),
	#[error("Malformed flag payload: {0}")]
	Malformed(String),
}

/// Known feature flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureFlag {
	Credits,
	CreditsSecondarySales,
	MarketplaceServer,
	OffchainPublicItemOrders,
	OffchainPublicNftOrders,
	Maintenance,
}

impl FeatureFlag {
	pub fn all() -> [FeatureFlag; 6] {
		[
			FeatureFlag::Credits,
			FeatureFlag::CreditsSecondarySales,
			FeatureFlag::MarketplaceServer,
			FeatureFlag::OffchainPublicItemOrders,
			FeatureFlag::OffchainPublicNftOrders,
			FeatureFlag::Maintenance,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			FeatureFlag::Credits => "credits",
			FeatureFlag::CreditsSecondarySales => "credits-secondary-sales",
			FeatureFlag::MarketplaceServer => "marketplace-server",
			FeatureFlag::OffchainPublicItemOrders => "offchain-public-item-orders",
			FeatureFlag::OffchainPublicNftOrders => "offchain-public-nft-orders",
			FeatureFlag::Maintenance => "maintenance",
		}
	}

	pub fn from_str(name: &str) -> Option<FeatureFlag> {
		FeatureFlag::all()
			.into_iter()
			.find(|flag| flag.as_str() == name)
	}
}

impl std::fmt::Display for FeatureFlag {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Backend that fetches the current flag set from the flag store.
#[async_trait]
pub trait FeatureFlagInterface: Send + Sync {
	async fn fetch_flags(&self) -> Result<HashMap<FeatureFlag, bool>, FeaturesError>;
}

/// Feature-flag service with an initial-load gate.
pub struct FeaturesService {
	backend: Box<dyn FeatureFlagInterface>,
	flags: RwLock<HashMap<FeatureFlag, bool>>,
	loaded_tx: watch::Sender<bool>,
	refresh_interval: Duration,
}

impl FeaturesService {
	pub fn new(backend: Box<dyn FeatureFlagInterface>, refresh_interval: Duration) -> Self {
		let (loaded_tx, _) = watch::channel(false);
		Self {
			backend,
			flags: RwLock::new(HashMap::new()),
			loaded_tx,
			refresh_interval,
		}
	}

	/// Starts the background refresh loop.
	///
	/// The initial-load signal flips to `true` after the first successful
	/// fetch and stays `true` afterwards; a failed refresh keeps the last
	/// known flag set.
	pub fn start(self: &Arc<Self>) {
		let service = self.clone();
		tokio::spawn(async move {
			let mut interval = tokio::time::interval(service.refresh_interval);
			loop {
				interval.tick().await;
				service.refresh().await;
			}
		});
	}

	/// Fetches the flag set once and updates the local view.
	pub async fn refresh(&self) {
		match self.backend.fetch_flags().await {
			Ok(fetched) => {
				debug!("Loaded {} feature flags", fetched.len());
				*self.flags.write().await = fetched;
				self.loaded_tx.send_replace(true);
			}
			Err(e) => {
				warn!("Failed to fetch feature flags: {}", e);
			}
		}
	}

	/// Whether the initial flag load has completed.
	pub fn has_loaded_initial_flags(&self) -> bool {
		*self.loaded_tx.borrow()
	}

	/// Evaluates a flag. Answers `false` until the initial load completes.
	pub async fn is_enabled(&self, flag: FeatureFlag) -> bool {
		if !self.has_loaded_initial_flags() {
			return false;
		}
		self.flags.read().await.get(&flag).copied().unwrap_or(false)
	}

	/// Suspends until the initial flag load has completed.
	pub async fn wait_until_loaded(&self) {
		let mut rx = self.loaded_tx.subscribe();
		let _ = rx.wait_for(|loaded| *loaded).await;
	}

	/// Waits for the initial load, then evaluates the flag.
	pub async fn is_enabled_once_loaded(&self, flag: FeatureFlag) -> bool {
		self.wait_until_loaded().await;
		self.is_enabled(flag).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicBool, Ordering};

	struct StubBackend {
		flags: HashMap<FeatureFlag, bool>,
		fail: AtomicBool,
	}

	impl StubBackend {
		fn new(flags: HashMap<FeatureFlag, bool>) -> Self {
			Self {
				flags,
				fail: AtomicBool::new(false),
			}
		}
	}

	#[async_trait]
	impl FeatureFlagInterface for StubBackend {
		async fn fetch_flags(&self) -> Result<HashMap<FeatureFlag, bool>, FeaturesError> {
			if self.fail.load(Ordering::SeqCst) {
				return Err(FeaturesError::Network("flag store unreachable".into()));
			}
			Ok(self.flags.clone())
		}
	}

	#[tokio::test]
	async fn answers_false_before_initial_load() {
		let backend = StubBackend::new(HashMap::from([(FeatureFlag::Credits, true)]));
		let service = FeaturesService::new(Box::new(backend), Duration::from_secs(60));

		assert!(!service.has_loaded_initial_flags());
		assert!(!service.is_enabled(FeatureFlag::Credits).await);
	}

	#[tokio::test]
	async fn reflects_backend_after_load() {
		let backend = StubBackend::new(HashMap::from([
			(FeatureFlag::Credits, true),
			(FeatureFlag::Maintenance, false),
		]));
		let service = FeaturesService::new(Box::new(backend), Duration::from_secs(60));

		service.refresh().await;

		assert!(service.has_loaded_initial_flags());
		assert!(service.is_enabled(FeatureFlag::Credits).await);
		assert!(!service.is_enabled(FeatureFlag::Maintenance).await);
		// Unknown flags stay off.
		assert!(!service.is_enabled(FeatureFlag::MarketplaceServer).await);
	}

	#[tokio::test]
	async fn failed_load_keeps_the_gate_closed() {
		let backend = StubBackend::new(HashMap::from([(FeatureFlag::Credits, true)]));
		backend.fail.store(true, Ordering::SeqCst);
		let service = FeaturesService::new(Box::new(backend), Duration::from_secs(60));

		service.refresh().await;

		assert!(!service.has_loaded_initial_flags());
		assert!(!service.is_enabled(FeatureFlag::Credits).await);
	}

	#[tokio::test]
	async fn wait_until_loaded_suspends_until_first_success() {
		let backend = StubBackend::new(HashMap::from([(FeatureFlag::Credits, true)]));
		let service = Arc::new(FeaturesService::new(
			Box::new(backend),
			Duration::from_secs(60),
		));

		let waiter = {
			let service = service.clone();
			tokio::spawn(async move { service.is_enabled_once_loaded(FeatureFlag::Credits).await })
		};

		// Give the waiter a chance to park on the gate.
		tokio::time::sleep(Duration::from_millis(10)).await;
		assert!(!waiter.is_finished());

		service.refresh().await;
		assert!(waiter.await.unwrap());
	}
}
