//! Catalog fetch coordination for the marketplace orchestrator.
//!
//! Browse queries go to the remote catalog through a backend implementing
//! [`CatalogInterface`]. At most one fetch is in flight per logical scope:
//! a newer query for the same scope cancels the older one, which resolves
//! with a distinguishable cancellation error instead of being silently
//! dropped, so callers can tell "stale" apart from "errored". No retry is
//! performed; re-issuing is the caller's decision.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use market_types::{Asset, AssetId, BrowseQuery, CatalogEvent, CatalogPage, EventBus, MarketEvent};

pub mod implementations {
	pub mod http;
}

/// Sentinel reason carried by a superseded fetch. Distinct from any
/// backend error text so consumers can ignore stale failures.
pub const FETCH_CANCELLED_MESSAGE: &str = "Fetch items request cancelled";

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
	/// The catalog backend failed; the message is surfaced verbatim.
	#[error("{0}")]
	Network(String),
	/// The fetch was superseded by a newer query for the same scope.
	#[error("Fetch items request cancelled")]
	Cancelled,
	/// The requested asset does not exist in the catalog.
	#[error("Not found")]
	NotFound,
}

impl CatalogError {
	pub fn is_cancelled(&self) -> bool {
		matches!(self, CatalogError::Cancelled)
	}
}

/// Backend interface to the remote catalog service.
#[async_trait]
pub trait CatalogInterface: Send + Sync {
	/// Runs a search and returns one page of results.
	async fn search(&self, query: &BrowseQuery) -> Result<CatalogPage, CatalogError>;

	/// Fetches a single asset by id.
	async fn get_one(&self, id: &AssetId) -> Result<Asset, CatalogError>;
}

struct InFlight {
	request_id: Uuid,
	cancel: watch::Sender<()>,
}

/// Coordinates catalog fetches with per-scope cancellation.
pub struct CatalogService {
	backend: Arc<dyn CatalogInterface>,
	in_flight: DashMap<String, InFlight>,
	event_bus: EventBus,
}

impl CatalogService {
	pub fn new(backend: Arc<dyn CatalogInterface>, event_bus: EventBus) -> Self {
		Self {
			backend,
			in_flight: DashMap::new(),
			event_bus,
		}
	}

	/// Runs a browse query, delivering exactly one outcome.
	///
	/// Registers the query as the active fetch for its scope, cancelling
	/// any previous one. The success and failure events published on the
	/// bus carry the originating query for correlation.
	pub async fn fetch(&self, query: BrowseQuery) -> Result<CatalogPage, CatalogError> {
		let (cancel_tx, mut cancel_rx) = watch::channel(());

		if let Some(previous) = self.in_flight.insert(
			query.scope.clone(),
			InFlight {
				request_id: query.request_id,
				cancel: cancel_tx,
			},
		) {
			debug!(scope = %query.scope, "Superseding in-flight catalog fetch");
			let _ = previous.cancel.send(());
		}

		let result = tokio::select! {
			result = self.backend.search(&query) => result,
			// Fires on explicit cancellation and when a newer query
			// replaces this one (the replaced sender is signalled, and a
			// dropped sender also wakes the receiver).
			_ = cancel_rx.changed() => Err(CatalogError::Cancelled),
		};

		// Deregister only if this query is still the active one.
		self.in_flight
			.remove_if(&query.scope, |_, entry| entry.request_id == query.request_id);

		match &result {
			Ok(page) => {
				self.event_bus
					.publish(MarketEvent::Catalog(CatalogEvent::FetchCompleted {
						query: query.clone(),
						assets: page.assets.clone(),
						total: page.total,
						fetched_at: chrono::Utc::now().timestamp_millis(),
					}))
					.ok();
			}
			Err(e) => {
				self.event_bus
					.publish(MarketEvent::Catalog(CatalogEvent::FetchFailed {
						query: query.clone(),
						reason: e.to_string(),
					}))
					.ok();
			}
		}

		result
	}

	/// Cancels the active fetch for a scope, if any.
	pub fn cancel(&self, scope: &str) {
		if let Some((_, entry)) = self.in_flight.remove(scope) {
			debug!(scope, "Cancelling in-flight catalog fetch");
			let _ = entry.cancel.send(());
		}
	}

	/// Fetches a single asset, bypassing scope coordination.
	pub async fn fetch_one(&self, id: &AssetId) -> Result<Asset, CatalogError> {
		self.backend.get_one(id).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::U256;
	use market_types::{AssetCategory, BrowseFilters};
	use std::time::Duration;

	const HANG: &str = "hang";

	struct MockCatalog {
		asset: Asset,
	}

	impl MockCatalog {
		fn new() -> Self {
			Self {
				asset: sample_asset(),
			}
		}
	}

	fn sample_asset() -> Asset {
		Asset {
			contract_address: "0x32Be343B94f860124dC4fEe278FDCBD38C102D88"
				.parse()
				.unwrap(),
			item_id: "1".to_string(),
			token_id: None,
			name: "Aviator Sunglasses".to_string(),
			category: AssetCategory::Wearable,
			price: U256::from(324234u64),
			is_on_sale: true,
			trade_id: None,
			chain_id: 137,
		}
	}

	#[async_trait]
	impl CatalogInterface for MockCatalog {
		async fn search(&self, query: &BrowseQuery) -> Result<CatalogPage, CatalogError> {
			match query.filters.search.as_deref() {
				Some(HANG) => std::future::pending().await,
				Some("boom") => Err(CatalogError::Network("An error occured".to_string())),
				_ => Ok(CatalogPage {
					assets: vec![self.asset.clone()],
					total: 1,
				}),
			}
		}

		async fn get_one(&self, _id: &AssetId) -> Result<Asset, CatalogError> {
			Ok(self.asset.clone())
		}
	}

	fn query(scope: &str, search: &str) -> BrowseQuery {
		BrowseQuery::new(
			scope,
			BrowseFilters {
				search: Some(search.to_string()),
				..Default::default()
			},
			0,
		)
	}

	fn service() -> Arc<CatalogService> {
		Arc::new(CatalogService::new(
			Arc::new(MockCatalog::new()),
			EventBus::new(64),
		))
	}

	#[tokio::test]
	async fn newer_query_cancels_the_prior_one_for_the_scope() {
		let service = service();

		let stale = query("browse", HANG);
		let stale_id = stale.request_id;
		let handle = {
			let service = service.clone();
			tokio::spawn(async move { service.fetch(stale).await })
		};
		tokio::time::sleep(Duration::from_millis(10)).await;

		let mut events = service.event_bus.subscribe();
		let fresh = service.fetch(query("browse", "sunglasses")).await.unwrap();
		assert_eq!(fresh.total, 1);

		let stale_result = handle.await.unwrap();
		let err = stale_result.unwrap_err();
		assert!(err.is_cancelled());
		assert_eq!(err.to_string(), FETCH_CANCELLED_MESSAGE);

		// The stale failure event is correlated to the superseded query.
		loop {
			match events.recv().await.unwrap() {
				MarketEvent::Catalog(CatalogEvent::FetchFailed { query, reason }) => {
					assert_eq!(query.request_id, stale_id);
					assert_eq!(reason, FETCH_CANCELLED_MESSAGE);
					break;
				}
				_ => continue,
			}
		}
	}

	#[tokio::test]
	async fn queries_in_different_scopes_do_not_interfere() {
		let service = service();

		let other_scope = query("account", HANG);
		let handle = {
			let service = service.clone();
			tokio::spawn(async move { service.fetch(other_scope).await })
		};
		tokio::time::sleep(Duration::from_millis(10)).await;

		service.fetch(query("browse", "sunglasses")).await.unwrap();

		assert!(!handle.is_finished());
		handle.abort();
	}

	#[tokio::test]
	async fn explicit_cancel_resolves_the_fetch_with_the_sentinel() {
		let service = service();

		let hanging = query("browse", HANG);
		let handle = {
			let service = service.clone();
			tokio::spawn(async move { service.fetch(hanging).await })
		};
		tokio::time::sleep(Duration::from_millis(10)).await;

		service.cancel("browse");

		let err = handle.await.unwrap().unwrap_err();
		assert_eq!(err.to_string(), FETCH_CANCELLED_MESSAGE);
	}

	#[tokio::test]
	async fn backend_errors_surface_verbatim() {
		let service = service();

		let err = service.fetch(query("browse", "boom")).await.unwrap_err();
		assert_eq!(err.to_string(), "An error occured");
		assert!(!err.is_cancelled());
	}

	#[tokio::test]
	async fn success_event_carries_the_query_and_a_timestamp() {
		let service = service();
		let mut events = service.event_bus.subscribe();

		let fresh = query("browse", "sunglasses");
		let request_id = fresh.request_id;
		service.fetch(fresh).await.unwrap();

		match events.recv().await.unwrap() {
			MarketEvent::Catalog(CatalogEvent::FetchCompleted {
				query,
				total,
				fetched_at,
				..
			}) => {
				assert_eq!(query.request_id, request_id);
				assert_eq!(total, 1);
				assert!(fetched_at > 0);
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}
}
