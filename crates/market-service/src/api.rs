//! HTTP API for the marketplace orchestrator.

use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	response::Json,
	routing::{get, post},
	Router,
};
use market_catalog::CatalogError;
use market_features::FeatureFlag;
use market_types::{
	Asset, BrowseFilters, BrowseQuery, GatewayPurchase, PaymentMode, PurchaseIntent,
	PurchaseOutcome, Wallet,
};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::service::MarketService;

pub async fn start_http_server(service: MarketService, port: u16) -> anyhow::Result<()> {
	let app = Router::new()
		.route("/health", get(health_check))
		.route("/api/catalog", get(browse_catalog))
		.route("/api/catalog/{scope}/cancel", post(cancel_browse))
		.route("/api/purchases", post(create_purchase))
		.route("/api/gateway/purchases", post(gateway_purchase))
		.route("/api/features/{flag}", get(feature_flag))
		.with_state(service)
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive());

	let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

	info!("HTTP server listening on port {}", port);

	axum::serve(listener, app).await?;

	Ok(())
}

async fn health_check(State(service): State<MarketService>) -> Json<serde_json::Value> {
	Json(serde_json::json!({
		"status": "ok",
		"flags_loaded": service.flags_loaded(),
	}))
}

#[derive(Debug, Deserialize)]
struct BrowseParams {
	scope: String,
	#[serde(default)]
	page: u32,
	category: Option<market_types::AssetCategory>,
	search: Option<String>,
	is_on_sale: Option<bool>,
}

async fn browse_catalog(
	State(service): State<MarketService>,
	Query(params): Query<BrowseParams>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
	let filters = BrowseFilters {
		category: params.category,
		search: params.search,
		is_on_sale: params.is_on_sale,
		..BrowseFilters::default()
	};
	let query = BrowseQuery::new(params.scope, filters, params.page);
	let request_id = query.request_id;

	match service.browse(query).await {
		Ok(page) => Ok(Json(serde_json::json!({
			"request_id": request_id,
			"assets": page.assets,
			"total": page.total,
		}))),
		Err(e @ CatalogError::Cancelled) => Err((StatusCode::CONFLICT, e.to_string())),
		Err(CatalogError::NotFound) => Err((StatusCode::NOT_FOUND, "Not found".to_string())),
		Err(e) => Err((StatusCode::BAD_GATEWAY, e.to_string())),
	}
}

async fn cancel_browse(
	State(service): State<MarketService>,
	Path(scope): Path<String>,
) -> StatusCode {
	service.cancel_browse(&scope);
	StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
struct PurchaseRequest {
	asset: Asset,
	mode: PaymentMode,
	wallet: Option<Wallet>,
}

async fn create_purchase(
	State(service): State<MarketService>,
	Json(request): Json<PurchaseRequest>,
) -> Json<PurchaseOutcome> {
	let intent = PurchaseIntent {
		asset: request.asset,
		mode: request.mode,
	};

	Json(service.purchase(intent, request.wallet).await)
}

async fn gateway_purchase(
	State(service): State<MarketService>,
	Json(purchase): Json<GatewayPurchase>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
	match service.handle_gateway_purchase(purchase).await {
		Ok(Some(outcome)) => Ok(Json(serde_json::json!({
			"handled": true,
			"outcome": outcome,
		}))),
		Ok(None) => Ok(Json(serde_json::json!({ "handled": false }))),
		Err(e) => Err((StatusCode::BAD_GATEWAY, e.to_string())),
	}
}

async fn feature_flag(
	State(service): State<MarketService>,
	Path(flag): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
	let flag = FeatureFlag::from_str(&flag)
		.ok_or_else(|| (StatusCode::NOT_FOUND, format!("Unknown flag: {}", flag)))?;

	Ok(Json(serde_json::json!({
		"flag": flag.as_str(),
		"enabled": service.is_feature_enabled(flag).await,
	})))
}
