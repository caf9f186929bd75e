//! Purchase types for the marketplace system.
//!
//! This module defines the purchase intent, its lifecycle states, and the
//! normalized outcome every intent resolves to.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{Asset, AssetId, ChainId, TxHash};

/// How a purchase is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
	/// Pay on-chain with the connected wallet.
	Chain,
	/// Redeem off-chain credits against the price.
	Credits,
	/// Pay by card through the external on-ramp gateway.
	Card,
}

/// A request to purchase one asset.
///
/// Immutable once issued; resolves to exactly one [`PurchaseOutcome`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseIntent {
	pub asset: Asset,
	pub mode: PaymentMode,
}

/// Lifecycle state of an in-flight purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseState {
	Idle,
	AwaitingFunds,
	AwaitingSignature,
	Confirmed,
	Failed,
}

/// Normalized result of a purchase intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PurchaseOutcome {
	Completed {
		chain_id: ChainId,
		tx_hash: TxHash,
		asset: Asset,
	},
	Failed {
		asset: AssetId,
		reason: String,
	},
}

impl PurchaseOutcome {
	pub fn is_completed(&self) -> bool {
		matches!(self, PurchaseOutcome::Completed { .. })
	}
}

/// Status reported by the card payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayPurchaseStatus {
	Pending,
	Complete,
	Failed,
	Cancelled,
}

/// Asset reference attached to a gateway purchase notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayAssetRef {
	pub contract_address: Address,
	/// Present for primary (mint) purchases.
	pub item_id: Option<String>,
	/// Present for secondary-market purchases.
	pub token_id: Option<String>,
}

/// Notification emitted by the card payment gateway as a purchase advances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPurchase {
	pub id: String,
	pub status: GatewayPurchaseStatus,
	pub tx_hash: Option<TxHash>,
	/// Absent for plain token (non-NFT) purchases.
	pub asset: Option<GatewayAssetRef>,
}

impl GatewayPurchase {
	/// Whether this notification settles a primary-market NFT purchase.
	pub fn is_complete_primary(&self) -> bool {
		self.status == GatewayPurchaseStatus::Complete
			&& self.tx_hash.is_some()
			&& self
				.asset
				.as_ref()
				.is_some_and(|a| a.item_id.is_some() && a.token_id.is_none())
	}
}
