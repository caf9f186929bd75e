//! Asset types for the marketplace system.
//!
//! This module defines the purchasable asset representation shared by the
//! catalog, checkout, and service layers.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::ChainId;

/// Category of a marketplace asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
	Parcel,
	Estate,
	Wearable,
	Emote,
	Ens,
}

/// Rarity tier for wearables and emotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
	Common,
	Uncommon,
	Rare,
	Epic,
	Legendary,
	Mythic,
	Unique,
}

/// A purchasable marketplace asset.
///
/// Assets come from the remote catalog. Primary sales carry an item id and
/// no token id; secondary sales carry a minted token id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
	/// Collection contract the asset belongs to.
	pub contract_address: Address,
	/// Item id within the collection.
	pub item_id: String,
	/// Minted token id, present for secondary-market assets.
	pub token_id: Option<String>,
	/// Display name.
	pub name: String,
	pub category: AssetCategory,
	/// Listed price in wei.
	pub price: U256,
	pub is_on_sale: bool,
	/// Off-chain trade authorizing the sale, when one exists.
	pub trade_id: Option<String>,
	/// Chain the asset lives on.
	pub chain_id: ChainId,
}

/// Identifier of an asset within a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId {
	pub contract_address: Address,
	pub item_id: String,
}

impl AssetId {
	pub fn new(contract_address: Address, item_id: impl Into<String>) -> Self {
		Self {
			contract_address,
			item_id: item_id.into(),
		}
	}
}

impl From<&Asset> for AssetId {
	fn from(asset: &Asset) -> Self {
		Self {
			contract_address: asset.contract_address,
			item_id: asset.item_id.clone(),
		}
	}
}

impl std::fmt::Display for AssetId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", self.contract_address, self.item_id)
	}
}
