//! Off-chain trade types.
//!
//! A trade is a signed off-chain record authorizing an asset transfer,
//! redeemed on-chain when accepted.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::ChainId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeAssetType {
	CollectionItem,
	Erc20,
	Erc721,
}

/// One leg of a trade (an asset sent or received).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeAsset {
	pub asset_type: TradeAssetType,
	pub contract_address: Address,
	pub item_id: Option<String>,
	pub amount: Option<U256>,
	pub beneficiary: Option<Address>,
}

/// Validity checks attached to a trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeChecks {
	/// Unix timestamp after which the trade is no longer redeemable.
	pub expiration: u64,
	/// Unix timestamp from which the trade becomes redeemable.
	pub effective: u64,
	/// How many times the trade may be redeemed.
	pub uses: u32,
}

/// A signed off-chain trade record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
	pub id: String,
	/// Address that signed the trade.
	pub signer: Address,
	pub signature: String,
	pub chain_id: ChainId,
	pub checks: TradeChecks,
	pub sent: Vec<TradeAsset>,
	pub received: Vec<TradeAsset>,
}
