//! Mint transaction construction.
//!
//! Primary sales without an authorizing trade go straight through the
//! collection store contract. The calldata is the store's `buy` call with
//! the collection, item id, and listed price.

use alloy_primitives::{address, Address, Bytes, U256};
use market_types::{Asset, ChainId, Transaction};

use crate::CheckoutError;

/// Selector of the collection store `buy(address,uint256,uint256)` call.
const BUY_SELECTOR: [u8; 4] = [0xec, 0x4d, 0x9c, 0x29];

/// Collection store contract per supported chain.
fn collection_store(chain_id: ChainId) -> Option<Address> {
	match chain_id {
		// Polygon mainnet
		137 => Some(address!("214ffc0f0103735728dc66b61a22e4f163e275ae")),
		// Amoy testnet
		80002 => Some(address!("81f0b2f0cbd0a6b1bcd0c466bae44266e55d9aa8")),
		_ => None,
	}
}

fn address_word(address: Address) -> [u8; 32] {
	let mut word = [0u8; 32];
	word[12..].copy_from_slice(address.as_slice());
	word
}

/// Builds the collection-store mint transaction for a primary-sale asset.
pub fn mint_transaction(asset: &Asset) -> Result<Transaction, CheckoutError> {
	let store = collection_store(asset.chain_id).ok_or_else(|| {
		CheckoutError::Validation(format!("No collection store for chain {}", asset.chain_id))
	})?;

	let item_id = U256::from_str_radix(&asset.item_id, 10)
		.map_err(|_| CheckoutError::Validation(format!("Invalid item id: {}", asset.item_id)))?;

	let mut data = Vec::with_capacity(4 + 32 * 3);
	data.extend_from_slice(&BUY_SELECTOR);
	data.extend_from_slice(&address_word(asset.contract_address));
	data.extend_from_slice(&item_id.to_be_bytes::<32>());
	data.extend_from_slice(&asset.price.to_be_bytes::<32>());

	Ok(Transaction {
		to: store,
		data: Bytes::from(data),
		value: U256::ZERO,
		chain_id: asset.chain_id,
	})
}
