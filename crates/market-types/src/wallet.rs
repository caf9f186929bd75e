use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::ChainId;

/// A connected wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
	pub address: Address,
	pub chain_id: ChainId,
}
