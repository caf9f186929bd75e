//! Credits types.
//!
//! Credits are an off-chain balance redeemable against purchase price.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// A single credit line granted to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditLine {
	pub id: String,
	pub amount: U256,
	pub available_amount: U256,
	/// Unix timestamp at which the credit expires.
	pub expires_at: u64,
	pub season: u32,
	pub signature: String,
}

/// Aggregate credits available to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditsBalance {
	/// Sum of available credits in wei.
	pub total: U256,
	pub credits: Vec<CreditLine>,
}

impl CreditsBalance {
	pub fn is_empty(&self) -> bool {
		self.total.is_zero()
	}
}
