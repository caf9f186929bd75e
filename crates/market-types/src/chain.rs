//! Transaction types for the marketplace system.
//!
//! This module defines types related to blockchain transaction submission
//! and monitoring, including transaction hashes and receipts.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// Numeric chain identifier (e.g. 1 for Ethereum mainnet, 137 for Polygon).
pub type ChainId = u64;

/// Blockchain transaction hash.
pub type TxHash = B256;

/// A transaction ready for submission.
///
/// Signing happens in the submission backend; callers only describe the
/// call to perform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
	/// Target contract address.
	pub to: Address,
	/// ABI-encoded calldata.
	pub data: Bytes,
	/// Native token value to attach.
	pub value: U256,
	/// Chain to submit on.
	pub chain_id: ChainId,
}

/// Transaction receipt containing execution details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
	/// The hash of the transaction.
	pub hash: TxHash,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Whether the transaction executed successfully.
	pub success: bool,
}
