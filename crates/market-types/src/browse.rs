//! Catalog browse types.
//!
//! A browse query identifies one logical search against the remote catalog.
//! Queries sharing a scope supersede each other; the newest query for a
//! scope is the only one whose result the caller still wants.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Asset, AssetCategory, Rarity};

/// Filters applied to a catalog search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowseFilters {
	pub category: Option<AssetCategory>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub rarities: Vec<Rarity>,
	pub search: Option<String>,
	pub is_on_sale: Option<bool>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub contract_addresses: Vec<Address>,
}

/// One logical catalog search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowseQuery {
	/// Logical scope of the search (e.g. the view issuing it). A newer
	/// query for the same scope supersedes this one.
	pub scope: String,
	pub filters: BrowseFilters,
	pub page: u32,
	/// Correlates outcomes back to the request that produced them.
	pub request_id: Uuid,
}

impl BrowseQuery {
	pub fn new(scope: impl Into<String>, filters: BrowseFilters, page: u32) -> Self {
		Self {
			scope: scope.into(),
			filters,
			page,
			request_id: Uuid::new_v4(),
		}
	}
}

/// One page of catalog results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPage {
	pub assets: Vec<Asset>,
	/// Total matches across all pages.
	pub total: u64,
}
