//! HTTP feature-flag backend.
//!
//! Fetches the flag document published by the flag store as JSON:
//! `{ "flags": { "<application>-<flag>": true, ... } }`.

use crate::{FeatureFlag, FeatureFlagInterface, FeaturesError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
struct FlagDocument {
	#[serde(default)]
	flags: HashMap<String, bool>,
}

pub struct HttpFeatureFlags {
	client: reqwest::Client,
	base_url: String,
	application: String,
}

impl HttpFeatureFlags {
	pub fn new(base_url: impl Into<String>, application: impl Into<String>) -> Self {
		Self {
			client: reqwest::Client::new(),
			base_url: base_url.into(),
			application: application.into(),
		}
	}
}

#[async_trait]
impl FeatureFlagInterface for HttpFeatureFlags {
	async fn fetch_flags(&self) -> Result<HashMap<FeatureFlag, bool>, FeaturesError> {
		let url = format!("{}/{}.json", self.base_url, self.application);

		let response = self
			.client
			.get(&url)
			.send()
			.await
			.map_err(|e| FeaturesError::Network(e.to_string()))?
			.error_for_status()
			.map_err(|e| FeaturesError::Network(e.to_string()))?;

		let document: FlagDocument = response
			.json()
			.await
			.map_err(|e| FeaturesError::Malformed(e.to_string()))?;

		let mut flags = HashMap::new();
		for flag in FeatureFlag::all() {
			let key = format!("{}-{}", self.application, flag.as_str());
			if let Some(enabled) = document.flags.get(&key) {
				flags.insert(flag, *enabled);
			}
		}

		Ok(flags)
	}
}

/// Creates an HTTP feature-flag backend from configuration.
///
/// Configuration parameters:
/// - `base_url`: flag store root (required)
/// - `application`: flag namespace (default: "marketplace")
pub fn create_backend(config: &toml::Value) -> Box<dyn FeatureFlagInterface> {
	let base_url = config
		.get("base_url")
		.and_then(|v| v.as_str())
		.unwrap_or("https://feature-flags.example.com")
		.to_string();
	let application = config
		.get("application")
		.and_then(|v| v.as_str())
		.unwrap_or("marketplace")
		.to_string();

	Box::new(HttpFeatureFlags::new(base_url, application))
}
