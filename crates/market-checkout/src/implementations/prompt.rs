//! Static explanation prompt backend.
//!
//! Deployments where the card explanation is rendered and answered by the
//! edge client configure the orchestrator with a fixed response here.

use crate::{CheckoutError, ExplanationPrompt, PromptResponse};
use async_trait::async_trait;
use market_types::Asset;
use tracing::debug;

pub struct StaticPrompt {
	response: PromptResponse,
}

impl StaticPrompt {
	pub fn new(response: PromptResponse) -> Self {
		Self { response }
	}
}

#[async_trait]
impl ExplanationPrompt for StaticPrompt {
	async fn present(&self, asset: &Asset) -> Result<PromptResponse, CheckoutError> {
		debug!(item = %asset.item_id, response = ?self.response, "Answering card explanation");
		Ok(self.response)
	}
}

/// Creates a static prompt backend from configuration.
///
/// Configuration parameters:
/// - `response`: "proceed" or "dismiss" (defaults to "proceed")
pub fn create_backend(config: &toml::Value) -> Box<dyn ExplanationPrompt> {
	let response = match config.get("response").and_then(|v| v.as_str()) {
		Some("dismiss") => PromptResponse::Dismissed,
		_ => PromptResponse::Proceed,
	};

	Box::new(StaticPrompt::new(response))
}
