//! Configuration for the marketplace orchestrator.
//!
//! Configuration is TOML with `${VAR}` environment substitution, a small
//! set of environment overrides, and a validation pass that runs before
//! any service is built.

use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub market: MarketSettings,
	pub storage: BackendConfig,
	pub catalog: BackendConfig,
	pub credits: BackendConfig,
	pub chain: BackendConfig,
	pub features: FeaturesSettings,
	pub checkout: CheckoutSettings,
}

/// General service settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketSettings {
	pub name: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
	#[serde(default = "default_http_port")]
	pub http_port: u16,
	/// How long background monitors (receipt polls, balance refreshes)
	/// keep trying before giving up.
	#[serde(default = "default_monitoring_timeout_secs")]
	pub monitoring_timeout_secs: u64,
}

/// Selects a backend implementation and carries its raw settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
	pub backend: String,
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeaturesSettings {
	pub backend: String,
	#[serde(default = "default_refresh_interval_secs")]
	pub refresh_interval_secs: u64,
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSettings {
	pub trades: BackendConfig,
	pub gateway: BackendConfig,
	pub prompt: BackendConfig,
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_http_port() -> u16 {
	8080
}

fn default_monitoring_timeout_secs() -> u64 {
	300
}

fn default_refresh_interval_secs() -> u64 {
	60
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::map::Map::new())
}

/// Configuration loader with environment variable substitution.
#[derive(Default)]
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "MARKET_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<Config, ConfigError> {
		let mut config = if let Some(file_path) = &self.file_path {
			self.load_from_file(file_path).await?
		} else {
			return Err(ConfigError::FileNotFound(
				"No configuration file specified".to_string(),
			));
		};

		self.apply_env_overrides(&mut config)?;
		self.validate_config(&config)?;

		Ok(config)
	}

	async fn load_from_file(&self, file_path: &str) -> Result<Config, ConfigError> {
		let content = match tokio::fs::read_to_string(file_path).await {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(ConfigError::FileNotFound(file_path.to_string()))
			}
			Err(e) => return Err(ConfigError::IoError(e)),
		};

		let substituted = self.substitute_env_vars(&content)?;

		toml::from_str(&substituted).map_err(|e| ConfigError::ParseError(e.to_string()))
	}

	fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
		let mut result = content.to_string();

		// Replace ${VAR_NAME} patterns with environment values.
		let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static pattern");

		for cap in re.captures_iter(content) {
			let full_match = &cap[0];
			let var_name = &cap[1];

			let env_value = env::var(var_name)
				.map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

			result = result.replace(full_match, &env_value);
		}

		Ok(result)
	}

	fn apply_env_overrides(&self, config: &mut Config) -> Result<(), ConfigError> {
		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			config.market.log_level = log_level;
		}

		if let Ok(http_port) = env::var(format!("{}HTTP_PORT", self.env_prefix)) {
			config.market.http_port = http_port
				.parse()
				.map_err(|e| ConfigError::ValidationError(format!("Invalid HTTP port: {}", e)))?;
		}

		Ok(())
	}

	fn validate_config(&self, config: &Config) -> Result<(), ConfigError> {
		let backends = [
			("storage", &config.storage.backend),
			("catalog", &config.catalog.backend),
			("credits", &config.credits.backend),
			("chain", &config.chain.backend),
			("checkout.trades", &config.checkout.trades.backend),
			("checkout.gateway", &config.checkout.gateway.backend),
			("checkout.prompt", &config.checkout.prompt.backend),
		];

		for (section, backend) in backends {
			if backend.is_empty() {
				return Err(ConfigError::ValidationError(format!(
					"A backend must be configured for [{}]",
					section
				)));
			}
		}

		if config.features.backend.is_empty() {
			return Err(ConfigError::ValidationError(
				"A backend must be configured for [features]".to_string(),
			));
		}

		if config.market.monitoring_timeout_secs == 0 {
			return Err(ConfigError::ValidationError(
				"monitoring_timeout_secs must be greater than zero".to_string(),
			));
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	const SAMPLE: &str = r#"
[market]
name = "marketplace-orchestrator"

[storage]
backend = "file"
[storage.config]
storage_path = "./data/storage"

[catalog]
backend = "http"
[catalog.config]
base_url = "${TEST_CATALOG_URL}"

[credits]
backend = "http"

[chain]
backend = "relay"

[features]
backend = "http"

[checkout.trades]
backend = "http"
[checkout.gateway]
backend = "transak"
[checkout.prompt]
backend = "auto"
"#;

	fn write_config(content: &str) -> tempfile::NamedTempFile {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(content.as_bytes()).unwrap();
		file
	}

	#[tokio::test]
	async fn loads_and_substitutes_env_vars() {
		env::set_var("TEST_CATALOG_URL", "https://catalog.example.com");
		let file = write_config(SAMPLE);

		let config = ConfigLoader::new()
			.with_file(file.path())
			.load()
			.await
			.unwrap();

		assert_eq!(config.market.name, "marketplace-orchestrator");
		assert_eq!(config.market.http_port, 8080);
		assert_eq!(
			config
				.catalog
				.config
				.get("base_url")
				.and_then(|v| v.as_str()),
			Some("https://catalog.example.com")
		);
	}

	#[tokio::test]
	async fn missing_env_var_is_an_error() {
		env::remove_var("TEST_MISSING_VAR");
		let file = write_config(&SAMPLE.replace("TEST_CATALOG_URL", "TEST_MISSING_VAR"));

		let result = ConfigLoader::new().with_file(file.path()).load().await;
		assert!(matches!(result, Err(ConfigError::EnvVarNotFound(v)) if v == "TEST_MISSING_VAR"));
	}

	#[tokio::test]
	async fn empty_backend_fails_validation() {
		env::set_var("TEST_CATALOG_URL", "https://catalog.example.com");
		let file = write_config(&SAMPLE.replace("backend = \"relay\"", "backend = \"\""));

		let result = ConfigLoader::new().with_file(file.path()).load().await;
		assert!(matches!(result, Err(ConfigError::ValidationError(_))));
	}

	#[tokio::test]
	async fn missing_file_is_reported() {
		let result = ConfigLoader::new()
			.with_file("/does/not/exist.toml")
			.load()
			.await;
		assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
	}
}
