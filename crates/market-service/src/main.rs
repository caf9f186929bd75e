use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use market_config::ConfigLoader;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod service;

#[derive(Parser)]
#[command(name = "market")]
#[command(about = "Marketplace orchestrator service", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", default_value = "config/local.toml")]
	config: PathBuf,

	#[arg(long, env = "MARKET_LOG_LEVEL", default_value = "info")]
	log_level: String,
}

#[derive(Subcommand)]
enum Commands {
	/// Start the marketplace service
	Start,
	/// Validate the configuration file
	Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	setup_tracing(&cli.log_level)?;

	match cli.command {
		Some(Commands::Start) | None => start_service(cli).await,
		Some(Commands::Validate) => validate_config(cli).await,
	}
}

async fn start_service(cli: Cli) -> Result<()> {
	info!("Starting marketplace orchestrator");
	info!("Loading configuration from: {:?}", cli.config);

	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Failed to load configuration")?;

	info!("Market name: {}", config.market.name);
	info!("HTTP port: {}", config.market.http_port);

	let engine = service::build_engine(config.clone()).context("Failed to build engine")?;
	let engine = Arc::new(engine);

	let engine_handle = {
		let engine = engine.clone();
		tokio::spawn(async move {
			if let Err(e) = engine.run().await {
				tracing::error!("Engine stopped with error: {}", e);
			}
		})
	};

	let market_service = service::MarketService::new(engine.clone());
	let http_port = config.market.http_port;
	let http_handle =
		tokio::spawn(async move { api::start_http_server(market_service, http_port).await });

	info!("Marketplace orchestrator started");

	shutdown_signal().await;
	info!("Shutdown signal received, stopping services");

	http_handle.abort();
	engine_handle.abort();

	info!("Marketplace orchestrator stopped");
	Ok(())
}

async fn validate_config(cli: Cli) -> Result<()> {
	info!("Validating configuration file: {:?}", cli.config);

	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Failed to load configuration")?;

	info!("Configuration is valid");
	info!("Market name: {}", config.market.name);
	info!("Configured backends:");
	info!("  Storage: {}", config.storage.backend);
	info!("  Catalog: {}", config.catalog.backend);
	info!("  Credits: {}", config.credits.backend);
	info!("  Chain: {}", config.chain.backend);
	info!("  Features: {}", config.features.backend);
	info!("  Trades: {}", config.checkout.trades.backend);
	info!("  Gateway: {}", config.checkout.gateway.backend);
	info!("  Prompt: {}", config.checkout.prompt.backend);

	Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.init();

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		signal::ctrl_c()
			.await
			.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install signal handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
