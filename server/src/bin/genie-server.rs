use clap::Parser;
use genie_core::config::{get_default_config_file, ServiceConfig, ServiceOverrides, ENV_API_KEY};
use genie_core::TurnProcessor;
use genie_server::config::ServerConfig;
use genie_server::http_server;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "genie-server", about = "Guessing-game backend backed by a hosted LLM")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP server address
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Directory with index.html and client assets
    #[arg(short, long)]
    static_dir: Option<PathBuf>,

    /// Disable browser caching of static files
    #[arg(long)]
    dev: bool,

    /// Model identifier sent to the completion service
    #[arg(short = 'o', long)]
    model: Option<String>,

    /// Completion service API key (overrides the environment)
    #[arg(short = 'k', long)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting genie server");

    // Parse command line args
    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => get_default_config_file("genie")?,
    };

    // Load config from file, .env and environment
    let service_config = match ServiceConfig::load(Some(config_path.as_path())) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration from {}: {}", config_path.display(), e);
            return Err(anyhow::anyhow!("Configuration error: {}", e));
        }
    };
    let mut server_config = ServerConfig::load_from_file(&config_path)?;

    // Update config from CLI args
    let service_config = service_config.merge(&ServiceOverrides {
        api_key: args.api_key,
        model: args.model,
        ..ServiceOverrides::default()
    });
    if let Some(bind) = args.bind {
        server_config.bind_addr = bind;
    }
    if let Some(static_dir) = args.static_dir {
        server_config.static_dir = static_dir;
    }
    server_config.dev_mode |= args.dev;

    if !service_config.is_configured() {
        warn!(
            "{} is not set; dialogue endpoints will fail until it is configured",
            ENV_API_KEY
        );
    }
    info!(
        model = %service_config.model,
        base_url = %service_config.base_url,
        max_questions = service_config.policy.max_questions,
        "Completion service configured"
    );

    let processor = match TurnProcessor::from_config(service_config) {
        Ok(processor) => processor,
        Err(e) => {
            error!(error = %e, "Failed to initialize completion client");
            return Err(anyhow::anyhow!("Failed to initialize completion client: {}", e));
        }
    };

    if let Err(e) = http_server::run_server(server_config, processor).await {
        error!(error = %e, "HTTP server failed");
        return Err(e);
    }

    info!("Genie server shutting down");
    Ok(())
}
