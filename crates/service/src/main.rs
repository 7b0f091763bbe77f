use anyhow::{Context, Result};
use clap::Parser;
use genie_agent::GenieService;
use genie_agent::config::load_config;
use genie_service::{ServerState, router};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "genie.toml")]
    config: PathBuf,
    /// Address to bind the service to; overrides the config file and PORT
    #[arg(long)]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("genie_service=info,genie_agent=info,tower_http=info")
    });
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let args = Args::parse();
    let config = load_config(&args.config).await?;
    let addr = args
        .addr
        .or_else(|| {
            std::env::var("PORT")
                .ok()
                .map(|port| format!("0.0.0.0:{}", port))
        })
        .unwrap_or_else(|| config.server.addr.clone());

    info!(
        addr = %addr,
        config = %args.config.display(),
        graph = %config.graph.base_url,
        model = %config.llm.model,
        "starting service"
    );

    let service = GenieService::from_config(&config)?;
    let app = router(ServerState {
        service: Arc::new(service),
    });

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
