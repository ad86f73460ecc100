use anyhow::{Context, Result};
use clap::Parser;
use currency_converter::{config, web, App};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "currency-web",
    about = "Serve the currency converter over HTTP"
)]
struct Args {
    /// Path to config YAML file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Address to listen on; overrides web.listen_addr from the config
    #[arg(short, long, env = "CURRENCY_WEB_LISTEN")]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let cfg = config::Config::load(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    let app = Arc::new(App::from_config(&cfg)?);

    let addr = args.listen.unwrap_or(cfg.web.listen_addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, web::router(app))
        .await
        .context("serving HTTP")?;
    Ok(())
}
