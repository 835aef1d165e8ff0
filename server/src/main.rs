use anyhow::Result;
use axum::Router;
use clap::Parser;
use fieldnote_core::{ExecutionMode, SearchConfig};
use server::{build_app, open_engine};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// sled store directory; in-memory when omitted
    #[arg(long, env = "FIELDNOTE_STORE")]
    store: Option<String>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Minimum similarity for typo-tolerant matches (0.0-1.0)
    #[arg(long, default_value_t = 0.8)]
    fuzzy_threshold: f64,
    /// Result cap per query (1-1000)
    #[arg(long, default_value_t = 100)]
    max_results: usize,
    /// sync, worker or auto
    #[arg(long, default_value = "sync")]
    execution: ExecutionMode,
    /// Token required by the write endpoints
    #[arg(long, env = "ADMIN_TOKEN")]
    admin_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let mut config = SearchConfig { execution: args.execution, ..Default::default() };
    config.set_fuzzy_threshold(args.fuzzy_threshold)?;
    config.set_max_results(args.max_results)?;
    let engine = Arc::new(open_engine(args.store.as_deref(), config)?);
    let app: Router = build_app(engine, args.admin_token);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
