use axum::{
    Router,
    routing::get,
};
use clap::Parser; // for cli
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use resource_gateway::config::Args;
use resource_gateway::handlers::{
    get_resource_handler, health_handler, metrics_handler, put_resource_handler,
};
use resource_gateway::state::AppState;
use resource_gateway::{ApiService, Cache, HttpStore, JsonStore, MemoryStore, RateLimiter, SystemClock};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // parse cli arguments
    let args = Args::parse();

    let limiter = RateLimiter::new(&args.throttle_settings(), Arc::new(SystemClock))?;

    let store: JsonStore = match &args.store_url {
        Some(url) => {
            let store = HttpStore::new(url, args.store_timeout())?;
            info!(store = store.base_url(), "using remote resource store");
            Box::new(store)
        }
        None => {
            info!("no store url given, keeping resources in memory");
            Box::new(MemoryStore::<serde_json::Value>::new())
        }
    };

    // creating shared state
    let state = Arc::new(AppState {
        service: ApiService::new(Cache::new(store), Some(limiter)),
    });

    // creating the router with routes
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(
            "/resources/{id}",
            get(get_resource_handler).put(put_resource_handler),
        )
        .with_state(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        port = args.port,
        rate_limit = args.rate_limit,
        rate_window_secs = args.rate_window,
        ban_timeout_secs = args.ban_timeout,
        "gateway running"
    );
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
