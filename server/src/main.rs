mod handlers;
mod routes;
mod state;


use std::env;

use axum::http::{header, HeaderValue, Method};
use listing_captions::ai::CaptionGenerator;
use listing_captions::scraper::Scraper;
use listing_captions::AiConfig;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use state::AppState;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_JOB_TTL_SECS: i64 = 3600;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let generator = match AiConfig::from_env() {
        Ok(config) => Some(CaptionGenerator::from_config(config)),
        Err(e) => {
            warn!(error = %e, "caption generation disabled");
            None
        }
    };

    let state = AppState::new(Scraper::with_defaults()?, generator);
    spawn_job_sweeper(state.clone());
    let mut app = routes::app(state).layer(TraceLayer::new_for_http());

    if let Ok(client_url) = env::var("CLIENT_URL") {
        let cors = CorsLayer::new()
            .allow_origin(client_url.parse::<HeaderValue>()?)
            .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]);
        app = app.layer(cors);
    }

    let addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Periodically removes finished jobs older than `JOB_TTL_SECS` (default one hour).
fn spawn_job_sweeper(state: AppState) {
    let ttl_secs = env::var("JOB_TTL_SECS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_JOB_TTL_SECS);
    let ttl = chrono::Duration::seconds(ttl_secs);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            ticker.tick().await;
            let evicted = state.evict_finished(ttl);
            if evicted > 0 {
                info!(evicted, remaining = state.jobs.len(), "expired jobs removed");
            }
        }
    });
}
