//! Harvest Assist - food-donation chat assistant API
//!
//! Hosts the rule-based assistant behind the donation app's chat screen. Each
//! mounted session owns an ordered message log, answers user messages after a
//! short simulated latency, and records like/dislike feedback.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod conversation;
mod core;
mod routes;

use crate::config::Config;
use crate::core::SessionRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "harvest_assist=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let rules = config.load_rule_book()?;
    match &config.rules_path {
        Some(path) => tracing::info!("📖 Loaded {} rule(s) from {}", rules.rules.len(), path.display()),
        None => tracing::info!("📖 Using {} built-in rule(s)", rules.rules.len()),
    }

    let registry = SessionRegistry::new(Arc::new(rules), config.reply_latency());
    let state = AppState {
        registry: Arc::new(registry),
    };

    let app = Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!(
        latency_ms = config.reply_latency_ms,
        "🥫 Harvest Assist running at http://{}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
