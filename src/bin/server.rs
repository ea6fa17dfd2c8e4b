//! Answering server binary
//!
//! Run with: cargo run --bin ragserve-server

use ragserve::{config::RagConfig, server::RagServer};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ragserve=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                        ragserve                           ║
║      Documentation Q&A with Per-Answer Feedback           ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    let config_path = Path::new("ragserve.toml");
    let mut config = if config_path.exists() {
        tracing::info!("Loading configuration from {}", config_path.display());
        RagConfig::from_file(config_path)?
    } else {
        RagConfig::default()
    };
    config.apply_env();

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding model: {}", config.provider.embed_model);
    tracing::info!("  - Embedding dimensions: {}", config.provider.dimensions);
    tracing::info!("  - Completion model: {}", config.provider.completion_model);
    tracing::info!("  - Index collection: {}", config.index.collection);
    tracing::info!("  - Feedback database: {}", config.feedback.db_path.display());

    if config.provider.api_key.is_none() {
        tracing::warn!("No provider API key configured (set RAGSERVE_API_KEY)");
    }

    // Reachability checks are advisory; the server starts regardless and
    // requests fail with retryable errors until the backends come up.
    let client = reqwest::Client::new();
    match client
        .get(format!("{}/collections", config.index.base_url))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            tracing::info!("Vector index reachable at {}", config.index.base_url);
        }
        _ => {
            tracing::warn!("Vector index not reachable at {}", config.index.base_url);
        }
    }

    let server = RagServer::new(config)?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/answer           - Ask a question");
    println!("  POST /api/vote             - Vote on an answer");
    println!("  GET  /api/votes/:answer_id - Vote summary");
    println!("  GET  /api/votes/stats      - Vote statistics");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
