//! Development server for frontend work against the data layer.
//!
//! Starts the in-memory backend on a fixed port, seeds it with enough data
//! to page through every list, and prints the values to put in the
//! frontend's environment.
//!
//! Usage: cargo run -p dev-server

use anyhow::Result;
use payloads::requests;
use test_helpers::{TEST_TOKEN, TestApp};
use tracing::info;

const DEFAULT_PORT: u16 = 8000;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let subscriber = api::telemetry::get_subscriber("info".into());
    api::telemetry::init_subscriber(subscriber)?;

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    info!("🚀 Starting development server");
    let app = test_helpers::spawn_app_on_port(port).await?;

    info!("📊 Seeding development data...");
    seed(&app).await?;

    info!("🎯 Development server ready!");
    info!("   API_URL=http://127.0.0.1:{}", app.port);
    info!("   PUBLIC_API_URL=http://127.0.0.1:{}", app.port);
    info!("   Bearer token: {TEST_TOKEN}");
    info!("👋 Press Ctrl+C to shutdown");

    tokio::signal::ctrl_c().await?;
    info!("🛑 Shutting down development server");
    Ok(())
}

async fn seed(app: &TestApp) -> Result<()> {
    // 23 connections gives two full pages and a short third at the default
    // page size
    let connections = app.seed_connections(23)?;
    app.seed_api_keys(4)?;

    for title in ["Monthly revenue", "Churn by cohort", "Top customers"] {
        let details = requests::CreateConversation {
            title: title.into(),
            connection_id: connections.first().map(|c| c.id),
        };
        let conversation = app.client.create_conversation(&details).await?;
        let question = requests::SendMessage {
            content: title.to_lowercase(),
        };
        app.client.send_message(&conversation.id, &question).await?;
    }
    info!(
        "   {} connections, 4 api keys, 3 conversations",
        connections.len()
    );
    Ok(())
}
