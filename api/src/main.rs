use actix_web::web;
use api::{Config, Store, build, telemetry};

/// Development backend
///
/// Environment variables can be set directly or loaded from a .env file in
/// the project root.
///
/// Required environment variables:
/// - PORT: Server port
/// - API_TOKEN: Bearer token accepted for authenticated routes
///
/// Optional:
/// - IP_ADDRESS: Server bind address (defaults to 127.0.0.1)
/// - ALLOWED_ORIGINS: CORS origins ("*" or a comma-separated list)
///
/// Example development command:
/// PORT=8000 API_TOKEN=dev-token cargo run -p api
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if available
    // This will silently ignore if the file doesn't exist
    let _ = dotenvy::dotenv();

    let subscriber = telemetry::get_subscriber("info".into());
    telemetry::init_subscriber(subscriber)?;

    let mut config = Config::from_env()?;
    let store = web::Data::new(Store::new("dev@example.com"));
    let server = build(&mut config, store)?;
    tracing::info!("listening on http://{}:{}", config.ip, config.port);
    server.await?;
    Ok(())
}
