//! In-memory stand-in for the console backend.
//!
//! Serves the REST contract the client consumes (bearer auth, plain-array
//! pagination, JSON error bodies, multipart uploads) without a database, for
//! local frontend work and the client's integration tests.

pub mod routes;
pub mod store;
pub mod telemetry;

use actix_cors::Cors;
use actix_web::dev::Server;
use actix_web::{App, HttpServer, web};
use anyhow::Context;
use secrecy::{ExposeSecret, SecretString};
use std::net::TcpListener;

pub use store::Store;

/// The bearer token the backend accepts.
pub struct ApiToken(pub SecretString);

/// Build the server, but not await it.
///
/// Returns the port that the server has bound to by modifying the config.
pub fn build(
    config: &mut Config,
    store: web::Data<Store>,
) -> std::io::Result<Server> {
    let token = web::Data::new(ApiToken(SecretString::from(
        config.api_token.expose_secret().to_owned(),
    )));
    let allowed_origins = config.allowed_origins.clone();

    // OS assigns the port if binding to 0
    let listener = TcpListener::bind(format!("{}:{}", config.ip, config.port))?;
    config.port = listener.local_addr()?.port();
    let server = HttpServer::new(move || {
        let cors = if allowed_origins.iter().any(|o| o == "*") {
            Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
        } else {
            let mut cors = Cors::default().allow_any_method().allow_any_header();
            for origin in &allowed_origins {
                cors = cors.allowed_origin(origin);
            }
            cors
        };

        App::new()
            .wrap(cors)
            .app_data(routes::json_config())
            .app_data(routes::query_config())
            .app_data(routes::path_config())
            .service(routes::api_services())
            .default_service(web::to(routes::not_found))
            .app_data(store.clone())
            .app_data(token.clone())
    })
    .listen(listener)?
    .run();
    Ok(server)
}

pub struct Config {
    /// set to "0.0.0.0" for public access, "127.0.0.1" for local dev
    pub ip: String,
    /// set to 0 to get an os-assigned port
    pub port: u16,
    /// List of allowed CORS origins. Use "*" to allow any origin (development only)
    pub allowed_origins: Vec<String>,
    pub api_token: SecretString,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        use std::env::var;

        let allowed_origins = var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Config {
            ip: var("IP_ADDRESS").unwrap_or_else(|_| "127.0.0.1".into()),
            port: var("PORT")
                .context("PORT must be set")?
                .parse()
                .context("PORT must be a port number")?,
            allowed_origins,
            api_token: SecretString::from(
                var("API_TOKEN").context("API_TOKEN must be set")?,
            ),
        })
    }
}
