use std::sync::Arc;

use actix_web::web;
use api::{Config, Store, telemetry};
use client::{
    ApiClient, ClientConfig, ClientError, ExecutionContext, SessionCredentials,
};
use payloads::{DatabaseEngine, requests, responses};
use reqwest::StatusCode;
use secrecy::SecretString;
use tracing_log::LogTracer;
use tracing_subscriber::util::SubscriberInitExt;

/// Bearer token accepted by every spawned app.
pub const TEST_TOKEN: &str = "test-token";
pub const TEST_EMAIL: &str = "alice@example.com";

pub struct TestApp {
    #[allow(unused)]
    pub port: u16,
    /// Base url, without a trailing slash.
    pub address: String,
    /// Direct access to the backend's data, for seeding and fault injection.
    pub store: web::Data<Store>,
    /// Client signed in through `session`.
    pub client: ApiClient,
    pub session: SessionCredentials,
}

impl TestApp {
    /// Full url for a path on the backend.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.address)
    }

    /// A client for this app using other credentials.
    pub fn client_with(
        &self,
        credentials: Arc<dyn client::CredentialsProvider>,
    ) -> anyhow::Result<ApiClient> {
        let config = ClientConfig::new(&self.address)?;
        Ok(ApiClient::new(&config, ExecutionContext::Server, credentials)?)
    }

    pub async fn create_connection(
        &self,
        name: &str,
    ) -> anyhow::Result<responses::DatabaseConnection> {
        Ok(self.client.create_connection(&connection_details(name)).await?)
    }

    /// Seed `count` connections named "connection 0", "connection 1", ...
    /// straight into the store.
    pub fn seed_connections(
        &self,
        count: usize,
    ) -> anyhow::Result<Vec<responses::DatabaseConnection>> {
        (0..count)
            .map(|i| {
                let details = connection_details(&format!("connection {i}"));
                Ok(self.store.create_connection(&details)?)
            })
            .collect()
    }

    pub fn seed_api_keys(
        &self,
        count: usize,
    ) -> anyhow::Result<Vec<responses::ApiKey>> {
        (0..count)
            .map(|i| {
                let details = requests::CreateApiKey {
                    name: format!("key {i}"),
                };
                Ok(self.store.create_api_key(&details)?.key)
            })
            .collect()
    }

    pub async fn create_conversation(
        &self,
        title: &str,
    ) -> anyhow::Result<responses::Conversation> {
        let details = requests::CreateConversation {
            title: title.into(),
            connection_id: None,
        };
        Ok(self.client.create_conversation(&details).await?)
    }
}

pub fn connection_details(name: &str) -> requests::ConnectionDetails {
    requests::ConnectionDetails {
        name: name.into(),
        engine: DatabaseEngine::Postgres,
        host: "db.internal".into(),
        port: 5432,
        database: "analytics".into(),
        username: "reader".into(),
        password: Some("hunter2".into()),
    }
}

pub async fn spawn_app_on_port(port: u16) -> anyhow::Result<TestApp> {
    let subscriber = telemetry::get_subscriber("error".into());
    let _ = LogTracer::init();
    let _ = subscriber.try_init();

    let mut config = Config {
        ip: "127.0.0.1".into(),
        port,
        allowed_origins: vec!["*".to_string()],
        api_token: SecretString::from(TEST_TOKEN.to_string()),
    };
    let store = web::Data::new(Store::new(TEST_EMAIL));
    let server = api::build(&mut config, store.clone())?;
    tokio::spawn(server);

    let address = format!("http://127.0.0.1:{}", config.port);
    let session = SessionCredentials::new();
    session.sign_in(SecretString::from(TEST_TOKEN.to_string()));
    let client_config = ClientConfig::new(&address)?;
    let client = ApiClient::new(
        &client_config,
        ExecutionContext::Server,
        Arc::new(session.clone()),
    )?;

    Ok(TestApp {
        port: config.port,
        address,
        store,
        client,
        session,
    })
}

/// Use OS-assigned port for parallel testing.
pub async fn spawn_app() -> anyhow::Result<TestApp> {
    spawn_app_on_port(0).await
}

/// Assert that the result of an API action results in a specific status code.
pub fn assert_status_code<T: std::fmt::Debug>(
    result: Result<T, ClientError>,
    expected: StatusCode,
) {
    match result {
        Err(e) => assert_eq!(e.status(), Some(expected), "unexpected {e:?}"),
        Ok(value) => panic!("Expected {expected}, got {value:?}"),
    };
}
