use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use client::{
    CancellationToken, ClientError, FetchClient, FetchRequest, StaticToken,
};
use payloads::{ConnectionId, HealthStatus};
use reqwest::{Method, StatusCode};
use secrecy::SecretString;
use test_helpers::{TEST_TOKEN, spawn_app};
use uuid::Uuid;

fn fetch_client() -> anyhow::Result<FetchClient> {
    Ok(FetchClient::new(Duration::from_secs(5))?)
}

#[tokio::test]
async fn not_found_carries_backend_error_code() -> anyhow::Result<()> {
    let app = spawn_app().await?;

    let missing = ConnectionId(Uuid::new_v4());
    let err = app.client.get_connection(&missing).await.unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(err.code(), Some("not_found"));
    assert_eq!(err.to_string(), "Connection not found");
    Ok(())
}

#[tokio::test]
async fn html_error_page_gets_generic_message() -> anyhow::Result<()> {
    let app = spawn_app().await?;

    let request = FetchRequest::new(
        Method::GET,
        app.url("/api/faults/status/502?html=true"),
    );
    let err = fetch_client()?
        .fetch::<HealthStatus>(request)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
    assert_eq!(err.code(), None);
    assert_eq!(err.to_string(), client::error::GENERIC_ERROR_MESSAGE);
    Ok(())
}

#[tokio::test]
async fn malformed_success_body_is_a_decode_error() -> anyhow::Result<()> {
    let app = spawn_app().await?;

    let request =
        FetchRequest::new(Method::GET, app.url("/api/faults/malformed"));
    let err = fetch_client()?
        .fetch::<HealthStatus>(request)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Decode(_)), "got {err:?}");
    assert_eq!(err.status(), None);
    Ok(())
}

#[tokio::test]
async fn cancelled_request_reports_cancellation() -> anyhow::Result<()> {
    let app = spawn_app().await?;
    let token = CancellationToken::new();

    let request =
        FetchRequest::new(Method::GET, app.url("/api/faults/delay/5000"))
            .cancel_on(token.clone());
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });
    let err = fetch_client()?
        .fetch::<HealthStatus>(request)
        .await
        .unwrap_err();
    canceller.await?;

    assert!(err.is_cancelled());
    assert!(!err.is_user_visible());
    Ok(())
}

#[tokio::test]
async fn already_cancelled_token_sends_nothing() -> anyhow::Result<()> {
    let token = CancellationToken::new();
    token.cancel();

    // nothing listens here, so a sent request would be a network error
    let request = FetchRequest::new(Method::GET, closed_port_url()?)
        .cancel_on(token);
    let err = fetch_client()?
        .fetch::<HealthStatus>(request)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    Ok(())
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() -> anyhow::Result<()> {
    let request = FetchRequest::new(Method::GET, closed_port_url()?);
    let err = fetch_client()?
        .fetch::<HealthStatus>(request)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Network(_)), "got {err:?}");
    assert!(err.is_user_visible());
    Ok(())
}

#[tokio::test]
async fn wrong_token_is_unauthorized() -> anyhow::Result<()> {
    let app = spawn_app().await?;
    let client = app.client_with(Arc::new(StaticToken::new("not-the-token")))?;

    let err = client.user_profile().await.unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    assert_eq!(err.code(), Some("unauthorized"));
    Ok(())
}

#[tokio::test]
async fn bearer_token_is_sent() -> anyhow::Result<()> {
    let app = spawn_app().await?;

    let request = FetchRequest::new(Method::GET, app.url("/api/users/me"))
        .bearer(Some(SecretString::from(TEST_TOKEN.to_string())));
    let profile: payloads::responses::UserProfile =
        fetch_client()?.fetch(request).await?;

    assert_eq!(profile.email, test_helpers::TEST_EMAIL);
    Ok(())
}

/// A url on a port that was free a moment ago.
fn closed_port_url() -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(format!("http://127.0.0.1:{port}/api/health_check"))
}
