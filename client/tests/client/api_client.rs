use std::sync::Arc;

use client::{
    ApiClient, CancellationToken, ClientConfig, ClientError, ExecutionContext,
    StaticToken,
};
use payloads::{MessageRole, requests};
use reqwest::StatusCode;
use test_helpers::{TEST_EMAIL, TEST_TOKEN, assert_status_code, spawn_app};

#[tokio::test]
async fn profile_update_is_partial() -> anyhow::Result<()> {
    let app = spawn_app().await?;

    let profile = app.client.user_profile().await?;
    assert_eq!(profile.email, TEST_EMAIL);
    assert_eq!(profile.display_name, None);

    let update = requests::UpdateProfile {
        display_name: Some("Alice".into()),
        organization: None,
    };
    app.client.update_profile(&update).await?;
    let update = requests::UpdateProfile {
        display_name: None,
        organization: Some("Acme".into()),
    };
    let profile = app.client.update_profile(&update).await?;

    assert_eq!(profile.display_name.as_deref(), Some("Alice"));
    assert_eq!(profile.organization.as_deref(), Some("Acme"));
    Ok(())
}

#[tokio::test]
async fn blank_display_name_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await?;

    let update = requests::UpdateProfile {
        display_name: Some("   ".into()),
        organization: None,
    };
    assert_status_code(
        app.client.update_profile(&update).await,
        StatusCode::BAD_REQUEST,
    );
    Ok(())
}

#[tokio::test]
async fn chat_reply_includes_sql() -> anyhow::Result<()> {
    let app = spawn_app().await?;
    let connection = app.create_connection("warehouse").await?;
    let details = requests::CreateConversation {
        title: "Revenue".into(),
        connection_id: Some(connection.id),
    };
    let conversation = app.client.create_conversation(&details).await?;
    assert_eq!(conversation.connection_id, Some(connection.id));

    let message = requests::SendMessage {
        content: "revenue by month".into(),
    };
    let reply = app.client.send_message(&conversation.id, &message).await?;

    assert_eq!(reply.role, MessageRole::Assistant);
    assert_eq!(reply.conversation_id, conversation.id);
    assert!(reply.sql.is_some());
    Ok(())
}

#[tokio::test]
async fn cancelling_the_client_aborts_calls() -> anyhow::Result<()> {
    let app = spawn_app().await?;
    let token = CancellationToken::new();
    let client = app.client.with_cancellation(token.clone());

    token.cancel();
    let err = client.user_profile().await.unwrap_err();
    assert!(matches!(err, ClientError::Cancelled));

    // the unscoped client still works
    app.client.user_profile().await?;
    Ok(())
}

#[tokio::test]
async fn browser_context_uses_public_url() -> anyhow::Result<()> {
    let app = spawn_app().await?;
    let config = ClientConfig::from_lookup(|name| match name {
        // unroutable; only the public url points at the app
        "API_URL" => Some("http://10.255.255.1:1".to_string()),
        "PUBLIC_API_URL" => Some(app.address.clone()),
        _ => None,
    })?;

    let client = ApiClient::new(
        &config,
        ExecutionContext::Browser,
        Arc::new(StaticToken::new(TEST_TOKEN)),
    )?;

    assert_eq!(client.resources().base_url(), app.address);
    client.user_profile().await?;
    Ok(())
}
