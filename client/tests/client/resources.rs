use std::sync::Arc;
use std::time::Duration;

use client::{Anonymous, ClientError, FetchClient, FilePart, Resources};
use payloads::{ConnectionId, requests, responses};
use reqwest::StatusCode;
use secrecy::SecretString;
use test_helpers::{
    TEST_TOKEN, assert_status_code, connection_details, spawn_app,
};
use uuid::Uuid;

#[tokio::test]
async fn missing_session_skips_the_request() -> anyhow::Result<()> {
    // Nothing listens on port 9, so any request that went out would fail
    // with a network error instead
    let resources = Resources::new(
        FetchClient::new(Duration::from_secs(1))?,
        "http://127.0.0.1:9",
        Arc::new(Anonymous),
    );

    let err = resources
        .get::<responses::UserProfile>("/api/users/me")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NoSession));
    assert!(!err.is_user_visible());

    let err = resources
        .post::<_, responses::Conversation>(
            "/api/conversations",
            &requests::CreateConversation {
                title: "never sent".into(),
                connection_id: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NoSession));
    Ok(())
}

#[tokio::test]
async fn signing_out_stops_requests() -> anyhow::Result<()> {
    let app = spawn_app().await?;
    app.client.user_profile().await?;

    app.session.sign_out();
    let err = app.client.user_profile().await.unwrap_err();
    assert!(matches!(err, ClientError::NoSession));

    app.session.sign_in(SecretString::from(TEST_TOKEN.to_string()));
    app.client.user_profile().await?;
    Ok(())
}

#[tokio::test]
async fn connection_crud() -> anyhow::Result<()> {
    let app = spawn_app().await?;

    let created = app.create_connection("warehouse").await?;
    assert_eq!(created.name, "warehouse");
    assert_eq!(app.client.get_connection(&created.id).await?, created);

    // partial update leaves other fields alone
    let patch = requests::UpdateConnection {
        port: Some(6543),
        ..Default::default()
    };
    let updated = app.client.update_connection(&created.id, &patch).await?;
    assert_eq!(updated.port, 6543);
    assert_eq!(updated.host, created.host);
    assert_eq!(updated.name, created.name);

    let mut details = connection_details("lake");
    details.host = "lake.internal".into();
    let replaced = app.client.replace_connection(&created.id, &details).await?;
    assert_eq!(replaced.name, "lake");
    assert_eq!(replaced.host, "lake.internal");
    assert_eq!(replaced.port, 5432);

    app.client.delete_connection(&created.id).await?;
    assert_status_code(
        app.client.get_connection(&created.id).await,
        StatusCode::NOT_FOUND,
    );
    Ok(())
}

#[tokio::test]
async fn long_connection_name_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await?;

    let details = connection_details(&"X".repeat(300));
    let result = app.client.create_connection(&details).await;

    assert_status_code(result, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn duplicate_connection_name_conflicts() -> anyhow::Result<()> {
    let app = spawn_app().await?;
    app.create_connection("warehouse").await?;

    let err = app
        .client
        .create_connection(&connection_details("warehouse"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::CONFLICT));
    assert_eq!(err.code(), Some("conflict"));
    Ok(())
}

#[tokio::test]
async fn upload_sends_file_and_metadata() -> anyhow::Result<()> {
    let app = spawn_app().await?;
    let connection = app.create_connection("warehouse").await?;

    let contents = b"CREATE TABLE orders (id int);".to_vec();
    let file = FilePart::new("schema.sql", contents.clone())
        .with_mime_type("application/sql");
    let metadata = requests::UploadMetadata {
        connection_id: Some(connection.id),
        description: Some("orders schema".into()),
    };
    let uploaded = app.client.upload_file(file, &metadata).await?;

    assert_eq!(uploaded.file_name, "schema.sql");
    assert_eq!(uploaded.size_bytes, contents.len() as u64);
    assert_eq!(uploaded.connection_id, Some(connection.id));
    assert_eq!(uploaded.description.as_deref(), Some("orders schema"));
    Ok(())
}

#[tokio::test]
async fn upload_for_unknown_connection_fails() -> anyhow::Result<()> {
    let app = spawn_app().await?;

    let metadata = requests::UploadMetadata {
        connection_id: Some(ConnectionId(Uuid::new_v4())),
        description: None,
    };
    let file = FilePart::new("data.csv", b"a,b\n1,2\n".to_vec());
    let result = app.client.upload_file(file, &metadata).await;

    assert_status_code(result, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn delete_with_empty_body_succeeds() -> anyhow::Result<()> {
    let app = spawn_app().await?;
    let created = app
        .client
        .create_api_key(&requests::CreateApiKey {
            name: "ci".into(),
        })
        .await?;
    assert!(created.secret.starts_with(&created.key.prefix));

    app.client.delete_api_key(&created.key.id).await?;
    assert_status_code(
        app.client.delete_api_key(&created.key.id).await,
        StatusCode::NOT_FOUND,
    );
    Ok(())
}
