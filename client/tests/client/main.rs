mod api_client;
mod fetch;
mod pagination;
mod resources;

use test_helpers::spawn_app;

#[tokio::test]
async fn health_check() -> anyhow::Result<()> {
    let app = spawn_app().await?;

    let status = app.client.health_check().await?;
    assert!(status.is_ok());

    Ok(())
}
