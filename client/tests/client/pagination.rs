use client::{MutateOptions, MutationOutcome};
use payloads::{ConnectionId, PageQuery, requests};
use reqwest::StatusCode;
use test_helpers::{TEST_TOKEN, connection_details, spawn_app};
use uuid::Uuid;

#[tokio::test]
async fn thirteen_items_load_in_two_pages() -> anyhow::Result<()> {
    let app = spawn_app().await?;
    app.seed_connections(13)?;
    let list = app.client.connections(None);
    assert_eq!(list.page_size(), 10);

    list.load().await?;
    let snapshot = list.snapshot();
    assert_eq!(snapshot.items.map(|i| i.len()), Some(10));
    assert!(!snapshot.is_reaching_end);
    assert!(!snapshot.is_loading_more);

    list.load_more().await?;
    let snapshot = list.snapshot();
    let names: Vec<_> = snapshot
        .items
        .unwrap_or_default()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names.len(), 13);
    assert_eq!(names[0], "connection 0");
    assert_eq!(names[12], "connection 12");
    assert_eq!(snapshot.pages.len(), 2);
    assert!(snapshot.is_reaching_end);
    assert!(snapshot.error.is_none());

    // the end is permanent: asking for more does not grow the list
    list.load_more().await?;
    assert_eq!(list.snapshot().size, 2);
    Ok(())
}

#[tokio::test]
async fn empty_page_after_full_page_reaches_end() -> anyhow::Result<()> {
    let app = spawn_app().await?;
    app.seed_api_keys(4)?;
    let list = app.client.api_keys(Some(2));

    list.set_size(3).await?;

    let snapshot = list.snapshot();
    assert_eq!(snapshot.items.map(|i| i.len()), Some(4));
    assert!(snapshot.is_reaching_end);
    Ok(())
}

#[tokio::test]
async fn empty_list_reaches_end_immediately() -> anyhow::Result<()> {
    let app = spawn_app().await?;
    let list = app.client.conversations(None);

    list.load().await?;

    let snapshot = list.snapshot();
    assert_eq!(snapshot.items, Some(Vec::new()));
    assert!(snapshot.is_reaching_end);
    Ok(())
}

#[tokio::test]
async fn failed_page_keeps_earlier_pages() -> anyhow::Result<()> {
    let app = spawn_app().await?;
    app.seed_connections(13)?;
    let list = app.client.connections(None);
    list.load().await?;

    app.store.fail_next_list_requests(1);
    let err = list.load_more().await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(err.code(), Some("internal"));

    let snapshot = list.snapshot();
    assert_eq!(snapshot.items.map(|i| i.len()), Some(10));
    assert!(snapshot.error.is_some());
    assert!(!snapshot.is_reaching_end);

    // loading again retries the failed page and clears the error
    list.load().await?;
    let snapshot = list.snapshot();
    assert_eq!(snapshot.items.map(|i| i.len()), Some(13));
    assert!(snapshot.error.is_none());
    Ok(())
}

#[tokio::test]
async fn signed_out_list_fetches_nothing() -> anyhow::Result<()> {
    let app = spawn_app().await?;
    app.seed_connections(3)?;
    app.session.sign_out();
    let list = app.client.connections(None);

    list.load().await?;
    let snapshot = list.snapshot();
    assert!(snapshot.items.is_none());
    assert!(snapshot.error.is_none());
    assert!(!snapshot.is_validating);

    app.session.sign_in(TEST_TOKEN.to_string().into());
    list.load().await?;
    assert_eq!(list.snapshot().items.map(|i| i.len()), Some(3));
    Ok(())
}

#[tokio::test]
async fn revalidate_picks_up_server_changes() -> anyhow::Result<()> {
    let app = spawn_app().await?;
    app.seed_connections(2)?;
    let list = app.client.connections(None);
    let updates = list.subscribe();
    list.load().await?;
    assert_eq!(updates.borrow().items.as_ref().map(Vec::len), Some(2));

    app.create_connection("added elsewhere").await?;
    list.revalidate().await?;

    let items = list.snapshot().items.unwrap_or_default();
    assert_eq!(items.len(), 3);
    assert_eq!(items[2].name, "added elsewhere");
    assert_eq!(updates.borrow().items.as_ref().map(Vec::len), Some(3));
    Ok(())
}

#[tokio::test]
async fn optimistic_create_is_visible_then_committed() -> anyhow::Result<()> {
    let app = spawn_app().await?;
    let existing = app.seed_connections(3)?;
    let list = app.client.connections(None);
    list.load().await?;

    let mut placeholder = existing[0].clone();
    placeholder.id = ConnectionId(Uuid::new_v4());
    placeholder.name = "warehouse".into();
    let mut optimistic = existing.clone();
    optimistic.push(placeholder.clone());

    let client = app.client.clone();
    let details = connection_details("warehouse");
    let mutation = list.mutate_with(
        Some(vec![optimistic]),
        async move { client.create_connection(&details).await },
        MutateOptions::default(),
    );
    // applied before the mutation is polled
    let items = list.snapshot().items.unwrap_or_default();
    assert_eq!(items.last(), Some(&placeholder));

    assert_eq!(mutation.await?, MutationOutcome::Committed);
    let items = list.snapshot().items.unwrap_or_default();
    assert_eq!(items.len(), 4);
    assert_eq!(items[3].name, "warehouse");
    assert_ne!(items[3].id, placeholder.id);
    Ok(())
}

#[tokio::test]
async fn rejected_create_rolls_back() -> anyhow::Result<()> {
    let app = spawn_app().await?;
    let existing = app.seed_connections(3)?;
    let list = app.client.connections(None);
    list.load().await?;

    let mut duplicate = existing[0].clone();
    duplicate.id = ConnectionId(Uuid::new_v4());
    let mut optimistic = existing.clone();
    optimistic.push(duplicate);

    let client = app.client.clone();
    let details = connection_details(&existing[0].name);
    let err = list
        .mutate_with(
            Some(vec![optimistic]),
            async move { client.create_connection(&details).await },
            MutateOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(err.rolled_back);
    assert_eq!(err.source.code(), Some("conflict"));
    assert_eq!(list.snapshot().items, Some(existing));
    Ok(())
}

#[tokio::test]
async fn optimistic_delete_without_revalidation() -> anyhow::Result<()> {
    let app = spawn_app().await?;
    let existing = app.seed_connections(2)?;
    let list = app.client.connections(None);
    list.load().await?;

    let remaining = vec![existing[1].clone()];
    let options = MutateOptions {
        revalidate: false,
        ..Default::default()
    };
    let outcome = list.mutate(Some(vec![remaining.clone()]), options).await?;

    assert_eq!(outcome, MutationOutcome::NoOp);
    assert_eq!(list.snapshot().items, Some(remaining));
    // the server still has both
    let query = PageQuery {
        page: 0,
        page_size: 10,
    };
    assert_eq!(app.store.list_connections(&query).len(), 2);
    Ok(())
}

#[tokio::test]
async fn conversation_messages_page_in_order() -> anyhow::Result<()> {
    let app = spawn_app().await?;
    let conversation = app.create_conversation("Revenue").await?;
    for question in ["by month", "by region", "by product"] {
        let message = requests::SendMessage {
            content: question.into(),
        };
        app.client.send_message(&conversation.id, &message).await?;
    }

    let list = app.client.messages(&conversation.id, Some(4));
    list.set_size(2).await?;

    let snapshot = list.snapshot();
    let contents: Vec<_> = snapshot
        .items
        .unwrap_or_default()
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(contents.len(), 6);
    assert_eq!(contents[0], "by month");
    assert!(snapshot.is_reaching_end);
    Ok(())
}
