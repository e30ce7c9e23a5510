use std::sync::Arc;

use payloads::{
    ApiKeyId, ConnectionId, ConversationId, HealthStatus, requests,
    responses,
};
use serde::de::IgnoredAny;
use tokio_util::sync::CancellationToken;

use crate::config::{ClientConfig, ExecutionContext};
use crate::credentials::CredentialsProvider;
use crate::error::ClientError;
use crate::fetch::FetchClient;
use crate::pagination::{HttpPageLoader, PagedList};
use crate::resource::{FilePart, Resources};

/// A paginated list backed by a backend endpoint.
pub type ApiList<T> = PagedList<T, HttpPageLoader>;

/// An API client for the admin console and chat backend.
#[derive(Clone)]
pub struct ApiClient {
    resources: Resources,
    default_page_size: u32,
}

impl ApiClient {
    pub fn new(
        config: &ClientConfig,
        context: ExecutionContext,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Result<Self, ClientError> {
        let fetch = FetchClient::new(config.request_timeout)?;
        let resources =
            Resources::new(fetch, config.base_url(context), credentials);
        Ok(Self::from_resources(resources, config.default_page_size))
    }

    pub fn from_resources(resources: Resources, default_page_size: u32) -> Self {
        Self {
            resources,
            default_page_size,
        }
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// A copy whose requests are aborted when `token` is cancelled.
    /// Paginated lists are not affected.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            resources: self.resources.with_cancellation(token),
            default_page_size: self.default_page_size,
        }
    }

    fn list<T>(&self, path: &str, page_size: Option<u32>) -> ApiList<T>
    where
        T: serde::de::DeserializeOwned + Clone + Send + Sync + 'static,
    {
        PagedList::new(
            HttpPageLoader::new(&self.resources, path),
            page_size.unwrap_or(self.default_page_size),
        )
    }
}

/// Methods on the backend API
impl ApiClient {
    /// Liveness probe. Does not need a session.
    pub async fn health_check(&self) -> Result<HealthStatus, ClientError> {
        self.resources.get_public("/api/health_check").await
    }

    pub async fn user_profile(
        &self,
    ) -> Result<responses::UserProfile, ClientError> {
        self.resources.get("/api/users/me").await
    }

    pub async fn update_profile(
        &self,
        details: &requests::UpdateProfile,
    ) -> Result<responses::UserProfile, ClientError> {
        self.resources.patch("/api/users/me", details).await
    }

    pub fn api_keys(&self, page_size: Option<u32>) -> ApiList<responses::ApiKey> {
        self.list("/api/api_keys", page_size)
    }

    /// Create a key. The secret is only ever returned here.
    pub async fn create_api_key(
        &self,
        details: &requests::CreateApiKey,
    ) -> Result<responses::CreatedApiKey, ClientError> {
        self.resources.post("/api/api_keys", details).await
    }

    pub async fn delete_api_key(
        &self,
        api_key_id: &ApiKeyId,
    ) -> Result<(), ClientError> {
        self.resources
            .delete::<IgnoredAny>(&format!("/api/api_keys/{api_key_id}"))
            .await?;
        Ok(())
    }

    pub fn connections(
        &self,
        page_size: Option<u32>,
    ) -> ApiList<responses::DatabaseConnection> {
        self.list("/api/connections", page_size)
    }

    pub async fn get_connection(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<responses::DatabaseConnection, ClientError> {
        self.resources
            .get(&format!("/api/connections/{connection_id}"))
            .await
    }

    pub async fn create_connection(
        &self,
        details: &requests::ConnectionDetails,
    ) -> Result<responses::DatabaseConnection, ClientError> {
        self.resources.post("/api/connections", details).await
    }

    /// Replace every field of a connection.
    pub async fn replace_connection(
        &self,
        connection_id: &ConnectionId,
        details: &requests::ConnectionDetails,
    ) -> Result<responses::DatabaseConnection, ClientError> {
        self.resources
            .put(&format!("/api/connections/{connection_id}"), details)
            .await
    }

    pub async fn update_connection(
        &self,
        connection_id: &ConnectionId,
        details: &requests::UpdateConnection,
    ) -> Result<responses::DatabaseConnection, ClientError> {
        self.resources
            .patch(&format!("/api/connections/{connection_id}"), details)
            .await
    }

    pub async fn delete_connection(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<(), ClientError> {
        self.resources
            .delete::<IgnoredAny>(&format!("/api/connections/{connection_id}"))
            .await?;
        Ok(())
    }

    /// Upload a file (e.g. a schema dump or CSV) with its metadata.
    pub async fn upload_file(
        &self,
        file: FilePart,
        metadata: &requests::UploadMetadata,
    ) -> Result<responses::UploadedFile, ClientError> {
        self.resources.upload("/api/files", file, metadata).await
    }

    pub fn conversations(
        &self,
        page_size: Option<u32>,
    ) -> ApiList<responses::Conversation> {
        self.list("/api/conversations", page_size)
    }

    pub async fn create_conversation(
        &self,
        details: &requests::CreateConversation,
    ) -> Result<responses::Conversation, ClientError> {
        self.resources.post("/api/conversations", details).await
    }

    pub fn messages(
        &self,
        conversation_id: &ConversationId,
        page_size: Option<u32>,
    ) -> ApiList<responses::ChatMessage> {
        self.list(
            &format!("/api/conversations/{conversation_id}/messages"),
            page_size,
        )
    }

    /// Send a user message and get the assistant's reply.
    pub async fn send_message(
        &self,
        conversation_id: &ConversationId,
        details: &requests::SendMessage,
    ) -> Result<responses::ChatMessage, ClientError> {
        self.resources
            .post(
                &format!("/api/conversations/{conversation_id}/messages"),
                details,
            )
            .await
    }
}
