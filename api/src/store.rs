//! In-memory data store.
//!
//! Collections keep insertion order so that pages are stable between
//! requests. A fault plan lets tests make list requests fail or lag.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use jiff::Timestamp;
use payloads::{
    ApiKeyId, ConnectionId, ConversationId, FileId, MessageId, MessageRole,
    PageQuery, UserId, requests, responses,
};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Api key not found")]
    ApiKeyNotFound,
    #[error("Connection not found")]
    ConnectionNotFound,
    #[error("Conversation not found")]
    ConversationNotFound,
    #[error("{0}")]
    Invalid(&'static str),
    #[error("Connection name already in use")]
    DuplicateConnectionName,
    #[error("Injected failure")]
    InjectedFailure,
}

/// Scripted misbehaviour for list endpoints.
#[derive(Debug, Default)]
struct FaultPlan {
    /// Number of upcoming list requests to fail with a 500.
    failing_list_requests: u32,
    /// Added latency before every list response.
    list_delay: Duration,
}

struct StoredConnection {
    connection: responses::DatabaseConnection,
    #[allow(dead_code)] // write-only, kept to mirror the real backend
    password: Option<String>,
}

struct Data {
    profile: responses::UserProfile,
    api_keys: Vec<responses::ApiKey>,
    connections: Vec<StoredConnection>,
    files: Vec<responses::UploadedFile>,
    conversations: Vec<responses::Conversation>,
    messages: HashMap<ConversationId, Vec<responses::ChatMessage>>,
}

pub struct Store {
    data: Mutex<Data>,
    faults: Mutex<FaultPlan>,
}

fn page_of<T: Clone>(items: &[T], query: &PageQuery) -> Vec<T> {
    items
        .iter()
        .skip(query.offset())
        .take(query.page_size as usize)
        .cloned()
        .collect()
}

fn check_name(name: &str) -> Result<(), StoreError> {
    requests::validate_name(name).map_err(StoreError::Invalid)
}

impl Store {
    pub fn new(email: &str) -> Self {
        Self {
            data: Mutex::new(Data {
                profile: responses::UserProfile {
                    id: UserId(Uuid::new_v4()),
                    email: email.to_string(),
                    display_name: None,
                    organization: None,
                },
                api_keys: Vec::new(),
                connections: Vec::new(),
                files: Vec::new(),
                conversations: Vec::new(),
                messages: HashMap::new(),
            }),
            faults: Mutex::new(FaultPlan::default()),
        }
    }

    fn data(&self) -> MutexGuard<'_, Data> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn faults(&self) -> MutexGuard<'_, FaultPlan> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `count` list requests fail.
    pub fn fail_next_list_requests(&self, count: u32) {
        self.faults().failing_list_requests = count;
    }

    pub fn set_list_delay(&self, delay: Duration) {
        self.faults().list_delay = delay;
    }

    /// Consume one scheduled list failure, if any, and report the delay to
    /// apply before answering.
    pub fn list_fault(&self) -> Result<Duration, StoreError> {
        let mut faults = self.faults();
        if faults.failing_list_requests > 0 {
            faults.failing_list_requests -= 1;
            return Err(StoreError::InjectedFailure);
        }
        Ok(faults.list_delay)
    }

    pub fn profile(&self) -> responses::UserProfile {
        self.data().profile.clone()
    }

    pub fn update_profile(
        &self,
        details: &requests::UpdateProfile,
    ) -> Result<responses::UserProfile, StoreError> {
        let mut data = self.data();
        if let Some(name) = &details.display_name {
            check_name(name)?;
            data.profile.display_name = Some(name.clone());
        }
        if let Some(organization) = &details.organization {
            data.profile.organization = Some(organization.clone());
        }
        Ok(data.profile.clone())
    }

    pub fn list_api_keys(&self, query: &PageQuery) -> Vec<responses::ApiKey> {
        page_of(&self.data().api_keys, query)
    }

    pub fn create_api_key(
        &self,
        details: &requests::CreateApiKey,
    ) -> Result<responses::CreatedApiKey, StoreError> {
        check_name(&details.name)?;
        let secret = format!("sk_{}", Uuid::new_v4().simple());
        let key = responses::ApiKey {
            id: ApiKeyId(Uuid::new_v4()),
            name: details.name.clone(),
            prefix: secret[..7].to_string(),
            created_at: Timestamp::now(),
        };
        self.data().api_keys.push(key.clone());
        Ok(responses::CreatedApiKey { key, secret })
    }

    pub fn delete_api_key(&self, id: &ApiKeyId) -> Result<(), StoreError> {
        let mut data = self.data();
        let before = data.api_keys.len();
        data.api_keys.retain(|k| k.id != *id);
        if data.api_keys.len() == before {
            return Err(StoreError::ApiKeyNotFound);
        }
        Ok(())
    }

    pub fn list_connections(
        &self,
        query: &PageQuery,
    ) -> Vec<responses::DatabaseConnection> {
        let data = self.data();
        let all: Vec<_> =
            data.connections.iter().map(|c| c.connection.clone()).collect();
        page_of(&all, query)
    }

    pub fn get_connection(
        &self,
        id: &ConnectionId,
    ) -> Result<responses::DatabaseConnection, StoreError> {
        self.data()
            .connections
            .iter()
            .find(|c| c.connection.id == *id)
            .map(|c| c.connection.clone())
            .ok_or(StoreError::ConnectionNotFound)
    }

    pub fn create_connection(
        &self,
        details: &requests::ConnectionDetails,
    ) -> Result<responses::DatabaseConnection, StoreError> {
        check_name(&details.name)?;
        let mut data = self.data();
        if data
            .connections
            .iter()
            .any(|c| c.connection.name == details.name)
        {
            return Err(StoreError::DuplicateConnectionName);
        }
        let now = Timestamp::now();
        let connection = responses::DatabaseConnection {
            id: ConnectionId(Uuid::new_v4()),
            name: details.name.clone(),
            engine: details.engine,
            host: details.host.clone(),
            port: details.port,
            database: details.database.clone(),
            username: details.username.clone(),
            created_at: now,
            updated_at: now,
        };
        data.connections.push(StoredConnection {
            connection: connection.clone(),
            password: details.password.clone(),
        });
        Ok(connection)
    }

    pub fn replace_connection(
        &self,
        id: &ConnectionId,
        details: &requests::ConnectionDetails,
    ) -> Result<responses::DatabaseConnection, StoreError> {
        check_name(&details.name)?;
        let mut data = self.data();
        let stored = data
            .connections
            .iter_mut()
            .find(|c| c.connection.id == *id)
            .ok_or(StoreError::ConnectionNotFound)?;
        let connection = &mut stored.connection;
        connection.name = details.name.clone();
        connection.engine = details.engine;
        connection.host = details.host.clone();
        connection.port = details.port;
        connection.database = details.database.clone();
        connection.username = details.username.clone();
        connection.updated_at = Timestamp::now();
        let updated = connection.clone();
        stored.password = details.password.clone();
        Ok(updated)
    }

    pub fn update_connection(
        &self,
        id: &ConnectionId,
        details: &requests::UpdateConnection,
    ) -> Result<responses::DatabaseConnection, StoreError> {
        if let Some(name) = &details.name {
            check_name(name)?;
        }
        let mut data = self.data();
        let stored = data
            .connections
            .iter_mut()
            .find(|c| c.connection.id == *id)
            .ok_or(StoreError::ConnectionNotFound)?;
        let connection = &mut stored.connection;
        if let Some(name) = &details.name {
            connection.name = name.clone();
        }
        if let Some(host) = &details.host {
            connection.host = host.clone();
        }
        if let Some(port) = details.port {
            connection.port = port;
        }
        if let Some(database) = &details.database {
            connection.database = database.clone();
        }
        if let Some(username) = &details.username {
            connection.username = username.clone();
        }
        connection.updated_at = Timestamp::now();
        let updated = connection.clone();
        if details.password.is_some() {
            stored.password = details.password.clone();
        }
        Ok(updated)
    }

    pub fn delete_connection(&self, id: &ConnectionId) -> Result<(), StoreError> {
        let mut data = self.data();
        let before = data.connections.len();
        data.connections.retain(|c| c.connection.id != *id);
        if data.connections.len() == before {
            return Err(StoreError::ConnectionNotFound);
        }
        Ok(())
    }

    pub fn add_file(
        &self,
        file_name: String,
        size_bytes: u64,
        metadata: requests::UploadMetadata,
    ) -> Result<responses::UploadedFile, StoreError> {
        if let Some(id) = &metadata.connection_id {
            self.get_connection(id)?;
        }
        let file = responses::UploadedFile {
            id: FileId(Uuid::new_v4()),
            file_name,
            size_bytes,
            connection_id: metadata.connection_id,
            description: metadata.description,
        };
        self.data().files.push(file.clone());
        Ok(file)
    }

    pub fn list_conversations(
        &self,
        query: &PageQuery,
    ) -> Vec<responses::Conversation> {
        page_of(&self.data().conversations, query)
    }

    pub fn create_conversation(
        &self,
        details: &requests::CreateConversation,
    ) -> Result<responses::Conversation, StoreError> {
        check_name(&details.title)?;
        if let Some(id) = &details.connection_id {
            self.get_connection(id)?;
        }
        let conversation = responses::Conversation {
            id: ConversationId(Uuid::new_v4()),
            title: details.title.clone(),
            connection_id: details.connection_id,
            created_at: Timestamp::now(),
        };
        let mut data = self.data();
        data.messages.insert(conversation.id, Vec::new());
        data.conversations.push(conversation.clone());
        Ok(conversation)
    }

    pub fn list_messages(
        &self,
        id: &ConversationId,
        query: &PageQuery,
    ) -> Result<Vec<responses::ChatMessage>, StoreError> {
        self.data()
            .messages
            .get(id)
            .map(|messages| page_of(messages, query))
            .ok_or(StoreError::ConversationNotFound)
    }

    /// Record a user message and a canned assistant reply, returning the
    /// reply. Query generation belongs to the real backend.
    pub fn send_message(
        &self,
        id: &ConversationId,
        details: &requests::SendMessage,
    ) -> Result<responses::ChatMessage, StoreError> {
        if details.content.trim().is_empty() {
            return Err(StoreError::Invalid("Message must not be empty"));
        }
        let mut data = self.data();
        let messages = data
            .messages
            .get_mut(id)
            .ok_or(StoreError::ConversationNotFound)?;
        let message = |role, content: String, sql| responses::ChatMessage {
            id: MessageId(Uuid::new_v4()),
            conversation_id: *id,
            role,
            content,
            sql,
            created_at: Timestamp::now(),
        };
        messages.push(message(MessageRole::User, details.content.clone(), None));
        let reply = message(
            MessageRole::Assistant,
            format!("Here is a query for: {}", details.content),
            Some(format!("-- {}\nSELECT 1;", details.content)),
        );
        messages.push(reply.clone());
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payloads::DatabaseEngine;

    fn connection(name: &str) -> requests::ConnectionDetails {
        requests::ConnectionDetails {
            name: name.into(),
            engine: DatabaseEngine::Postgres,
            host: "localhost".into(),
            port: 5432,
            database: "analytics".into(),
            username: "reader".into(),
            password: Some("secret".into()),
        }
    }

    #[test]
    fn pages_follow_insertion_order() {
        let store = Store::new("test@example.com");
        for i in 0..5 {
            store
                .create_api_key(&requests::CreateApiKey {
                    name: format!("key {i}"),
                })
                .unwrap();
        }
        let page = store.list_api_keys(&PageQuery {
            page: 1,
            page_size: 2,
        });
        let names: Vec<_> = page.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, ["key 2", "key 3"]);
        let past_end = store.list_api_keys(&PageQuery {
            page: 3,
            page_size: 2,
        });
        assert!(past_end.is_empty());
    }

    #[test]
    fn duplicate_connection_names_are_rejected() {
        let store = Store::new("test@example.com");
        store.create_connection(&connection("warehouse")).unwrap();
        assert!(matches!(
            store.create_connection(&connection("warehouse")),
            Err(StoreError::DuplicateConnectionName)
        ));
    }

    #[test]
    fn list_faults_are_consumed() {
        let store = Store::new("test@example.com");
        store.fail_next_list_requests(1);
        store.set_list_delay(Duration::from_millis(5));
        assert!(store.list_fault().is_err());
        assert_eq!(store.list_fault().unwrap(), Duration::from_millis(5));
    }

    #[test]
    fn messages_get_a_reply() {
        let store = Store::new("test@example.com");
        let conversation = store
            .create_conversation(&requests::CreateConversation {
                title: "Revenue".into(),
                connection_id: None,
            })
            .unwrap();
        let reply = store
            .send_message(
                &conversation.id,
                &requests::SendMessage {
                    content: "monthly revenue".into(),
                },
            )
            .unwrap();
        assert_eq!(reply.role, MessageRole::Assistant);
        assert!(reply.sql.is_some());
        let all = store
            .list_messages(
                &conversation.id,
                &PageQuery {
                    page: 0,
                    page_size: 10,
                },
            )
            .unwrap();
        assert_eq!(all.len(), 2);
    }
}
