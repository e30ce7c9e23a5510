//! Wire types shared by the data-layer client and the development backend.

pub mod requests;
pub mod responses;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Page size used when a caller does not pick one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Field name of the JSON metadata part in multipart uploads.
pub const UPLOAD_METADATA_FIELD: &str = "request_json";

/// Field name of the file part in multipart uploads.
pub const UPLOAD_FILE_FIELD: &str = "file";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    Serialize,
    Deserialize,
)]
pub struct UserId(pub Uuid);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    Serialize,
    Deserialize,
)]
pub struct ApiKeyId(pub Uuid);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    Serialize,
    Deserialize,
)]
pub struct ConnectionId(pub Uuid);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    Serialize,
    Deserialize,
)]
pub struct ConversationId(pub Uuid);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    Serialize,
    Deserialize,
)]
pub struct MessageId(pub Uuid);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    Serialize,
    Deserialize,
)]
pub struct FileId(pub Uuid);

/// Query parameters accepted by every paginated list endpoint.
///
/// `page` is zero-based. The endpoint answers with a plain array holding at
/// most `page_size` items; there is no total count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl PageQuery {
    /// Index of the first item on this page within the full collection.
    pub fn offset(&self) -> usize {
        self.page as usize * self.page_size as usize
    }
}

/// JSON error body returned by the backend for non-2xx responses.
///
/// Some backend routes report the human readable text under `detail`
/// instead of `message`; both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, alias = "detail", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>, error_code: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            error_code: Some(error_code.into()),
        }
    }

    /// True when the body carried any structured detail at all.
    pub fn is_structured(&self) -> bool {
        self.message.is_some() || self.error_code.is_some()
    }
}

/// Liveness payload served by the unauthenticated health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            status: "ok".into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseEngine {
    Postgres,
    Mysql,
    Snowflake,
    Bigquery,
    Sqlite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}
