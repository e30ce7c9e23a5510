//! Client-side data access layer for the admin console and chat backend.
//!
//! - [`fetch`]: one HTTP exchange with auth headers and typed errors.
//! - [`resource`]: GET/POST/PUT/PATCH/DELETE helpers over the fetch client.
//! - [`pagination`]: page cache with load-more and optimistic mutation.
//! - [`api_client`]: typed methods for the backend's resources.

pub mod api_client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod fetch;
pub mod pagination;
pub mod resource;

pub use api_client::{ApiClient, ApiList};
pub use config::{ClientConfig, ConfigError, ExecutionContext};
pub use credentials::{
    Anonymous, CredentialsProvider, SessionCredentials, StaticToken,
};
pub use error::{ClientError, SharedError};
pub use fetch::{FetchClient, FetchRequest};
pub use pagination::{
    HttpPageLoader, ListSnapshot, MutateOptions, MutationError,
    MutationOutcome, PageKey, PageLoader, PagedList,
};
pub use resource::{FilePart, Resources};
pub use tokio_util::sync::CancellationToken;
