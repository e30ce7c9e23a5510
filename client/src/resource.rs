//! Typed verb helpers over the fetch client.
//!
//! Each call is independent: no retries, no de-duplication, and concurrent
//! calls to the same URL are not coalesced. Errors come back exactly as the
//! fetch client produced them, after being logged.

use std::sync::Arc;

use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::{Serialize, de::DeserializeOwned};
use tokio_util::sync::CancellationToken;

use crate::credentials::CredentialsProvider;
use crate::error::ClientError;
use crate::fetch::{FetchClient, FetchRequest};

/// A file to send in a multipart upload.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FilePart {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: None,
            bytes,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

#[derive(Clone)]
pub struct Resources {
    fetch: FetchClient,
    base_url: String,
    credentials: Arc<dyn CredentialsProvider>,
    cancel: Option<CancellationToken>,
}

impl Resources {
    pub fn new(
        fetch: FetchClient,
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Self {
        Self {
            fetch,
            base_url: base_url.into(),
            credentials,
            cancel: None,
        }
    }

    /// A copy whose calls are aborted when `token` is cancelled.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
            ..self.clone()
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn fetch_client(&self) -> &FetchClient {
        &self.fetch
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialsProvider> {
        &self.credentials
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ClientError> {
        let result = match self.authenticated(Method::GET, path) {
            Ok(request) => self.fetch.fetch(request).await,
            Err(e) => Err(e),
        };
        log_failure(&Method::GET, path, result)
    }

    /// GET without a bearer token, for the few public endpoints.
    pub async fn get_public<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ClientError> {
        let request = self.prepare(FetchRequest::new(Method::GET, self.url(path)));
        log_failure(&Method::GET, path, self.fetch.fetch(request).await)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.with_body(Method::POST, path, body).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.with_body(Method::PUT, path, body).await
    }

    /// PATCH with a partial body; fields left out are untouched server-side.
    pub async fn patch<P, T>(
        &self,
        path: &str,
        partial: &P,
    ) -> Result<T, ClientError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.with_body(Method::PATCH, path, partial).await
    }

    /// DELETE; `None` when the backend answers with an empty body.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, ClientError> {
        let result = match self.authenticated(Method::DELETE, path) {
            Ok(request) => self.fetch.fetch_optional(request).await,
            Err(e) => Err(e),
        };
        log_failure(&Method::DELETE, path, result)
    }

    /// Multipart POST with a `file` part and JSON metadata in `request_json`.
    pub async fn upload<M, T>(
        &self,
        path: &str,
        file: FilePart,
        metadata: &M,
    ) -> Result<T, ClientError>
    where
        M: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let result = async {
            let request = self.authenticated(Method::POST, path)?;
            let form = upload_form(file, metadata)?;
            self.fetch.fetch(request.multipart(form)).await
        }
        .await;
        log_failure(&Method::POST, path, result)
    }

    async fn with_body<B, T>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let result = async {
            let request = self.authenticated(method.clone(), path)?.json(&body)?;
            self.fetch.fetch(request).await
        }
        .await;
        log_failure(&method, path, result)
    }

    /// Build an authenticated request, or refuse with `NoSession` before
    /// anything reaches the fetch client.
    fn authenticated(
        &self,
        method: Method,
        path: &str,
    ) -> Result<FetchRequest, ClientError> {
        let token = self
            .credentials
            .bearer_token()
            .ok_or(ClientError::NoSession)?;
        let request = FetchRequest::new(method, self.url(path)).bearer(Some(token));
        Ok(self.prepare(request))
    }

    fn prepare(&self, request: FetchRequest) -> FetchRequest {
        match &self.cancel {
            Some(token) => request.cancel_on(token.clone()),
            None => request,
        }
    }
}

fn upload_form<M: Serialize + ?Sized>(
    file: FilePart,
    metadata: &M,
) -> Result<Form, ClientError> {
    let mut file_part = Part::bytes(file.bytes).file_name(file.file_name);
    if let Some(mime) = &file.mime_type {
        file_part = with_mime(file_part, mime)?;
    }
    let metadata = serde_json::to_string(metadata).map_err(ClientError::Encode)?;
    let metadata_part = with_mime(Part::text(metadata), "application/json")?;
    Ok(Form::new()
        .part(payloads::UPLOAD_FILE_FIELD, file_part)
        .part(payloads::UPLOAD_METADATA_FIELD, metadata_part))
}

fn with_mime(part: Part, mime_type: &str) -> Result<Part, ClientError> {
    part.mime_str(mime_type)
        .map_err(|source| ClientError::InvalidMimeType {
            mime_type: mime_type.to_string(),
            source,
        })
}

/// Log a failed call for diagnostics and hand the result back untouched.
fn log_failure<T>(
    method: &Method,
    path: &str,
    result: Result<T, ClientError>,
) -> Result<T, ClientError> {
    if let Err(e) = &result {
        if e.is_user_visible() {
            tracing::warn!(
                %method,
                path,
                status = ?e.status(),
                code = ?e.code(),
                "request failed: {e}"
            );
        } else {
            tracing::debug!(%method, path, "request not completed: {e}");
        }
    }
    result
}
