//! The fetch client: one HTTP exchange against an absolute URL.
//!
//! Attaches the bearer token and content headers, sends a JSON or multipart
//! body, and turns the response into either the decoded body or a
//! [`ClientError`]. It never retries and keeps no cache; callers own both.

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, multipart::Form};
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, de::DeserializeOwned};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::ClientError;

pub enum RequestBody {
    Json(Vec<u8>),
    Multipart(Form),
}

/// A single request for [`FetchClient::fetch`].
pub struct FetchRequest {
    method: Method,
    url: String,
    body: Option<RequestBody>,
    bearer: Option<SecretString>,
    cancel: Option<CancellationToken>,
}

impl FetchRequest {
    /// `url` must be absolute; prefixing the backend base address is the
    /// caller's job.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            bearer: None,
            cancel: None,
        }
    }

    pub fn json(
        mut self,
        body: &impl Serialize,
    ) -> Result<Self, ClientError> {
        let bytes = serde_json::to_vec(body).map_err(ClientError::Encode)?;
        self.body = Some(RequestBody::Json(bytes));
        Ok(self)
    }

    pub fn multipart(mut self, form: Form) -> Self {
        self.body = Some(RequestBody::Multipart(form));
        self
    }

    pub fn bearer(mut self, token: Option<SecretString>) -> Self {
        self.bearer = token;
        self
    }

    /// Abort the request when `token` is cancelled.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Clone, Debug)]
pub struct FetchClient {
    inner: reqwest::Client,
}

impl FetchClient {
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let inner = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { inner })
    }

    pub fn from_reqwest(inner: reqwest::Client) -> Self {
        Self { inner }
    }

    /// Perform the request and decode the 2xx body as `T`.
    #[tracing::instrument(
        skip_all,
        fields(method = %request.method, url = %request.url)
    )]
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        request: FetchRequest,
    ) -> Result<T, ClientError> {
        let body = self.send(request).await?;
        serde_json::from_slice(&body).map_err(ClientError::Decode)
    }

    /// Like [`fetch`](Self::fetch), but an empty 2xx body yields `None`.
    #[tracing::instrument(
        skip_all,
        fields(method = %request.method, url = %request.url)
    )]
    pub async fn fetch_optional<T: DeserializeOwned>(
        &self,
        request: FetchRequest,
    ) -> Result<Option<T>, ClientError> {
        let body = self.send(request).await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(ClientError::Decode)
    }

    async fn send(&self, request: FetchRequest) -> Result<Vec<u8>, ClientError> {
        let url = Url::parse(&request.url).map_err(|source| {
            ClientError::InvalidUrl {
                url: request.url.clone(),
                source,
            }
        })?;
        match request.cancel.clone() {
            Some(token) => {
                if token.is_cancelled() {
                    return Err(ClientError::Cancelled);
                }
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        tracing::debug!("request aborted by caller");
                        Err(ClientError::Cancelled)
                    }
                    result = self.exchange(url, request) => result,
                }
            }
            None => self.exchange(url, request).await,
        }
    }

    async fn exchange(
        &self,
        url: Url,
        request: FetchRequest,
    ) -> Result<Vec<u8>, ClientError> {
        let mut builder = self
            .inner
            .request(request.method, url)
            .header(ACCEPT, "application/json");
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token.expose_secret());
        }
        builder = match request.body {
            Some(RequestBody::Json(bytes)) => {
                builder.header(CONTENT_TYPE, "application/json").body(bytes)
            }
            // reqwest sets the multipart boundary header itself
            Some(RequestBody::Multipart(form)) => builder.multipart(form),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(ClientError::from_response(status, &body));
        }
        Ok(body.to_vec())
    }
}
