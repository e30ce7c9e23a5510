pub mod account;
pub mod api_keys;
pub mod chat;
pub mod connections;
#[cfg(feature = "fault-injection")]
pub mod faults;
pub mod files;

use actix_web::http::StatusCode;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{
    HttpRequest, HttpResponse, Responder, ResponseError, Scope, body::BoxBody,
    get, web,
};
use payloads::{ErrorBody, HealthStatus};
use secrecy::ExposeSecret;

use crate::{ApiToken, Store, store::StoreError, telemetry::log_error};

pub fn api_services() -> Scope {
    let scope = web::scope("/api")
        .service(health_check)
        .service(account::get_profile)
        .service(account::update_profile)
        .service(api_keys::list_api_keys)
        .service(api_keys::create_api_key)
        .service(api_keys::delete_api_key)
        .service(connections::list_connections)
        .service(connections::create_connection)
        .service(connections::get_connection)
        .service(connections::replace_connection)
        .service(connections::update_connection)
        .service(connections::delete_connection)
        .service(files::upload_file)
        .service(chat::list_conversations)
        .service(chat::create_conversation)
        .service(chat::list_messages)
        .service(chat::send_message);
    #[cfg(feature = "fault-injection")]
    let scope = scope
        .service(faults::delay)
        .service(faults::malformed)
        .service(faults::status)
        .service(faults::fail_lists)
        .service(faults::slow_lists);
    scope
}

#[get("/health_check")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthStatus::ok())
}

/// Public API errors, rendered as an [`ErrorBody`] with a stable code.
#[derive(Debug, thiserror::Error)]
pub enum APIError {
    #[error("Authentication required")]
    AuthError,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Something went wrong")]
    UnexpectedError(#[from] anyhow::Error),
}

impl APIError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::AuthError => "unauthorized",
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::UnexpectedError(_) => "internal",
        }
    }
}

impl ResponseError for APIError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthError => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse<BoxBody> {
        if let Self::UnexpectedError(e) = self {
            log_error(anyhow::anyhow!("{e:#}"));
        }
        HttpResponse::build(self.status_code())
            .json(ErrorBody::new(self.to_string(), self.error_code()))
    }
}

impl From<StoreError> for APIError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ApiKeyNotFound
            | StoreError::ConnectionNotFound
            | StoreError::ConversationNotFound => Self::NotFound(e.to_string()),
            StoreError::Invalid(_) => Self::BadRequest(e.to_string()),
            StoreError::DuplicateConnectionName => Self::Conflict(e.to_string()),
            StoreError::InjectedFailure => Self::UnexpectedError(e.into()),
        }
    }
}

/// Check the request's bearer token against the configured one.
fn authorize(
    req: &HttpRequest,
    token: &web::Data<ApiToken>,
) -> Result<(), APIError> {
    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(APIError::AuthError)?;
    if presented != token.0.expose_secret() {
        return Err(APIError::AuthError);
    }
    Ok(())
}

/// Apply any scripted list fault before answering a list request.
async fn list_delay(store: &Store) -> Result<(), APIError> {
    let delay = store.list_fault()?;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    Ok(())
}

pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        APIError::BadRequest(err.to_string()).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        APIError::BadRequest(err.to_string()).into()
    })
}

/// Malformed ids in the path are reported as missing resources.
pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|_err, _req| {
        APIError::NotFound("Not found".into()).into()
    })
}

pub async fn not_found() -> Result<HttpResponse, APIError> {
    Err(APIError::NotFound("Not found".into()))
}
