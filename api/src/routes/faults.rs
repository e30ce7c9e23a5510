//! Misbehaving endpoints for exercising client error handling.
//!
//! Only mounted with the `fault-injection` feature.

use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, get, post, web};
use payloads::{ErrorBody, HealthStatus};
use serde::Deserialize;

use crate::Store;

/// Answer with a health payload after `ms` milliseconds.
#[get("/faults/delay/{ms}")]
pub async fn delay(path: web::Path<u64>) -> HttpResponse {
    tokio::time::sleep(Duration::from_millis(path.into_inner())).await;
    HttpResponse::Ok().json(HealthStatus::ok())
}

/// A 200 whose body is not JSON.
#[get("/faults/malformed")]
pub async fn malformed() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("application/json")
        .body("{not json")
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    /// Send an HTML body instead of an [`ErrorBody`].
    #[serde(default)]
    html: bool,
}

/// Respond with an arbitrary status code.
#[get("/faults/status/{code}")]
pub async fn status(
    path: web::Path<u16>,
    query: web::Query<StatusQuery>,
) -> HttpResponse {
    let status = StatusCode::from_u16(path.into_inner())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if query.html {
        return HttpResponse::build(status)
            .content_type("text/html")
            .body("<html><body>Bad Gateway</body></html>");
    }
    HttpResponse::build(status)
        .json(ErrorBody::new("Injected status", "injected"))
}

#[derive(Debug, Deserialize)]
pub struct FailLists {
    count: u32,
}

/// Fail the next `count` list requests with a 500.
#[post("/faults/fail_lists")]
pub async fn fail_lists(
    details: web::Json<FailLists>,
    store: web::Data<Store>,
) -> HttpResponse {
    store.fail_next_list_requests(details.count);
    HttpResponse::NoContent().finish()
}

#[derive(Debug, Deserialize)]
pub struct SlowLists {
    ms: u64,
}

/// Delay every list response by `ms` milliseconds.
#[post("/faults/slow_lists")]
pub async fn slow_lists(
    details: web::Json<SlowLists>,
    store: web::Data<Store>,
) -> HttpResponse {
    store.set_list_delay(Duration::from_millis(details.ms));
    HttpResponse::NoContent().finish()
}
