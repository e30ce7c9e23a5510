use actix_web::{HttpRequest, HttpResponse, delete, get, post, web};
use payloads::{ApiKeyId, PageQuery, requests};

use crate::{ApiToken, Store};

use super::{APIError, authorize, list_delay};

#[tracing::instrument(skip(req, token, store), ret)]
#[get("/api_keys")]
pub async fn list_api_keys(
    req: HttpRequest,
    query: web::Query<PageQuery>,
    token: web::Data<ApiToken>,
    store: web::Data<Store>,
) -> Result<HttpResponse, APIError> {
    authorize(&req, &token)?;
    list_delay(&store).await?;
    Ok(HttpResponse::Ok().json(store.list_api_keys(&query)))
}

/// The secret is only ever returned from this call.
#[tracing::instrument(skip(req, token, store), ret)]
#[post("/api_keys")]
pub async fn create_api_key(
    req: HttpRequest,
    details: web::Json<requests::CreateApiKey>,
    token: web::Data<ApiToken>,
    store: web::Data<Store>,
) -> Result<HttpResponse, APIError> {
    authorize(&req, &token)?;
    let created = store.create_api_key(&details)?;
    Ok(HttpResponse::Created().json(created))
}

#[tracing::instrument(skip(req, token, store), ret)]
#[delete("/api_keys/{id}")]
pub async fn delete_api_key(
    req: HttpRequest,
    path: web::Path<ApiKeyId>,
    token: web::Data<ApiToken>,
    store: web::Data<Store>,
) -> Result<HttpResponse, APIError> {
    authorize(&req, &token)?;
    store.delete_api_key(&path)?;
    Ok(HttpResponse::NoContent().finish())
}
