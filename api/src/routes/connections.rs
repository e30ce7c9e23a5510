use actix_web::{
    HttpRequest, HttpResponse, delete, get, patch, post, put, web,
};
use payloads::{ConnectionId, PageQuery, requests};

use crate::{ApiToken, Store};

use super::{APIError, authorize, list_delay};

#[tracing::instrument(skip(req, token, store), ret)]
#[get("/connections")]
pub async fn list_connections(
    req: HttpRequest,
    query: web::Query<PageQuery>,
    token: web::Data<ApiToken>,
    store: web::Data<Store>,
) -> Result<HttpResponse, APIError> {
    authorize(&req, &token)?;
    list_delay(&store).await?;
    Ok(HttpResponse::Ok().json(store.list_connections(&query)))
}

#[tracing::instrument(skip(req, token, store), ret)]
#[get("/connections/{id}")]
pub async fn get_connection(
    req: HttpRequest,
    path: web::Path<ConnectionId>,
    token: web::Data<ApiToken>,
    store: web::Data<Store>,
) -> Result<HttpResponse, APIError> {
    authorize(&req, &token)?;
    Ok(HttpResponse::Ok().json(store.get_connection(&path)?))
}

#[tracing::instrument(skip(req, details, token, store), ret)]
#[post("/connections")]
pub async fn create_connection(
    req: HttpRequest,
    details: web::Json<requests::ConnectionDetails>,
    token: web::Data<ApiToken>,
    store: web::Data<Store>,
) -> Result<HttpResponse, APIError> {
    authorize(&req, &token)?;
    let connection = store.create_connection(&details)?;
    Ok(HttpResponse::Created().json(connection))
}

#[tracing::instrument(skip(req, details, token, store), ret)]
#[put("/connections/{id}")]
pub async fn replace_connection(
    req: HttpRequest,
    path: web::Path<ConnectionId>,
    details: web::Json<requests::ConnectionDetails>,
    token: web::Data<ApiToken>,
    store: web::Data<Store>,
) -> Result<HttpResponse, APIError> {
    authorize(&req, &token)?;
    let connection = store.replace_connection(&path, &details)?;
    Ok(HttpResponse::Ok().json(connection))
}

#[tracing::instrument(skip(req, details, token, store), ret)]
#[patch("/connections/{id}")]
pub async fn update_connection(
    req: HttpRequest,
    path: web::Path<ConnectionId>,
    details: web::Json<requests::UpdateConnection>,
    token: web::Data<ApiToken>,
    store: web::Data<Store>,
) -> Result<HttpResponse, APIError> {
    authorize(&req, &token)?;
    let connection = store.update_connection(&path, &details)?;
    Ok(HttpResponse::Ok().json(connection))
}

#[tracing::instrument(skip(req, token, store), ret)]
#[delete("/connections/{id}")]
pub async fn delete_connection(
    req: HttpRequest,
    path: web::Path<ConnectionId>,
    token: web::Data<ApiToken>,
    store: web::Data<Store>,
) -> Result<HttpResponse, APIError> {
    authorize(&req, &token)?;
    store.delete_connection(&path)?;
    Ok(HttpResponse::NoContent().finish())
}
