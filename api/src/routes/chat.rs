use actix_web::{HttpRequest, HttpResponse, get, post, web};
use payloads::{ConversationId, PageQuery, requests};

use crate::{ApiToken, Store};

use super::{APIError, authorize, list_delay};

#[tracing::instrument(skip(req, token, store), ret)]
#[get("/conversations")]
pub async fn list_conversations(
    req: HttpRequest,
    query: web::Query<PageQuery>,
    token: web::Data<ApiToken>,
    store: web::Data<Store>,
) -> Result<HttpResponse, APIError> {
    authorize(&req, &token)?;
    list_delay(&store).await?;
    Ok(HttpResponse::Ok().json(store.list_conversations(&query)))
}

#[tracing::instrument(skip(req, token, store), ret)]
#[post("/conversations")]
pub async fn create_conversation(
    req: HttpRequest,
    details: web::Json<requests::CreateConversation>,
    token: web::Data<ApiToken>,
    store: web::Data<Store>,
) -> Result<HttpResponse, APIError> {
    authorize(&req, &token)?;
    let conversation = store.create_conversation(&details)?;
    Ok(HttpResponse::Created().json(conversation))
}

/// Messages oldest first.
#[tracing::instrument(skip(req, token, store), ret)]
#[get("/conversations/{id}/messages")]
pub async fn list_messages(
    req: HttpRequest,
    path: web::Path<ConversationId>,
    query: web::Query<PageQuery>,
    token: web::Data<ApiToken>,
    store: web::Data<Store>,
) -> Result<HttpResponse, APIError> {
    authorize(&req, &token)?;
    list_delay(&store).await?;
    Ok(HttpResponse::Ok().json(store.list_messages(&path, &query)?))
}

/// Post a user message and answer with the assistant's reply.
#[tracing::instrument(skip(req, token, store), ret)]
#[post("/conversations/{id}/messages")]
pub async fn send_message(
    req: HttpRequest,
    path: web::Path<ConversationId>,
    details: web::Json<requests::SendMessage>,
    token: web::Data<ApiToken>,
    store: web::Data<Store>,
) -> Result<HttpResponse, APIError> {
    authorize(&req, &token)?;
    let reply = store.send_message(&path, &details)?;
    Ok(HttpResponse::Created().json(reply))
}
