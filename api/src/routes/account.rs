use actix_web::{HttpRequest, HttpResponse, get, patch, web};
use payloads::requests;

use crate::{ApiToken, Store};

use super::{APIError, authorize};

#[tracing::instrument(skip(req, token, store), ret)]
#[get("/users/me")]
pub async fn get_profile(
    req: HttpRequest,
    token: web::Data<ApiToken>,
    store: web::Data<Store>,
) -> Result<HttpResponse, APIError> {
    authorize(&req, &token)?;
    Ok(HttpResponse::Ok().json(store.profile()))
}

#[tracing::instrument(skip(req, token, store), ret)]
#[patch("/users/me")]
pub async fn update_profile(
    req: HttpRequest,
    details: web::Json<requests::UpdateProfile>,
    token: web::Data<ApiToken>,
    store: web::Data<Store>,
) -> Result<HttpResponse, APIError> {
    authorize(&req, &token)?;
    let profile = store.update_profile(&details)?;
    Ok(HttpResponse::Ok().json(profile))
}
