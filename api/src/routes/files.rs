use actix_multipart::{Multipart, MultipartError};
use actix_web::{HttpRequest, HttpResponse, post, web};
use futures::TryStreamExt;
use payloads::{UPLOAD_FILE_FIELD, UPLOAD_METADATA_FIELD, requests};

use crate::{ApiToken, Store};

use super::{APIError, authorize};

fn malformed(e: MultipartError) -> APIError {
    APIError::BadRequest(e.to_string())
}

/// Accept a multipart upload with a `file` part and a `request_json` part
/// holding [`requests::UploadMetadata`].
#[tracing::instrument(skip(req, payload, token, store), fields(file_name), ret)]
#[post("/files")]
pub async fn upload_file(
    req: HttpRequest,
    mut payload: Multipart,
    token: web::Data<ApiToken>,
    store: web::Data<Store>,
) -> Result<HttpResponse, APIError> {
    authorize(&req, &token)?;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut metadata = requests::UploadMetadata::default();
    while let Some(mut field) = payload.try_next().await.map_err(malformed)? {
        let name = field.name().map(str::to_owned);
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_owned);
        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(malformed)? {
            bytes.extend_from_slice(&chunk);
        }
        match name.as_deref() {
            Some(UPLOAD_FILE_FIELD) => {
                let file_name = file_name.unwrap_or_else(|| "upload".into());
                file = Some((file_name, bytes));
            }
            Some(UPLOAD_METADATA_FIELD) => {
                metadata = serde_json::from_slice(&bytes).map_err(|e| {
                    let field = UPLOAD_METADATA_FIELD;
                    APIError::BadRequest(format!("Invalid {field}: {e}"))
                })?;
            }
            _ => {}
        }
    }

    let (file_name, bytes) = file.ok_or_else(|| {
        APIError::BadRequest(format!("Missing {UPLOAD_FILE_FIELD} part"))
    })?;
    tracing::Span::current()
        .record("file_name", tracing::field::display(&file_name));
    let uploaded = store.add_file(file_name, bytes.len() as u64, metadata)?;
    Ok(HttpResponse::Created().json(uploaded))
}
