//! Profile picture endpoints.

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
};

use crate::error::{AppError, Result};
use crate::middleware::RequireAccount;
use crate::models::PictureView;
use crate::services::PictureUpload;
use crate::state::AppState;

/// Multipart field carrying the image.
pub const FILE_FIELD: &str = "file";

/// Upload or replace the caller's picture.
///
/// POST /v1/user/self/pic
pub async fn upload(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<PictureView>)> {
    let multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let upload = read_file_field(multipart).await?;

    let picture = state.pictures().upload(&account.email, upload).await?;
    Ok((StatusCode::CREATED, Json(PictureView::from(&picture))))
}

/// The caller's picture metadata.
///
/// GET /v1/user/self/pic
pub async fn show(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
) -> Result<Json<PictureView>> {
    let picture = state.pictures().get(&account.email).await?;
    Ok(Json(PictureView::from(&picture)))
}

/// Remove the caller's picture.
///
/// DELETE /v1/user/self/pic
pub async fn delete(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
) -> Result<StatusCode> {
    state.pictures().delete(&account.email).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Pull the `file` part out of the form, ignoring any other parts.
async fn read_file_field(mut multipart: Multipart) -> Result<PictureUpload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        return Ok(PictureUpload {
            file_name,
            content_type,
            bytes,
        });
    }

    Err(AppError::BadRequest(format!(
        "multipart form must include a `{FILE_FIELD}` field"
    )))
}
