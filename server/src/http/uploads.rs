use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use platform_api::{ApiError, ApiResult};
use products_hr::uploads::{self, IncomingFile, content_type_for};
use serde_json::{Value, json};

use super::{AppState, extract::{AuthUser, Path}};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/documents", post(upload_documents).get(list_documents))
        .route("/avatar", post(upload_avatar))
}

pub(super) fn file_routes() -> Router<AppState> {
    Router::new().route("/{folder}/{filename}", get(serve_file))
}

/// Buffer every file part named `field`. Other parts are ignored.
pub(super) async fn read_files(mut multipart: Multipart, field: &str) -> ApiResult<Vec<IncomingFile>> {
    let mut files = Vec::new();
    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("Invalid multipart payload"))?
    {
        if part.name() != Some(field) {
            continue;
        }
        let file_name = part.file_name().unwrap_or("upload").to_string();
        let content_type = part
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| content_type_for(&file_name).to_string());
        let bytes = part
            .bytes()
            .await
            .map_err(|_| ApiError::bad_request("Invalid file upload"))?;
        files.push(IncomingFile {
            field: field.to_string(),
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Ok(files)
}

async fn upload_documents(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let files = read_files(multipart, "documents").await?;
    let stored = uploads::upload_documents(&state.db, &state.uploads, &actor, files).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Documents uploaded successfully",
            "files": stored,
        })),
    ))
}

async fn list_documents(State(state): State<AppState>, AuthUser(actor): AuthUser) -> ApiResult<Json<Value>> {
    let files = uploads::list_documents(&state.db, &actor).await?;
    Ok(Json(json!({ "files": files })))
}

async fn upload_avatar(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let files = read_files(multipart, "avatar").await?;
    let stored = uploads::upload_avatar(&state.db, &state.uploads, &actor, files).await?;
    Ok(Json(json!({
        "message": "Avatar uploaded successfully",
        "file": stored,
    })))
}

async fn serve_file(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path((folder, filename)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let (upload, path) = uploads::open_file(&state.db, &state.uploads, &actor, &folder, &filename).await?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|err| ApiError::internal(err.into()))?;
    Ok((
        [
            (header::CONTENT_TYPE, upload.mime_type),
            (header::CONTENT_DISPOSITION, format!("inline; filename=\"{filename}\"")),
        ],
        bytes,
    ))
}
