//! Request handlers for the upload endpoints.
//!
//! Handlers stay thin: they pull the file part out of the multipart body and
//! hand its stream to the gatekeeper, which owns validation and persistence.

use axum::Json;
use axum::body::Body;
use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::{Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;

use crate::api::AppState;
use crate::api::responses::{MessageResponse, ReplaceResponse, UploadResponse};
use crate::error::StorageError;
use crate::storage::{Category, IncomingFile, StoredAsset};

type HandlerResult<T> = Result<T, StorageError>;

/// What to do with the file part once it is found
#[derive(Debug, Clone, Copy)]
enum UploadTarget<'a> {
    New,
    Replace(&'a str),
}

pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> HandlerResult<(StatusCode, Json<UploadResponse>)> {
    upload(&state, Category::Image, multipart).await
}

pub async fn upload_tabular(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> HandlerResult<(StatusCode, Json<UploadResponse>)> {
    upload(&state, Category::TabularData, multipart).await
}

pub async fn list_images(State(state): State<AppState>) -> HandlerResult<Json<Vec<String>>> {
    Ok(Json(state.gatekeeper.list(Category::Image).await?))
}

pub async fn list_tabular(State(state): State<AppState>) -> HandlerResult<Json<Vec<String>>> {
    Ok(Json(state.gatekeeper.list(Category::TabularData).await?))
}

pub async fn get_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> HandlerResult<Response> {
    serve_file(&state, Category::Image, &filename).await
}

pub async fn get_tabular(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> HandlerResult<Response> {
    serve_file(&state, Category::TabularData, &filename).await
}

pub async fn delete_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> HandlerResult<Json<MessageResponse>> {
    state.gatekeeper.delete(Category::Image, &filename).await?;

    Ok(Json(MessageResponse {
        message: "File deleted successfully".to_string(),
    }))
}

/// Replaces an image. The response carries the new generated name; the old
/// name stops resolving.
pub async fn replace_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> HandlerResult<Json<ReplaceResponse>> {
    let mut multipart = multipart.map_err(malformed_request)?;
    let asset = receive_file(
        &state,
        Category::Image,
        UploadTarget::Replace(&filename),
        &mut multipart,
    )
    .await?;

    Ok(Json(ReplaceResponse {
        message: "Image updated successfully".to_string(),
        filename: asset.name,
    }))
}

async fn upload(
    state: &AppState,
    category: Category,
    multipart: Result<Multipart, MultipartRejection>,
) -> HandlerResult<(StatusCode, Json<UploadResponse>)> {
    let mut multipart = multipart.map_err(malformed_request)?;
    let asset = receive_file(state, category, UploadTarget::New, &mut multipart).await?;

    let message = match category {
        Category::Image => "Image uploaded successfully",
        Category::TabularData => "Data file uploaded successfully",
    };

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: message.to_string(),
            url: state.asset_url(category, &asset.name),
            filename: asset.name,
        }),
    ))
}

/// Find the category's file part and stream it through the gatekeeper.
///
/// Parts under other names are skipped.
async fn receive_file(
    state: &AppState,
    category: Category,
    target: UploadTarget<'_>,
    multipart: &mut Multipart,
) -> HandlerResult<StoredAsset> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        StorageError::invalid_file(format!("Failed to parse multipart data: {e}"))
    })? {
        if field.name() != Some(category.field_name()) {
            continue;
        }

        let incoming = incoming_file(&field).ok_or_else(|| missing_file(category))?;

        return match target {
            UploadTarget::New => state.gatekeeper.upload(category, &incoming, field).await,
            UploadTarget::Replace(existing) => {
                state
                    .gatekeeper
                    .replace(category, existing, &incoming, field)
                    .await
            }
        };
    }

    Err(missing_file(category))
}

fn incoming_file(field: &Field<'_>) -> Option<IncomingFile> {
    let file_name = field.file_name().filter(|name| !name.is_empty())?;

    Some(IncomingFile::new(
        field.name().unwrap_or_default(),
        file_name,
        field.content_type().map(str::to_string),
    ))
}

fn missing_file(category: Category) -> StorageError {
    StorageError::invalid_file(match category {
        Category::Image => "No file was provided or the file is not a valid image",
        Category::TabularData => "No file was provided or the file is not a valid data file",
    })
}

fn malformed_request(rejection: MultipartRejection) -> StorageError {
    StorageError::invalid_file(format!("Expected a multipart upload: {}", rejection.body_text()))
}

async fn serve_file(state: &AppState, category: Category, filename: &str) -> HandlerResult<Response> {
    let asset = state.gatekeeper.open(category, filename).await?;
    let content_type = mime_guess::from_path(&asset.name).first_or_octet_stream();

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_LENGTH, asset.size.to_string()),
        ],
        Body::from_stream(ReaderStream::new(asset.file)),
    )
        .into_response())
}
