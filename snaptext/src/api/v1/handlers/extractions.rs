//! Extraction endpoints: submit, list, fetch, delete, stats.

use std::time::Instant;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum_extra::extract::Query;

use crate::api::state::AppState;
use crate::api::v1::dto::{
    DeleteResponse, ExtractionRecord, ExtractionResponse, HistoryQuery, HistoryResponse,
    StatsResponse,
};
use crate::api::v1::response::ApiResponse;
use crate::error::SnapError;
use crate::models::NewScreenshot;

struct Upload {
    bytes: Vec<u8>,
    mime: String,
    filename: String,
}

/// Submit an image for text extraction.
///
/// Multipart fields:
/// - `image` (required): the file itself. MIME comes from the part header,
///   falling back to a filename-extension guess.
/// - `model` (optional): `provider/model` override for this request.
/// - `userId` (optional): opaque owner tag stored with the record.
pub async fn create_extraction(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResponse<ExtractionResponse> {
    let started = Instant::now();

    let mut upload: Option<Upload> = None;
    let mut model_override: Option<String> = None;
    let mut user_id: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return ApiResponse::failure(
                    StatusCode::BAD_REQUEST,
                    format!("Malformed multipart body: {e}"),
                );
            }
        };

        match field.name() {
            Some("image") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let declared_mime = field.content_type().map(str::to_string);

                let bytes = match field.bytes().await {
                    Ok(bytes) => bytes.to_vec(),
                    Err(e) => {
                        return ApiResponse::failure(
                            StatusCode::BAD_REQUEST,
                            format!("Failed to read image field: {e}"),
                        );
                    }
                };

                let mime = declared_mime
                    .filter(|m| m != "application/octet-stream")
                    .or_else(|| {
                        mime_guess::from_path(&filename)
                            .first_raw()
                            .map(str::to_string)
                    })
                    .unwrap_or_else(|| "application/octet-stream".to_string());

                upload = Some(Upload {
                    bytes,
                    mime,
                    filename,
                });
            }
            Some("model") => {
                model_override = field.text().await.ok().filter(|s| !s.trim().is_empty());
            }
            Some("userId") => {
                user_id = field.text().await.ok().filter(|s| !s.trim().is_empty());
            }
            _ => {}
        }
    }

    let Some(upload) = upload else {
        return ApiResponse::failure(StatusCode::BAD_REQUEST, "Missing required field 'image'");
    };

    if upload.bytes.is_empty() {
        return ApiResponse::failure(StatusCode::BAD_REQUEST, "Uploaded image is empty");
    }

    let limit = state.config.image.upload_max_bytes;
    if upload.bytes.len() > limit {
        return SnapError::PayloadTooLarge {
            size: upload.bytes.len(),
            limit,
        }
        .into();
    }

    let result = match state
        .extraction
        .extract(&upload.bytes, &upload.mime, model_override.as_deref())
        .await
    {
        Ok(result) => result,
        Err(e) => return e.into(),
    };

    let new = NewScreenshot {
        filename: upload.filename,
        extracted_text: result.text.clone(),
        language: result.language.clone(),
        confidence: result.confidence,
        model: result.model.clone(),
        prompt_tokens: result.prompt_tokens,
        completion_tokens: result.completion_tokens,
        original_size_bytes: upload.bytes.len() as u64,
        original_mime: upload.mime,
        user_id,
    };

    let record = match state.store.create(&new).await {
        Ok(record) => record,
        Err(e) => {
            // Extraction itself succeeded; say so instead of hiding the
            // result behind a generic storage failure.
            tracing::error!(error = %e, "Failed to persist extraction record");
            return SnapError::StorageWrite(
                "text was extracted but the record could not be saved".to_string(),
            )
            .into();
        }
    };

    tracing::info!(
        id = %record.id,
        language = %record.language,
        confidence = record.confidence,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Extraction completed"
    );

    ApiResponse::created(ExtractionResponse {
        id: record.id,
        filename: record.filename,
        text: result.text,
        language: result.language,
        confidence: result.confidence,
        model: result.model,
        prompt_tokens: result.prompt_tokens,
        completion_tokens: result.completion_tokens,
        processing_time_ms: started.elapsed().as_millis() as u64,
    })
}

/// Newest-first history with offset pagination.
pub async fn list_extractions(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResponse<HistoryResponse> {
    let limit = query.limit();
    let skip = query.skip();

    match state.store.find_all(limit, skip).await {
        Ok(records) => ApiResponse::success(HistoryResponse {
            items: records.into_iter().map(ExtractionRecord::from).collect(),
            limit,
            skip,
        }),
        Err(e) => e.into(),
    }
}

pub async fn get_extraction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResponse<ExtractionRecord> {
    match state.store.find_by_id(&id).await {
        Ok(Some(record)) => ApiResponse::success(record.into()),
        Ok(None) => SnapError::NotFound(format!("Extraction {id} not found")).into(),
        Err(e) => e.into(),
    }
}

/// Delete a stored extraction. Malformed ids get the same not-found
/// answer as well-formed absent ones.
pub async fn delete_extraction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResponse<DeleteResponse> {
    match state.store.delete_by_id(&id).await {
        Ok(true) => {
            tracing::info!(id = %id, "Extraction deleted");
            ApiResponse::success(DeleteResponse { id, deleted: true })
        }
        Ok(false) => SnapError::NotFound(format!("Extraction {id} not found")).into(),
        Err(e) => e.into(),
    }
}

pub async fn get_stats(State(state): State<AppState>) -> ApiResponse<StatsResponse> {
    match state.store.get_stats().await {
        Ok(stats) => ApiResponse::success(stats.into()),
        Err(e) => e.into(),
    }
}
