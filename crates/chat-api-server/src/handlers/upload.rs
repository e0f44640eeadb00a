use axum::{
    extract::{Multipart, State},
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::models::chat::UploadResponse;
use crate::services::DocumentService;
use crate::utils::error::ApiError;

/// Multipart upload of a single PDF under the `file` field.
pub async fn add_pdf_handler(
    State(document_service): State<Arc<DocumentService>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    info!("File upload request received");

    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Failed to read field: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload.pdf").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("Failed to read file: {}", e)))?;
        upload = Some((filename, data.to_vec()));
    }

    let (filename, data) =
        upload.ok_or_else(|| ApiError::Validation("file required".to_string()))?;

    let report = document_service.ingest_pdf(&filename, data).await?;

    Ok(Json(UploadResponse {
        status: "PDF added successfully".to_string(),
        pages: report.pages,
        chunks: report.chunks,
    }))
}
