//! REST API types and upload helpers.

use axum::extract::Multipart;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ServerError, ServerResult};

/// Extensions accepted for uploads
pub const ALLOWED_EXTENSIONS: [&str; 1] = ["csv"];

/// A file pulled out of a multipart request
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

/// Whether `file_name` carries an accepted extension (case-insensitive)
pub fn allowed_file(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Read the `file` field of a multipart upload and check its extension.
pub async fn read_csv_upload(mut multipart: Multipart) -> ServerResult<UploadedFile> {
    let mut upload: Option<UploadedFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(|s| s.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?
            .to_vec();
        upload = Some(UploadedFile { file_name, bytes });
    }

    let upload = upload.ok_or_else(|| ServerError::BadRequest("No file provided".into()))?;

    match upload.file_name.as_deref() {
        Some(name) if allowed_file(name) => Ok(upload),
        _ => Err(ServerError::BadRequest("Only CSV files are allowed".into())),
    }
}

/// Service description returned at `/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub message: String,
    pub version: String,
    pub endpoints: Value,
    pub csv_format: String,
    pub max_entities: usize,
}

impl ServiceInfo {
    pub fn new(max_entities: usize) -> Self {
        Self {
            message: "Bulk Entity Registration Service".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            endpoints: json!({
                "bulk_create": "POST /entities/bulk",
                "batch_status": "GET /entities/batch/{batch_id}/status",
                "validate_csv": "POST /entities/validate-csv",
                "health": "GET /health",
                "logs": "GET /api/logs (SSE)"
            }),
            csv_format: "name,address,phone (phone is optional)".to_string(),
            max_entities,
        }
    }
}
