//! `GET /api/files/:folder/:name`: download a stored requisition or report.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::integrations::Folder;

pub async fn download(
    State(ctx): State<ApiContext>,
    Path((folder, name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let folder = Folder::parse(&folder)
        .ok_or_else(|| ApiError::NotFound(format!("Folder {folder} not found")))?;

    let lookup = name.clone();
    let bytes = ctx
        .run_blocking(move |core| {
            core.attachments()
                .read(folder, &lookup)
                .map_err(|e| ApiError::Internal(e.to_string()))
        })
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("File {name} not found")))?;

    let content_type = mime_guess::from_path(&name).first_or_octet_stream().to_string();
    let disposition = format!("inline; filename=\"{}\"", name.replace('"', ""));
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
