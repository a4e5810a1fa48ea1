//! XR archive import
//!
//! One endpoint, two bodies: a multipart form carrying the archive itself, or
//! a JSON reference to an archive the client already staged in storage. Both
//! answer with a `text/event-stream` of progress events that ends with a
//! single `complete` or `error` event.

use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use bytes::Bytes;
use futures::stream::{self, Stream};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use xrdeck_core::{is_staged_key, staging_prefix, AppError};
use xrdeck_ingest::{progress_channel, ArchiveSource, IngestRequest};

/// JSON body for an archive that was uploaded to storage beforehand
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StagedImportRequest {
    pub product_id: Uuid,
    pub owner_id: Uuid,
    /// Storage key of the staged archive, under `staging/{ownerId}/`
    pub storage_path: String,
    /// Original file name, used for the extension check
    pub file_name: Option<String>,
}

/// Multipart form accepted by the import endpoint
#[derive(ToSchema)]
#[allow(dead_code)]
#[schema(rename_all = "camelCase")]
pub struct XrImportForm {
    /// The `.zip` export
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
    product_id: Uuid,
    owner_id: Uuid,
}

impl StagedImportRequest {
    fn into_ingest_request(self) -> Result<IngestRequest, AppError> {
        let storage_path = self.storage_path.trim().to_string();
        if storage_path.is_empty() {
            return Err(AppError::InvalidInput(
                "storagePath must not be empty".to_string(),
            ));
        }
        // Staged archives are deleted after the run, so only the owner's
        // staging area may be named here.
        if !is_staged_key(self.owner_id, &storage_path) {
            return Err(AppError::InvalidInput(format!(
                "storagePath must be under '{}/'",
                staging_prefix(self.owner_id)
            )));
        }
        Ok(IngestRequest {
            product_id: self.product_id,
            owner_id: self.owner_id,
            source: ArchiveSource::Staged {
                storage_path,
                file_name: self.file_name.filter(|n| !n.trim().is_empty()),
            },
        })
    }
}

fn parse_uuid_field(name: &str, value: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(value.trim())
        .map_err(|_| AppError::InvalidInput(format!("{} must be a UUID", name)))
}

/// Collect `file`, `productId` and `ownerId` from the form.
async fn read_import_form(mut multipart: Multipart) -> Result<IngestRequest, HttpAppError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut product_id = None;
    let mut owner_id = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("archive.zip").to_string();
                let data = field.bytes().await?;
                tracing::debug!(file_name = %file_name, size_bytes = data.len(), "Archive received");
                file = Some((file_name, data));
            }
            "productId" => {
                product_id = Some(parse_uuid_field("productId", &field.text().await?)?);
            }
            "ownerId" => {
                owner_id = Some(parse_uuid_field("ownerId", &field.text().await?)?);
            }
            other => {
                tracing::debug!(field = %other, "Ignoring unexpected form field");
            }
        }
    }

    let (file_name, data) =
        file.ok_or_else(|| AppError::InvalidInput("Missing 'file' field".to_string()))?;
    let product_id =
        product_id.ok_or_else(|| AppError::InvalidInput("Missing 'productId' field".to_string()))?;
    let owner_id =
        owner_id.ok_or_else(|| AppError::InvalidInput("Missing 'ownerId' field".to_string()))?;

    Ok(IngestRequest {
        product_id,
        owner_id,
        source: ArchiveSource::Upload { file_name, data },
    })
}

/// Run the pipeline on its own task and stream its events.
///
/// The task is not tied to the response: if the client goes away the
/// pipeline still finishes its uploads and the record update.
fn stream_ingestion(
    state: &AppState,
    request: IngestRequest,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (progress, receiver) = progress_channel();
    let pipeline = state.pipeline.clone();

    let span = tracing::info_span!(
        "xr_import",
        product_id = %request.product_id,
        owner_id = %request.owner_id
    );
    tokio::spawn(
        async move {
            pipeline.run(request, &progress).await;
        }
        .instrument(span),
    );

    let events = stream::unfold(receiver, |mut receiver| async move {
        let event = receiver.recv().await?;
        let frame = Event::default()
            .json_data(&event)
            .unwrap_or_else(|_| Event::default().comment("serialization error"));
        Some((Ok::<_, Infallible>(frame), receiver))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Import a KeyShot XR export into a product
#[utoipa::path(
    post,
    path = "/api/v0/products/xr-import",
    tag = "products",
    request_body(
        content = XrImportForm,
        content_type = "multipart/form-data",
        description = "The archive as a multipart form. An `application/json` body shaped like StagedImportRequest is accepted as well."
    ),
    responses(
        (status = 200, description = "Stream of progress events ending with `complete` or `error`", content_type = "text/event-stream", body = String),
        (status = 400, description = "Malformed request", body = crate::error::ErrorResponse),
        (status = 413, description = "Request body too large", body = crate::error::ErrorResponse),
        (status = 415, description = "Neither multipart nor JSON", body = crate::error::ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = crate::error::ErrorResponse)
    )
)]
pub async fn import_xr_archive(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, HttpAppError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let ingest_request = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &state).await?;
        read_import_form(multipart).await?
    } else if content_type.starts_with("application/json") {
        let ValidatedJson(body) =
            ValidatedJson::<StagedImportRequest>::from_request(request, &state).await?;
        body.into_ingest_request()?
    } else {
        return Err(AppError::UnsupportedArchive(
            "Expected a multipart/form-data or application/json body".to_string(),
        )
        .into());
    };

    tracing::info!(
        product_id = %ingest_request.product_id,
        owner_id = %ingest_request.owner_id,
        staged = matches!(ingest_request.source, ArchiveSource::Staged { .. }),
        "Starting XR import"
    );

    Ok(stream_ingestion(&state, ingest_request).into_response())
}
