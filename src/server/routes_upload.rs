//! Video upload endpoint.

use axum::{
    extract::{multipart::Field, Multipart, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use reelhouse_common::paths::{sanitize_file_name, sniff_video, SNIFF_LEN};
use reelhouse_common::{Error, JobId, Result};
use std::path::PathBuf;

use super::{AppContext, AppError};

/// Multipart field carrying the file.
const UPLOAD_FIELD: &str = "video";

/// Where browsers are sent after a successful upload.
const REDIRECT_TO: &str = "/videos";

/// Header carrying the id of the transcode job started for the upload.
pub const JOB_ID_HEADER: HeaderName = HeaderName::from_static("x-job-id");

/// `POST /upload`
///
/// Stores the `video` part under the media root and queues a transcode job
/// for the configured quality ladder. The request does not wait for the
/// transcode.
pub async fn upload(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> std::result::Result<Response, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::invalid_input(format!("bad multipart body: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let path = receive_video(&ctx, field).await?;
        let job = queue_transcode(&ctx, path);

        let mut response = (StatusCode::SEE_OTHER, [(header::LOCATION, REDIRECT_TO)]).into_response();
        if let Some(id) = job {
            if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
                response.headers_mut().insert(JOB_ID_HEADER, value);
            }
        }
        return Ok(response);
    }

    Err(Error::invalid_input(format!("missing '{UPLOAD_FIELD}' file field")).into())
}

/// Validate and persist one multipart field, returning the stored path.
async fn receive_video(ctx: &AppContext, mut field: Field<'_>) -> Result<PathBuf> {
    let file_name = field
        .file_name()
        .and_then(sanitize_file_name)
        .ok_or_else(|| Error::invalid_input("upload has no usable file name"))?;

    let content_type = field.content_type().unwrap_or_default().to_string();
    if !content_type.starts_with("video/") {
        return Err(Error::invalid_input(format!(
            "content type {content_type:?} is not a video"
        )));
    }

    let mut sink = ctx.store.begin_upload(&file_name).await?;
    let mut head: Vec<u8> = Vec::with_capacity(SNIFF_LEN);
    let mut sniffed = false;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| Error::invalid_input(format!("upload interrupted: {e}")))?
    {
        if !sniffed {
            let take = (SNIFF_LEN - head.len()).min(chunk.len());
            head.extend_from_slice(&chunk[..take]);
            if head.len() >= SNIFF_LEN {
                check_signature(&file_name, &head)?;
                sniffed = true;
            }
        }
        sink.write(&chunk).await?;
    }

    if !sniffed {
        check_signature(&file_name, &head)?;
    }

    let size = sink.written();
    let path = sink.commit().await?;
    tracing::info!(file = %file_name, size, "Stored upload");
    Ok(path)
}

fn check_signature(file_name: &str, head: &[u8]) -> Result<()> {
    match sniff_video(head) {
        Some(kind) => {
            tracing::debug!(file = %file_name, "Detected {kind}");
            Ok(())
        }
        None => Err(Error::invalid_input(format!(
            "{file_name} does not look like a video file"
        ))),
    }
}

fn queue_transcode(ctx: &AppContext, path: PathBuf) -> Option<JobId> {
    if !ctx.config.transcode.enabled {
        return None;
    }

    let qualities = ctx.config.transcode.qualities.clone();
    match ctx
        .transcoder
        .submit(path, ctx.store.root().to_path_buf(), qualities)
    {
        Ok(id) => Some(id),
        Err(e) => {
            // The upload itself succeeded; variants can be produced later.
            tracing::warn!("Upload stored but not queued for transcoding: {e}");
            None
        }
    }
}
