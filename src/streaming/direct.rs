//! Direct streaming with HTTP range requests.
//!
//! Serves an original upload or one of its quality variants. A requested
//! variant that has not been produced yet silently falls back to the
//! original so playback never waits on the transcoder.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use reelhouse_common::paths::{content_type_for, variant_file_name};
use reelhouse_common::quality::ORIGINAL;
use reelhouse_common::{Error, Result};

use super::cache::{self, CacheValidator, Freshness};
use super::range::resolve_range;
use super::writer::StreamWriter;
use crate::server::{AppContext, AppError};
use crate::store::{MediaAsset, MediaStore};

/// `GET /stream/{filename}`
pub async fn stream_original(
    State(ctx): State<AppContext>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> std::result::Result<Response, AppError> {
    Ok(serve(&ctx, &filename, None, &headers).await?)
}

/// `GET /stream/{filename}/{quality}`
pub async fn stream_variant(
    State(ctx): State<AppContext>,
    Path((filename, quality)): Path<(String, String)>,
    headers: HeaderMap,
) -> std::result::Result<Response, AppError> {
    Ok(serve(&ctx, &filename, Some(&quality), &headers).await?)
}

/// Find the file to serve for `filename` at `quality`.
///
/// Absent, empty, or `original` quality means the upload itself. Any other
/// name is tried as a variant first.
pub async fn resolve_target(
    store: &MediaStore,
    filename: &str,
    quality: Option<&str>,
) -> Result<MediaAsset> {
    let quality = quality.filter(|q| !q.is_empty() && *q != ORIGINAL);

    if let Some(quality) = quality {
        let variant = variant_file_name(filename, quality);
        match store.stat(&variant).await {
            Ok(asset) => return Ok(asset),
            Err(Error::ResourceNotFound(_)) => {
                tracing::debug!("Variant {variant} not available, serving original {filename}");
            }
            Err(e) => return Err(e),
        }
    }

    store.stat(filename).await
}

async fn serve(
    ctx: &AppContext,
    filename: &str,
    quality: Option<&str>,
    headers: &HeaderMap,
) -> Result<Response> {
    let asset = resolve_target(&ctx.store, filename, quality).await?;

    let validator = CacheValidator::for_asset(asset.modified, asset.size);
    let last_modified = cache::format_http_date(asset.modified);
    let cache_control = format!("public, max-age={}", ctx.config.streaming.cache_max_age_secs);

    if cache::evaluate(headers, &validator, asset.modified) == Freshness::NotModified {
        return Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header(header::ETAG, validator.as_str())
            .header(header::LAST_MODIFIED, &last_modified)
            .header(header::CACHE_CONTROL, &cache_control)
            .body(axum::body::Body::empty())
            .map_err(|e| Error::internal(e.to_string()));
    }

    let range_header = match headers.get(header::RANGE) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| Error::malformed_range("non-ASCII Range header"))?,
        ),
        None => None,
    };
    let range = resolve_range(range_header, asset.size)?;

    let file = ctx.store.open(&asset).await?;
    let writer = StreamWriter::new(
        file,
        range,
        asset.size,
        ctx.config.streaming.chunk_size,
        asset.relative.display().to_string(),
    )
    .await?;

    let builder = Response::builder()
        .header(header::CONTENT_TYPE, content_type_for(&asset.path))
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::ETAG, validator.as_str())
        .header(header::LAST_MODIFIED, &last_modified)
        .header(header::CACHE_CONTROL, &cache_control);

    let builder = match range {
        Some(r) => {
            tracing::debug!(
                file = %asset.relative.display(),
                start = r.start,
                end = r.end,
                "Serving partial content"
            );
            builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_RANGE, r.content_range(asset.size))
                .header(header::CONTENT_LENGTH, r.len().to_string())
        }
        None => builder
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, asset.size.to_string()),
    };

    builder
        .body(writer.into_body())
        .map_err(|e| Error::internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_prefers_variant_and_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("movie.mov"), vec![1u8; 100]).unwrap();
        std::fs::write(dir.path().join("movie_720p.mp4"), vec![2u8; 40]).unwrap();
        let store = MediaStore::new(dir.path());

        let asset = resolve_target(&store, "movie.mov", Some("720p")).await.unwrap();
        assert_eq!(asset.size, 40);

        let asset = resolve_target(&store, "movie.mov", Some("480p")).await.unwrap();
        assert_eq!(asset.size, 100);

        let asset = resolve_target(&store, "movie.mov", Some("original")).await.unwrap();
        assert_eq!(asset.size, 100);

        let asset = resolve_target(&store, "movie.mov", None).await.unwrap();
        assert_eq!(asset.size, 100);
    }

    #[tokio::test]
    async fn resolve_missing_original_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());

        let err = resolve_target(&store, "nope.mp4", Some("720p")).await.unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound(_)));
    }
}
