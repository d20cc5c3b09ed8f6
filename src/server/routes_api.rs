use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use reelhouse_common::{Error, JobId};
use serde::Serialize;

use super::{AppContext, AppError};
use crate::store::VideoEntry;
use crate::transcode::{available_qualities, JobRecord};

pub fn api_routes() -> Router<AppContext> {
    Router::new()
        .route("/videos", get(list_videos))
        .route("/videos/{filename}/qualities", get(get_qualities))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job))
}

/// `GET /videos` and `GET /api/videos`: the stored originals.
pub async fn list_videos(
    State(ctx): State<AppContext>,
) -> Result<Json<Vec<VideoEntry>>, AppError> {
    Ok(Json(ctx.store.list_videos().await?))
}

#[derive(Debug, Serialize)]
pub struct QualitiesResponse {
    pub filename: String,
    pub qualities: Vec<String>,
}

async fn get_qualities(
    State(ctx): State<AppContext>,
    Path(filename): Path<String>,
) -> Result<Json<QualitiesResponse>, AppError> {
    let original = ctx.store.stat(&filename).await?;
    let qualities = available_qualities(
        ctx.store.root(),
        &original.path,
        &ctx.config.transcode.qualities,
    )
    .await;

    Ok(Json(QualitiesResponse {
        filename,
        qualities,
    }))
}

async fn list_jobs(State(ctx): State<AppContext>) -> Json<Vec<JobRecord>> {
    Json(ctx.transcoder.jobs().list())
}

async fn get_job(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<JobRecord>, AppError> {
    let id: JobId = id
        .parse()
        .map_err(|_| Error::invalid_input(format!("invalid job id: {id}")))?;

    ctx.transcoder
        .jobs()
        .get(id)
        .map(Json)
        .ok_or_else(|| Error::not_found(format!("job {id}")).into())
}
