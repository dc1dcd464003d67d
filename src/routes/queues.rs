use axum::extract::{rejection::PathRejection, Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::queue::{EnqueueRequest, QueueEntry, QueueKind};

/// POST /api/v1/queues/{kind} — queue an item for the watcher.
pub async fn enqueue(
    State(state): State<AppState>,
    kind: Result<Path<QueueKind>, PathRejection>,
    Json(req): Json<EnqueueRequest>,
) -> Result<(StatusCode, Json<QueueEntry>), ApiError> {
    let Path(kind) = kind?;
    req.validate()?;

    let item = state.dispatcher.find_item(req.job_id, req.item_num).await?;
    let entry = state.store.enqueue(kind, item.id).await?;
    metrics::counter!("queue_entries_enqueued_total", "queue" => kind.table()).increment(1);

    tracing::info!(
        entry_id = entry.id,
        job_id = req.job_id,
        item_num = req.item_num,
        queue = %kind,
        "Item queued"
    );
    Ok((StatusCode::CREATED, Json(entry)))
}

/// GET /api/v1/queues/{kind}/pending
pub async fn pending(
    State(state): State<AppState>,
    kind: Result<Path<QueueKind>, PathRejection>,
) -> Result<Json<Vec<QueueEntry>>, ApiError> {
    let Path(kind) = kind?;
    Ok(Json(state.store.pending_entries(kind).await?))
}
