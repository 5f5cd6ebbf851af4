//! Participant API handlers. Unauthenticated.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use kanau::processor::Processor;
use kart_core::entities::players::UpsertPlayer;
use kart_core::entities::queue::{EnqueuePlayer, QueueInsert};
use kart_sdk::objects::racer::{JoinRequest, JoinResponse, ReadyResponse};

use super::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/join", post(join))
        .route("/{racer_id}/ready", post(ready))
}

/// `POST /join`: take the next grid slot.
///
/// The coordinator decides; the player row and queue entry are written
/// afterwards so a restart can rebuild the grid. A failed write is logged
/// and does not undo the join.
async fn join(
    State(state): State<AppState>,
    Json(request): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, ApiError> {
    if request.racer_id.trim().is_empty() {
        return Err(ApiError::BadRequest("racer_id must not be empty"));
    }
    if request.display_name.trim().is_empty() {
        return Err(ApiError::BadRequest("display_name must not be empty"));
    }

    let enqueued = state
        .coordinator
        .enqueue(request.racer_id.clone(), request.display_name.clone())
        .await?;

    let racer_id = request.racer_id.clone();
    persist_join(&state, request).await;

    Ok(Json(JoinResponse {
        racer_id,
        grid_position: enqueued.grid_position,
        queued: enqueued.queued,
        max_racers: enqueued.max_racers,
    }))
}

async fn persist_join(state: &AppState, request: JoinRequest) {
    let processor = state.processor();
    let racer_id = request.racer_id.clone();

    let upsert = UpsertPlayer {
        racer_id: request.racer_id,
        display_name: request.display_name,
        avatar_url: request.avatar_url,
    };
    if let Err(e) = processor.process(upsert).await {
        tracing::warn!(racer_id = %racer_id, error = %e, "Failed to persist player");
        return;
    }

    match processor
        .process(EnqueuePlayer {
            racer_id: racer_id.clone(),
        })
        .await
    {
        Ok(QueueInsert::Inserted { entry_id }) => {
            tracing::debug!(racer_id = %racer_id, entry_id, "Queue entry persisted");
        }
        Ok(QueueInsert::AlreadyQueued) => {
            tracing::debug!(racer_id = %racer_id, "Queue entry already present");
        }
        Err(e) => {
            tracing::warn!(racer_id = %racer_id, error = %e, "Failed to persist queue entry");
        }
    }
}

/// `POST /{racer_id}/ready`
async fn ready(
    State(state): State<AppState>,
    Path(racer_id): Path<String>,
) -> Result<Json<ReadyResponse>, ApiError> {
    let outcome = state.coordinator.confirm_ready(&racer_id).await?;
    Ok(Json(outcome.into()))
}
