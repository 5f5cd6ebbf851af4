//! Admin API handlers.
//!
//! These endpoints are called by the stream operator and require the
//! `Kart-Admin-Authorization` header with the plaintext admin secret.

use axum::{Json, Router, extract::State, routing::post};
use kart_sdk::StateSnapshot;
use kart_sdk::objects::admin::{RaceResultsResponse, StagingResponse};

use super::ApiError;
use crate::api::extractors::AdminAuth;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/staging", post(trigger_staging))
        .route("/end", post(end_race))
        .route("/reset", post(reset))
}

/// `POST /staging`: freeze the grid and start the ready-check.
async fn trigger_staging(
    State(state): State<AppState>,
    _auth: AdminAuth,
) -> Result<Json<StagingResponse>, ApiError> {
    let ticket = state.coordinator.trigger_staging().await?;
    tracing::info!(
        race_id = %ticket.race_id,
        racers = ticket.roster.len(),
        "Staging triggered by admin"
    );
    Ok(Json(ticket.to_response()))
}

/// `POST /end`: end the race and return the final payouts.
async fn end_race(
    State(state): State<AppState>,
    _auth: AdminAuth,
) -> Result<Json<RaceResultsResponse>, ApiError> {
    let outcome = state.coordinator.end_race().await?;
    Ok(Json(outcome.to_response()))
}

/// `POST /reset`: returns the now empty snapshot.
async fn reset(
    State(state): State<AppState>,
    _auth: AdminAuth,
) -> Result<Json<StateSnapshot>, ApiError> {
    let summary = state.coordinator.reset().await?;
    tracing::info!(
        race_id = ?summary.race_id,
        racers = summary.racers.len(),
        "League reset by admin"
    );
    Ok(Json(state.coordinator.snapshot().await))
}
