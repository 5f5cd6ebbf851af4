//! Donation relay handlers.
//!
//! Every request carries a body signed with the relay secret, verified by
//! [`SignedBody`] before the handler runs.

use axum::{Json, Router, extract::State, routing::post};
use kart_sdk::objects::relay::{DonationRequest, DonationResponse, VibeRequest, VibeResponse};

use super::ApiError;
use crate::api::extractors::SignedBody;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/donations", post(donate))
        .route("/vibe", post(set_vibe))
}

/// `POST /donations`: credit a donation to a racing participant.
async fn donate(
    State(state): State<AppState>,
    SignedBody(request): SignedBody<DonationRequest>,
) -> Result<Json<DonationResponse>, ApiError> {
    let receipt = state
        .coordinator
        .update_live_pot(&request.racer_id, request.amount)
        .await?;

    tracing::info!(
        racer_id = %receipt.racer_id,
        donor = request.donor.as_deref().unwrap_or("anonymous"),
        amount = %request.amount,
        credited = %receipt.credited,
        "Donation credited"
    );

    Ok(Json(DonationResponse {
        racer_id: receipt.racer_id,
        credited: receipt.credited,
        session_total: receipt.session_total,
    }))
}

/// `POST /vibe`
async fn set_vibe(
    State(state): State<AppState>,
    SignedBody(request): SignedBody<VibeRequest>,
) -> Result<Json<VibeResponse>, ApiError> {
    let changed = state
        .coordinator
        .toggle_vibe_bonus(&request.racer_id, request.active)
        .await?;

    Ok(Json(VibeResponse {
        racer_id: request.racer_id,
        active: request.active,
        changed,
    }))
}
