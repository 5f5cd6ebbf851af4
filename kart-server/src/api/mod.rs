//! HTTP API.
//!
//! # Endpoints
//!
//! - `GET  /api/v1/state`                    – current snapshot
//! - `POST /api/v1/racers/join`              – join the grid
//! - `POST /api/v1/racers/{racer_id}/ready`  – confirm during the ready-check
//! - `POST /api/v1/relay/donations`          – credit a donation (signed)
//! - `POST /api/v1/relay/vibe`               – toggle the vibe bonus (signed)
//! - `POST /api/v1/admin/staging`            – start the ready-check (admin)
//! - `POST /api/v1/admin/end`                – end the race and settle (admin)
//! - `POST /api/v1/admin/reset`              – clear the league (admin)
//! - `GET  /ws`                              – live snapshot stream

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use kart_core::coordinator::RaceError;
use kart_sdk::StateSnapshot;
use kart_sdk::objects::ApiErrorBody;

use crate::state::AppState;

pub mod admin;
pub mod extractors;
pub mod racers;
pub mod relay;
pub mod ws;

/// Build the `/api/v1` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/state", get(current_state))
        .nest("/racers", racers::router())
        .nest("/relay", relay::router())
        .nest("/admin", admin::router())
}

/// `GET /state`: the same snapshot viewers get over the socket.
async fn current_state(State(state): State<AppState>) -> Json<StateSnapshot> {
    Json(state.coordinator.snapshot().await)
}

/// Errors returned by API handlers.
#[derive(Debug)]
pub enum ApiError {
    Race(RaceError),
    BadRequest(&'static str),
}

impl From<RaceError> for ApiError {
    fn from(err: RaceError) -> Self {
        ApiError::Race(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Race(RaceError::UnknownRacer { .. }) => StatusCode::NOT_FOUND,
            ApiError::Race(
                RaceError::AlreadyQueued { .. }
                | RaceError::RosterFull { .. }
                | RaceError::WrongPhase { .. }
                | RaceError::InsufficientRacers { .. },
            ) => StatusCode::CONFLICT,
            ApiError::Race(RaceError::ReadyTimeoutOutOfRange { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Race(e) => ApiErrorBody {
                error: e.kind().to_owned(),
                message: e.to_string(),
            },
            ApiError::BadRequest(message) => ApiErrorBody {
                error: "bad_request".to_owned(),
                message: message.to_owned(),
            },
        };
        (status, Json(body)).into_response()
    }
}
