//! Participant client (platform command layer → league server).

use reqwest::Client;
use url::Url;

use super::{ClientError, endpoint, parse_response};
use crate::objects::StateSnapshot;
use crate::objects::racer::{JoinRequest, JoinResponse, ReadyResponse};

/// Typed client for the unauthenticated participant endpoints.
#[derive(Debug, Clone)]
pub struct RacerClient {
    http: Client,
    base_url: Url,
}

impl RacerClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /api/v1/racers/join` – put a participant on the grid.
    pub async fn join(&self, request: &JoinRequest) -> Result<JoinResponse, ClientError> {
        let url = endpoint(&self.base_url, &["api", "v1", "racers", "join"])?;
        let resp = self.http.post(url).json(request).send().await?;
        parse_response(resp).await
    }

    /// `POST /api/v1/racers/{racer_id}/ready` – answer the ready-check.
    pub async fn confirm_ready(&self, racer_id: &str) -> Result<ReadyResponse, ClientError> {
        let url = endpoint(&self.base_url, &["api", "v1", "racers", racer_id, "ready"])?;
        let resp = self.http.post(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/v1/state` – one-off snapshot, for callers that cannot hold
    /// a WebSocket open.
    pub async fn state(&self) -> Result<StateSnapshot, ClientError> {
        let url = endpoint(&self.base_url, &["api", "v1", "state"])?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }
}
