//! Admin client (league operator → league server).
//!
//! All requests carry the plaintext admin secret in the
//! `Kart-Admin-Authorization` header, verified server-side against an
//! argon2 hash.

use reqwest::Client;
use url::Url;

use super::{ClientError, endpoint, parse_response};
use crate::objects::StateSnapshot;
use crate::objects::admin::{RaceResultsResponse, StagingResponse};
use crate::signature::ADMIN_AUTH_HEADER;

/// Typed client for the admin API.
#[derive(Debug, Clone)]
pub struct AdminClient {
    http: Client,
    base_url: Url,
    admin_secret: String,
}

impl AdminClient {
    pub fn new(base_url: Url, admin_secret: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            admin_secret: admin_secret.into(),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /api/v1/admin/staging` – freeze the grid and start the
    /// ready-check.
    pub async fn trigger_staging(&self) -> Result<StagingResponse, ClientError> {
        self.post(&["api", "v1", "admin", "staging"]).await
    }

    /// `POST /api/v1/admin/end` – finish the race and compute payouts.
    pub async fn end_race(&self) -> Result<RaceResultsResponse, ClientError> {
        self.post(&["api", "v1", "admin", "end"]).await
    }

    /// `POST /api/v1/admin/reset` – clear the finished race.
    pub async fn reset(&self) -> Result<StateSnapshot, ClientError> {
        self.post(&["api", "v1", "admin", "reset"]).await
    }

    async fn post<R: serde::de::DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> Result<R, ClientError> {
        let url = endpoint(&self.base_url, segments)?;
        let resp = self
            .http
            .post(url)
            .header(ADMIN_AUTH_HEADER, &self.admin_secret)
            .send()
            .await?;
        parse_response(resp).await
    }
}
