//! Relay client (donation bridge → league server).
//!
//! All requests use body-signed HMAC-SHA256 authentication via
//! [`SignedObject`].

use reqwest::Client;
use url::Url;

use super::{ClientError, endpoint, parse_response};
use crate::objects::relay::{DonationRequest, DonationResponse, VibeRequest, VibeResponse};
use crate::signature::{SIGNATURE_HEADER, Signature, SignedObject};

/// Typed client for the relay API.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: Client,
    base_url: Url,
    secret: Vec<u8>,
}

impl RelayClient {
    /// * `base_url` – root URL of the league server.
    /// * `relay_secret` – the shared HMAC secret for body signing.
    pub fn new(base_url: Url, relay_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            secret: relay_secret.into(),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /api/v1/relay/donations` – credit a donation to a racer's pot.
    pub async fn donate(&self, request: DonationRequest) -> Result<DonationResponse, ClientError> {
        self.post_signed(&["api", "v1", "relay", "donations"], request)
            .await
    }

    /// `POST /api/v1/relay/vibe` – switch a racer's vibe bonus on or off.
    pub async fn set_vibe(&self, request: VibeRequest) -> Result<VibeResponse, ClientError> {
        self.post_signed(&["api", "v1", "relay", "vibe"], request)
            .await
    }

    async fn post_signed<B: Signature, R: serde::de::DeserializeOwned>(
        &self,
        segments: &[&str],
        body: B,
    ) -> Result<R, ClientError> {
        let signed = SignedObject::new(body, &self.secret)?;
        let url = endpoint(&self.base_url, segments)?;

        let resp = self
            .http
            .post(url)
            .header(SIGNATURE_HEADER, signed.to_header())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(signed.json)
            .send()
            .await?;

        parse_response(resp).await
    }
}
