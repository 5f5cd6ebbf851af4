//! HTTP and WebSocket clients for the league server.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest`.

mod admin;
mod racer;
mod relay;
mod stream;

pub use admin::AdminClient;
pub use racer::RacerClient;
pub use relay::RelayClient;
pub use stream::SnapshotStream;

use reqwest::StatusCode;
use url::Url;

use crate::objects::ApiErrorBody;
use crate::signature::SignatureError;

/// Errors produced by the SDK clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// HMAC signature could not be computed.
    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),

    /// The server returned a non-2xx status code.
    #[error("api error: status {status}, {kind}: {message}")]
    Api {
        status: StatusCode,
        kind: String,
        message: String,
    },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The endpoint URL could not be built from the base URL.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// WebSocket handshake or transport failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl ClientError {
    /// The server-side error kind (e.g. `already_queued`), if this is an API
    /// error.
    pub fn api_kind(&self) -> Option<&str> {
        match self {
            ClientError::Api { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

/// Append path segments to `base`, percent-encoding each one.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ClientError> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
        path.pop_if_empty().extend(segments);
    }
    Ok(url)
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let (kind, message) = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(parsed) => (parsed.error, parsed.message),
            Err(_) => ("unknown".to_owned(), body),
        };
        return Err(ClientError::Api {
            status,
            kind,
            message,
        });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_segments() {
        let base = Url::parse("http://localhost:8080/").unwrap();
        let url = endpoint(&base, &["api", "v1", "racers", "a b/c", "ready"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/v1/racers/a%20b%2Fc/ready"
        );
    }
}
