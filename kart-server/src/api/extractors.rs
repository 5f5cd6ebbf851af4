//! Custom Axum extractors for request authentication.
//!
//! Provides:
//! - `SignedBody<T>`: verifies the `Kart-Signature` header against a signed
//!   JSON body (used by the donation relay).
//! - `AdminAuth`: checks the `Kart-Admin-Authorization` header against the
//!   hashed admin secret (used by the admin API).
//!
//! All cryptographic operations are delegated to [`kart_sdk::signature`].

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Request},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use kart_sdk::objects::ApiErrorBody;
use kart_sdk::signature::{ADMIN_AUTH_HEADER, SIGNATURE_HEADER, Signature, SignatureError, SignedObject};

use crate::state::AppState;

const MAX_BODY_BYTES: usize = 64 * 1024;

fn reject(status: StatusCode, error: &str, message: &str) -> Response {
    (
        status,
        Json(ApiErrorBody {
            error: error.to_owned(),
            message: message.to_owned(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// SignedBody: relay authentication via signed JSON body
// ---------------------------------------------------------------------------

/// An Axum extractor that verifies the `Kart-Signature` header and
/// deserializes + authenticates the JSON request body.
///
/// # Header format
///
/// ```text
/// Kart-Signature: {unix_timestamp}.{base64_signature}
/// ```
///
/// The signature is computed as `HMAC-SHA256("{timestamp}.{json_body}", relay_secret)`.
pub struct SignedBody<T: Signature>(pub T);

/// Errors that can occur during signed-body verification.
#[derive(Debug, thiserror::Error)]
pub enum SignedBodyError {
    #[error("missing Kart-Signature header")]
    MissingHeader,
    #[error("invalid Kart-Signature header format")]
    InvalidHeader,
    #[error("invalid signature encoding")]
    InvalidBase64,
    #[error("failed to read request body")]
    BodyReadError,
    #[error("invalid JSON body: {0}")]
    JsonError(serde_json::Error),
    #[error("signature verification failed")]
    VerificationFailed,
    #[error("signature expired")]
    Expired,
}

impl From<SignatureError> for SignedBodyError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::InvalidFormat => Self::InvalidHeader,
            SignatureError::InvalidBase64 => Self::InvalidBase64,
            SignatureError::Json(e) => Self::JsonError(e),
            SignatureError::SignatureMismatch => Self::VerificationFailed,
            SignatureError::Expired => Self::Expired,
        }
    }
}

impl IntoResponse for SignedBodyError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            SignedBodyError::MissingHeader
            | SignedBodyError::VerificationFailed
            | SignedBodyError::Expired => (StatusCode::UNAUTHORIZED, "unauthorized"),
            SignedBodyError::InvalidHeader
            | SignedBodyError::InvalidBase64
            | SignedBodyError::BodyReadError
            | SignedBodyError::JsonError(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        };
        reject(status, error, &self.to_string())
    }
}

impl<T: Signature + Send> FromRequest<AppState> for SignedBody<T> {
    type Rejection = SignedBodyError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let header_value = req
            .headers()
            .get(SIGNATURE_HEADER)
            .ok_or(SignedBodyError::MissingHeader)?
            .to_str()
            .map_err(|_| SignedBodyError::InvalidHeader)?
            .to_owned();

        let body_bytes = axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|_| SignedBodyError::BodyReadError)?;

        let json =
            String::from_utf8(body_bytes.to_vec()).map_err(|_| SignedBodyError::BodyReadError)?;

        let signed = SignedObject::<T>::from_header_and_body(&header_value, json)?;

        let relay = state.config.relay.read().await;
        let verified_body = signed.verify(relay.secret_bytes())?;
        drop(relay);

        Ok(SignedBody(verified_body))
    }
}

// ---------------------------------------------------------------------------
// AdminAuth: admin API authentication via shared secret
// ---------------------------------------------------------------------------

/// An Axum extractor that checks the plaintext secret carried in
/// `Kart-Admin-Authorization` against the argon2 hash from the config.
///
/// Implements `FromRequestParts` so it can be combined with `Json<T>`,
/// `Path<T>`, etc.
pub struct AdminAuth;

/// Errors returned by the [`AdminAuth`] extractor.
#[derive(Debug, PartialEq, Eq)]
pub enum AdminAuthError {
    MissingHeader,
    InvalidHeader,
    WrongSecret,
}

impl IntoResponse for AdminAuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AdminAuthError::MissingHeader => "missing Kart-Admin-Authorization header",
            AdminAuthError::InvalidHeader => "invalid Kart-Admin-Authorization header",
            AdminAuthError::WrongSecret => "admin secret rejected",
        };
        reject(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }
}

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AdminAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let secret = parts
            .headers
            .get(ADMIN_AUTH_HEADER)
            .ok_or(AdminAuthError::MissingHeader)?
            .to_str()
            .map_err(|_| AdminAuthError::InvalidHeader)?;

        let admin = state.config.admin.read().await;
        if admin.verify_secret(secret) {
            Ok(AdminAuth)
        } else {
            tracing::warn!("Admin request with a wrong secret");
            Err(AdminAuthError::WrongSecret)
        }
    }
}
