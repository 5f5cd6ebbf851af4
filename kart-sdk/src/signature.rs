//! Request signing for the relay API.
//!
//! The relay signs every request body with HMAC-SHA256. The header format
//! is:
//!
//! ```text
//! Kart-Signature: {unix_timestamp}.{base64_signature}
//! ```
//!
//! where the signature is `HMAC-SHA256("{timestamp}.{json_body}", secret)`.

/// Header name for the HMAC signature.
pub const SIGNATURE_HEADER: &str = "Kart-Signature";

/// Header name for admin API authentication (plaintext secret).
pub const ADMIN_AUTH_HEADER: &str = "Kart-Admin-Authorization";

/// Maximum allowed age of a signature (in seconds).
pub const MAX_SIGNATURE_AGE: i64 = 5 * 60;

/// Marker trait for types that can participate in body signing via
/// [`SignedObject`].
pub trait Signature: for<'de> serde::Deserialize<'de> + serde::Serialize {}

/// Errors produced by signature operations.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("invalid header format")]
    InvalidFormat,
    #[error("invalid base64 encoding")]
    InvalidBase64,
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid signature")]
    SignatureMismatch,
    #[error("signature expired")]
    Expired,
}

impl From<ring::error::Unspecified> for SignatureError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

/// A signed request body carrying its typed payload, timestamp, raw JSON,
/// and HMAC-SHA256 signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedObject<T: Signature> {
    pub body: T,
    pub timestamp: i64,
    pub json: String,
    pub signature: Box<[u8]>,
}

impl<T: Signature> SignedObject<T> {
    /// Serialize `body` and sign it with the current timestamp.
    pub fn new(body: T, key: &[u8]) -> Result<Self, serde_json::Error> {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        Self::new_at(body, key, now)
    }

    fn new_at(body: T, key: &[u8], timestamp: i64) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_string(&body)?;
        let data = format!("{timestamp}.{json}");
        let signature = ring::hmac::sign(
            &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
            data.as_bytes(),
        );
        Ok(Self {
            body,
            timestamp,
            json,
            signature: signature.as_ref().to_owned().into_boxed_slice(),
        })
    }

    /// Rebuild from a raw `Kart-Signature` header value and the request body.
    ///
    /// Parses and deserializes only; call [`verify`](Self::verify) to check
    /// the HMAC.
    pub fn from_header_and_body(
        header_value: &str,
        body_json: String,
    ) -> Result<Self, SignatureError> {
        let (timestamp, signature) = parse_signature_header(header_value)?;
        let body: T = serde_json::from_str(&body_json)?;
        Ok(Self {
            body,
            timestamp,
            json: body_json,
            signature,
        })
    }

    /// Verify the HMAC and timestamp freshness, returning the payload.
    pub fn verify(self, key: &[u8]) -> Result<T, SignatureError> {
        let data = format!("{}.{}", self.timestamp, self.json);
        ring::hmac::verify(
            &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
            data.as_bytes(),
            self.signature.as_ref(),
        )?;
        check_timestamp(self.timestamp)?;
        Ok(self.body)
    }

    /// Format the full `Kart-Signature` header value.
    pub fn to_header(&self) -> String {
        format_signature_header(self.timestamp, &self.signature)
    }
}

/// Parse a `{timestamp}.{base64}` header value.
pub fn parse_signature_header(value: &str) -> Result<(i64, Box<[u8]>), SignatureError> {
    let (timestamp, encoded) = value.split_once('.').ok_or(SignatureError::InvalidFormat)?;
    let timestamp: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::InvalidFormat)?;
    let signature_bytes = fast32::base64::RFC4648_NOPAD
        .decode_str(encoded)
        .map_err(|_| SignatureError::InvalidBase64)?
        .into_boxed_slice();
    Ok((timestamp, signature_bytes))
}

pub fn format_signature_header(timestamp: i64, signature: &[u8]) -> String {
    format!(
        "{}.{}",
        timestamp,
        fast32::base64::RFC4648_NOPAD.encode(signature)
    )
}

/// Check that a signature timestamp is within [`MAX_SIGNATURE_AGE`].
pub fn check_timestamp(timestamp: i64) -> Result<(), SignatureError> {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    if now - timestamp > MAX_SIGNATURE_AGE {
        return Err(SignatureError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::money::Money;
    use crate::objects::relay::DonationRequest;

    fn donation() -> DonationRequest {
        DonationRequest {
            racer_id: "r1".into(),
            amount: Money::from_cents(500),
            donor: Some("cocoa_fan".to_owned()),
        }
    }

    #[test]
    fn test_signed_header_verifies() {
        let signed = SignedObject::new(donation(), b"relay-secret").unwrap();
        let parsed =
            SignedObject::<DonationRequest>::from_header_and_body(&signed.to_header(), signed.json)
                .unwrap();
        assert_eq!(parsed.verify(b"relay-secret").unwrap(), donation());
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let signed = SignedObject::new(donation(), b"relay-secret").unwrap();
        assert!(matches!(
            signed.verify(b"other-secret"),
            Err(SignatureError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let signed = SignedObject::new(donation(), b"relay-secret").unwrap();
        let tampered = signed.json.replace("500", "50000");
        let parsed =
            SignedObject::<DonationRequest>::from_header_and_body(&signed.to_header(), tampered)
                .unwrap();
        assert!(parsed.verify(b"relay-secret").is_err());
    }

    #[test]
    fn test_stale_signature_is_rejected() {
        let stale = time::OffsetDateTime::now_utc().unix_timestamp() - MAX_SIGNATURE_AGE - 10;
        let signed = SignedObject::new_at(donation(), b"relay-secret", stale).unwrap();
        assert!(matches!(
            signed.verify(b"relay-secret"),
            Err(SignatureError::Expired)
        ));
    }

    #[test]
    fn test_malformed_header() {
        assert!(matches!(
            parse_signature_header("no-dot-here"),
            Err(SignatureError::InvalidFormat)
        ));
        assert!(matches!(
            parse_signature_header("123.***"),
            Err(SignatureError::InvalidBase64)
        ));
    }
}
