//! Relay configuration.

/// Shared secret of the donation relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Secret key bytes for HMAC verification.
    pub secret: Box<[u8]>,
}

impl RelayConfig {
    pub fn new(secret: impl Into<Box<[u8]>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Get the secret key bytes for HMAC verification.
    pub fn secret_bytes(&self) -> &[u8] {
        &self.secret
    }
}
