//! Donation relay payloads.
//!
//! The relay bridges chat/donation platforms into the league. Its requests
//! are body-signed (see [`crate::signature`]) so viewers cannot forge pot
//! updates.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use super::money::Money;
use crate::signature::Signature;

/// `POST /api/v1/relay/donations`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationRequest {
    pub racer_id: CompactString,
    /// Raw donation before any bonus multiplier.
    pub amount: Money,
    /// Display name of the donor, for logs only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donor: Option<String>,
}

impl Signature for DonationRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationResponse {
    pub racer_id: CompactString,
    /// Amount actually credited after the bonus multiplier.
    pub credited: Money,
    pub session_total: Money,
}

/// `POST /api/v1/relay/vibe`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VibeRequest {
    pub racer_id: CompactString,
    pub active: bool,
}

impl Signature for VibeRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VibeResponse {
    pub racer_id: CompactString,
    pub active: bool,
    /// `false` when the flag already had the requested value.
    pub changed: bool,
}
