//! Shared types for the Cozy Kart league server.
//!
//! Everything that crosses the wire lives here so that the server, the
//! relay bridge, and viewer clients agree on one set of definitions.

#![forbid(unsafe_code)]

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
pub mod signature;

pub use objects::money::Money;
pub use objects::race::{RacePhase, RacerStanding, StateSnapshot};
