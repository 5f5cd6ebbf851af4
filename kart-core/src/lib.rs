#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod broadcast;
pub mod config;
pub mod coordinator;
pub mod entities;
pub mod events;
pub mod framework;
pub mod payout;
pub mod processors;
pub mod session;
