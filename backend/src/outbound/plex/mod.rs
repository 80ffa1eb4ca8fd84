//! Plex adapter: account management via plex.tv plus the OAuth PIN flow.

mod auth;
mod client;
mod dto;
mod pin_store;

pub use auth::{PinAuthenticator, PinFlowError};
pub use client::{PlexClient, PlexClientFactory, PlexHttpSettings};
pub use pin_store::{
    DEFAULT_PIN_TTL_SECONDS, PIN_TTL_JITTER_SECONDS, PinStore, PlexPin,
};
