//! Outbound adapters: concrete clients behind the domain ports.

pub(crate) mod http;

pub mod jellyfin;
pub mod plex;
pub mod registry;

pub use registry::{BackendClientFactory, ClientRegistry};
