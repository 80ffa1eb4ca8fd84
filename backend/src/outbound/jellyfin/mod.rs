//! Jellyfin adapter: locally managed accounts with full capability coverage.

mod client;
mod dto;

pub use client::{JellyfinClient, JellyfinClientFactory, JellyfinHttpSettings};
