//! Invitation redemption for media-server backends.
//!
//! Gatehouse turns one invitation code into accounts on every backend the
//! invitation targets (Plex, Jellyfin), with all-or-nothing semantics: either
//! every account is provisioned and committed as one local identity, or every
//! account created along the way is compensated away.
//!
//! The crate is organised hexagonally. [`domain`] holds the value types, the
//! ports (backend client, client registry, invitation validator, identity
//! repository), and the redemption saga that drives them. [`outbound`] holds
//! the concrete adapters: HTTP clients for each backend kind and the registry
//! that resolves a backend kind to its client factory.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use gatehouse::domain::RedemptionService;
//! use gatehouse::domain::ports::{FixtureIdentityRepository, InvitationValidator};
//! use gatehouse::outbound::ClientRegistry;
//!
//! # fn wire(validator: impl InvitationValidator + 'static) -> Result<(), reqwest::Error> {
//! let registry = Arc::new(ClientRegistry::with_default_backends()?);
//! let repository = Arc::new(FixtureIdentityRepository);
//! let service = RedemptionService::new(Arc::new(validator), registry, repository);
//! # let _ = service;
//! # Ok(())
//! # }
//! ```

pub mod domain;
pub mod outbound;
pub mod telemetry;
