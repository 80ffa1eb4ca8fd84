//! Client registry: the one lookup point from backend kind to client.
//!
//! The registry is populated during process initialisation and read-only
//! afterwards; lookups from concurrent redemption attempts need no locking.
//! Share it as `Arc<ClientRegistry>` and inject it into the redemption
//! service rather than reaching for a global.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::ports::{BackendClient, Capabilities, ClientProvider, RegistryError};
use crate::domain::{BackendConfig, BackendKind};

use super::jellyfin::JellyfinClientFactory;
use super::plex::PlexClientFactory;

/// Factory for attempt-scoped clients of one backend kind.
///
/// Factories own the expensive shared pieces (TLS connection pool) and hand
/// out cheap per-attempt clients; `client_for` is infallible because all
/// fallible construction happens when the factory itself is built.
pub trait BackendClientFactory: Send + Sync {
    /// Backend kind this factory serves.
    fn kind(&self) -> BackendKind;

    /// Static capability declaration, without instantiating a client.
    fn capabilities(&self) -> Capabilities;

    /// Build a client scoped to one redemption attempt.
    fn client_for(&self, config: &BackendConfig) -> Box<dyn BackendClient>;
}

/// Maps backend kinds to their client factories.
#[derive(Default)]
pub struct ClientRegistry {
    factories: HashMap<BackendKind, Arc<dyn BackendClientFactory>>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every built-in backend registered.
    ///
    /// # Errors
    ///
    /// Returns an error when an underlying HTTP client cannot be
    /// constructed (TLS initialisation).
    pub fn with_default_backends() -> Result<Self, reqwest::Error> {
        let mut registry = Self::new();
        registry.register(Arc::new(PlexClientFactory::new()?));
        registry.register(Arc::new(JellyfinClientFactory::new()?));
        Ok(registry)
    }

    /// Register a factory for its backend kind.
    ///
    /// Idempotent; the last registration for a kind wins. Intended for
    /// process start-up only: the registry must not be mutated once shared.
    pub fn register(&mut self, factory: Arc<dyn BackendClientFactory>) {
        self.factories.insert(factory.kind(), factory);
    }

    /// Registered backend kinds, in no particular order.
    pub fn kinds(&self) -> Vec<BackendKind> {
        self.factories.keys().copied().collect()
    }
}

impl ClientProvider for ClientRegistry {
    fn client_for(&self, config: &BackendConfig) -> Result<Box<dyn BackendClient>, RegistryError> {
        let factory = self
            .factories
            .get(&config.kind)
            .ok_or_else(|| RegistryError::unknown_backend_kind(config.kind.as_str()))?;
        Ok(factory.client_for(config))
    }

    fn capabilities_of(&self, kind: BackendKind) -> Result<Capabilities, RegistryError> {
        self.factories
            .get(&kind)
            .map(|factory| factory.capabilities())
            .ok_or_else(|| RegistryError::unknown_backend_kind(kind.as_str()))
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for registry lookup semantics.

    use std::sync::atomic::{AtomicUsize, Ordering};

    use url::Url;

    use crate::domain::ports::{Capability, FixtureBackendClient};
    use crate::domain::BackendRef;

    use super::*;

    const STUB_CAPS: &[Capability] = &[Capability::CreateUser, Capability::DeleteUser];

    struct StubFactory {
        kind: BackendKind,
        label: &'static str,
        instantiated: AtomicUsize,
    }

    impl StubFactory {
        fn new(kind: BackendKind, label: &'static str) -> Self {
            Self {
                kind,
                label,
                instantiated: AtomicUsize::new(0),
            }
        }
    }

    impl BackendClientFactory for StubFactory {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::new(STUB_CAPS)
        }

        fn client_for(&self, config: &BackendConfig) -> Box<dyn BackendClient> {
            self.instantiated.fetch_add(1, Ordering::SeqCst);
            Box::new(FixtureBackendClient::new(BackendRef::new(
                self.kind,
                format!("{}-{}", self.label, config.instance_id),
            )))
        }
    }

    fn config(kind: BackendKind) -> BackendConfig {
        BackendConfig {
            kind,
            endpoint: Url::parse("https://media.example.net").expect("valid url"),
            api_token: "token".to_owned(),
            instance_id: "media-1".to_owned(),
            user_kind: None,
            library_ids: Vec::new(),
        }
    }

    #[test]
    fn lookup_for_unregistered_kind_fails() {
        let registry = ClientRegistry::new();
        let error = registry
            .client_for(&config(BackendKind::Plex))
            .map(|_| ())
            .expect_err("unregistered kind rejected");
        assert_eq!(error, RegistryError::unknown_backend_kind("plex"));
    }

    #[test]
    fn last_registration_for_a_kind_wins() {
        let mut registry = ClientRegistry::new();
        registry.register(Arc::new(StubFactory::new(BackendKind::Plex, "first")));
        registry.register(Arc::new(StubFactory::new(BackendKind::Plex, "second")));

        let client = registry
            .client_for(&config(BackendKind::Plex))
            .expect("registered kind resolves");
        assert_eq!(client.backend().instance_id, "second-media-1");
    }

    #[test]
    fn capabilities_lookup_does_not_instantiate_a_client() {
        let factory = Arc::new(StubFactory::new(BackendKind::Jellyfin, "stub"));
        let mut registry = ClientRegistry::new();
        registry.register(Arc::clone(&factory) as Arc<dyn BackendClientFactory>);

        let capabilities = registry
            .capabilities_of(BackendKind::Jellyfin)
            .expect("registered kind resolves");
        assert!(capabilities.supports(Capability::CreateUser));
        assert_eq!(factory.instantiated.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn default_backends_cover_both_kinds() {
        let registry = ClientRegistry::with_default_backends().expect("builds");
        let mut kinds = registry.kinds();
        kinds.sort();
        assert_eq!(kinds, [BackendKind::Plex, BackendKind::Jellyfin]);
    }
}
