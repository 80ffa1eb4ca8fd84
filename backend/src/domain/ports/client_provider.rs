//! Port for resolving backend clients from target configuration.
//!
//! The concrete implementation is the client registry in the outbound layer:
//! a map from [`BackendKind`] to a client factory, populated once at process
//! start and read-only afterwards.

use crate::domain::{BackendConfig, BackendKind};

use super::backend_client::{BackendClient, Capabilities};
use super::define_port_error;

define_port_error! {
    /// Errors raised by client provider implementations.
    pub enum RegistryError {
        /// The backend type was never registered; a deployment
        /// misconfiguration rather than user input.
        UnknownBackendKind { kind: String } =>
            "no backend client registered for kind {kind}",
    }
}

/// Port for obtaining attempt-scoped backend clients.
#[cfg_attr(test, mockall::automock)]
pub trait ClientProvider: Send + Sync {
    /// Build a client for the given backend configuration.
    ///
    /// Never returns a partially constructed client: the only failure mode
    /// is an unregistered backend kind.
    fn client_for(&self, config: &BackendConfig) -> Result<Box<dyn BackendClient>, RegistryError>;

    /// Static capability declaration for a backend kind, without
    /// instantiating a client.
    fn capabilities_of(&self, kind: BackendKind) -> Result<Capabilities, RegistryError>;
}
