//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod backend_client;
mod client_provider;
mod identity_repository;
mod invitation_validator;

#[cfg(test)]
pub use backend_client::MockBackendClient;
pub use backend_client::{
    BackendClient, Capabilities, Capability, ClientError, ClientErrorCode, CreateUserRequest,
    FixtureBackendClient, PermissionUpdate,
};
#[cfg(test)]
pub use client_provider::MockClientProvider;
pub use client_provider::{ClientProvider, RegistryError};
#[cfg(test)]
pub use identity_repository::MockIdentityRepository;
pub use identity_repository::{
    FixtureIdentityRepository, IdentityRepository, IdentityRepositoryError,
};
#[cfg(test)]
pub use invitation_validator::MockInvitationValidator;
pub use invitation_validator::{
    InvitationRejection, InvitationValidationError, InvitationValidator,
};
