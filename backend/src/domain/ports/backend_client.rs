//! Port for account management on one external media backend.
//!
//! A backend client adapts one account-management API (Plex, Jellyfin) to a
//! uniform contract. Clients declare the operations they support through
//! [`Capabilities`]; callers consult the declaration before dispatch so an
//! unsupported operation is rejected without reaching the network layer.
//!
//! Every client instance is scoped to a single redemption attempt: it is
//! constructed for one [`BackendConfig`](crate::domain::BackendConfig),
//! exclusively owned by that attempt, and releases its connection resources
//! on drop.

use std::fmt;

use async_trait::async_trait;

use crate::domain::{
    BackendRef, ExternalAccount, ExternalUserId, LibraryId, UserKind, Username,
};

/// A named optional operation a backend client may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Provision a new account.
    CreateUser,
    /// Remove an existing account.
    DeleteUser,
    /// Enable or disable sign-in for an account.
    EnableDisable,
    /// Restrict an account to a subset of libraries.
    LibraryAccess,
    /// Adjust per-account permission flags.
    PermissionUpdate,
}

impl Capability {
    /// Stable string tag used in telemetry.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateUser => "create_user",
            Self::DeleteUser => "delete_user",
            Self::EnableDisable => "enable_disable",
            Self::LibraryAccess => "library_access",
            Self::PermissionUpdate => "permission_update",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared capability set of one backend type.
///
/// Declarations are static per backend type, so the set borrows a constant
/// slice rather than allocating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities(&'static [Capability]);

impl Capabilities {
    /// Wrap a static capability declaration.
    pub const fn new(capabilities: &'static [Capability]) -> Self {
        Self(capabilities)
    }

    /// Whether the backend declares the given capability.
    pub fn supports(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    /// Declared capabilities in declaration order.
    pub const fn as_slice(&self) -> &'static [Capability] {
        self.0
    }
}

/// Stable failure category carried by [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientErrorCode {
    /// An account with this identity already exists on the backend.
    UserAlreadyExists,
    /// The requested username is taken by another account.
    UsernameTaken,
    /// The requested account class needs an email and none was supplied.
    EmailRequired,
    /// The backend rejected the client's admin credential.
    InvalidCredentials,
    /// The backend could not be reached or timed out.
    ConnectionError,
    /// The operation is not part of this backend's capability set.
    Unsupported,
    /// Anything the client could not classify.
    Unknown,
}

impl ClientErrorCode {
    /// Stable string tag used in telemetry.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserAlreadyExists => "user_already_exists",
            Self::UsernameTaken => "username_taken",
            Self::EmailRequired => "email_required",
            Self::InvalidCredentials => "invalid_credentials",
            Self::ConnectionError => "connection_error",
            Self::Unsupported => "unsupported",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ClientErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure raised by a backend client.
///
/// Carries the failed operation, the owning backend instance, a stable
/// [`ClientErrorCode`], and an optional upstream cause string. Raw transport
/// errors never cross the client boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientError {
    operation: &'static str,
    backend: BackendRef,
    code: ClientErrorCode,
    cause: Option<String>,
}

impl ClientError {
    /// Construct an error without an upstream cause.
    pub fn new(operation: &'static str, backend: BackendRef, code: ClientErrorCode) -> Self {
        Self {
            operation,
            backend,
            code,
            cause: None,
        }
    }

    /// Attach the upstream cause string.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Helper for transport-level failures.
    pub fn connection(
        operation: &'static str,
        backend: BackendRef,
        cause: impl Into<String>,
    ) -> Self {
        Self::new(operation, backend, ClientErrorCode::ConnectionError).with_cause(cause)
    }

    /// Helper for operations outside the backend's capability set.
    pub fn unsupported(operation: &'static str, backend: BackendRef) -> Self {
        Self::new(operation, backend, ClientErrorCode::Unsupported)
    }

    /// Name of the failed operation.
    pub const fn operation(&self) -> &'static str {
        self.operation
    }

    /// Backend instance the operation ran against.
    pub const fn backend(&self) -> &BackendRef {
        &self.backend
    }

    /// Stable failure category.
    pub const fn code(&self) -> ClientErrorCode {
        self.code
    }

    /// Upstream cause string, when one was captured.
    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{operation} failed on {backend}: {code}",
            operation = self.operation,
            backend = self.backend,
            code = self.code,
        )?;
        if let Some(cause) = &self.cause {
            write!(f, " ({cause})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ClientError {}

/// Parameters for provisioning one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateUserRequest {
    /// Requested username.
    pub username: Username,
    /// Password for backends with local credential stores; ignored by
    /// backends that authenticate out of band.
    pub password: Option<String>,
    /// Email for backends that invite by address.
    pub email: Option<String>,
    /// Account class to create.
    pub user_kind: UserKind,
}

/// Permission flags to change on an account; `None` leaves a flag untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PermissionUpdate {
    /// Whether the account may download media for offline use.
    pub allow_downloads: Option<bool>,
    /// Whether the account may access live TV.
    pub allow_live_tv: Option<bool>,
    /// Maximum simultaneous sessions; `Some(0)` means unlimited.
    pub max_sessions: Option<u32>,
}

/// Uniform account-management contract over one backend instance.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Identity of the backend instance this client talks to.
    fn backend(&self) -> &BackendRef;

    /// Declared capability set; pure, performs no I/O.
    fn capabilities(&self) -> Capabilities;

    /// Provision an account.
    ///
    /// Fails with [`ClientErrorCode::EmailRequired`] before any network call
    /// when the requested class invites by email and none was supplied.
    async fn create_user(
        &self,
        request: &CreateUserRequest,
    ) -> Result<ExternalAccount, ClientError>;

    /// Remove an account.
    ///
    /// Returns `true` when a live account was found and removed and `false`
    /// when no such account existed; deleting twice is not an error.
    async fn delete_user(&self, external_id: &ExternalUserId) -> Result<bool, ClientError>;

    /// Enable or disable sign-in for an account.
    ///
    /// Returns `false` when the account does not exist.
    async fn set_enabled(
        &self,
        external_id: &ExternalUserId,
        enabled: bool,
    ) -> Result<bool, ClientError>;

    /// Restrict an account to the given libraries.
    ///
    /// Returns `false` when the account does not exist. Library ids unknown
    /// to the backend are a no-op subset, never an error.
    async fn set_library_access(
        &self,
        external_id: &ExternalUserId,
        libraries: &[LibraryId],
    ) -> Result<bool, ClientError>;

    /// Adjust permission flags on an account.
    ///
    /// Returns `false` when the account does not exist.
    async fn update_permissions(
        &self,
        external_id: &ExternalUserId,
        update: &PermissionUpdate,
    ) -> Result<bool, ClientError>;

    /// Probe connectivity and credentials.
    ///
    /// Never errors: any failure, network or auth, collapses to `false`.
    async fn test_connection(&self) -> bool;
}

/// Fixture client for tests that do not exercise a real backend.
///
/// Provisions deterministic accounts and accepts every mutation.
#[derive(Debug, Clone)]
pub struct FixtureBackendClient {
    backend: BackendRef,
}

impl FixtureBackendClient {
    /// Create a fixture client for the given backend reference.
    pub const fn new(backend: BackendRef) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl BackendClient for FixtureBackendClient {
    fn backend(&self) -> &BackendRef {
        &self.backend
    }

    fn capabilities(&self) -> Capabilities {
        const ALL: &[Capability] = &[
            Capability::CreateUser,
            Capability::DeleteUser,
            Capability::EnableDisable,
            Capability::LibraryAccess,
            Capability::PermissionUpdate,
        ];
        Capabilities::new(ALL)
    }

    async fn create_user(
        &self,
        request: &CreateUserRequest,
    ) -> Result<ExternalAccount, ClientError> {
        Ok(ExternalAccount {
            backend: self.backend.clone(),
            external_id: ExternalUserId::new(format!(
                "fixture-{username}",
                username = request.username
            )),
            username: request.username.clone(),
            email: request.email.clone(),
            user_kind: request.user_kind,
        })
    }

    async fn delete_user(&self, _external_id: &ExternalUserId) -> Result<bool, ClientError> {
        Ok(true)
    }

    async fn set_enabled(
        &self,
        _external_id: &ExternalUserId,
        _enabled: bool,
    ) -> Result<bool, ClientError> {
        Ok(true)
    }

    async fn set_library_access(
        &self,
        _external_id: &ExternalUserId,
        _libraries: &[LibraryId],
    ) -> Result<bool, ClientError> {
        Ok(true)
    }

    async fn update_permissions(
        &self,
        _external_id: &ExternalUserId,
        _update: &PermissionUpdate,
    ) -> Result<bool, ClientError> {
        Ok(true)
    }

    async fn test_connection(&self) -> bool {
        true
    }
}
