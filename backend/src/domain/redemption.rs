//! Terminal outcomes of a redemption attempt.
//!
//! A redemption either succeeds with exactly one committed identity and one
//! account per target backend, or fails with a stable reason after
//! compensation has been attempted for every account created along the way.

use std::fmt;

use super::account::{ExternalAccount, ExternalUserId, IdentityId};
use super::ports::{
    ClientError, ClientErrorCode, InvitationValidationError, RegistryError,
};

/// Successful redemption: the committed identity and its accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redemption {
    /// Identifier of the committed identity record.
    pub identity_id: IdentityId,
    /// Provisioned accounts in creation order, one per target backend.
    pub accounts: Vec<ExternalAccount>,
}

/// Stable failure category surfaced to the caller.
///
/// The set is deliberately small so callers can render a friendly message
/// without inspecting upstream error strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The invitation cannot be redeemed (not found, disabled, expired, or
    /// use count exhausted).
    InvitationInvalid {
        /// Specific rejection reason.
        rejection: super::ports::InvitationRejection,
    },
    /// Invitation lookup infrastructure failed.
    InvitationLookup {
        /// Adapter-level detail for logs.
        message: String,
    },
    /// A target names a backend kind with no registered client; a deployment
    /// misconfiguration, surfaced as internal.
    UnknownBackendKind {
        /// The unregistered kind tag.
        kind: String,
    },
    /// A backend client failed while provisioning.
    Provisioning {
        /// The client failure that triggered rollback.
        error: ClientError,
    },
    /// The local identity commit failed after full remote success.
    Repository {
        /// Adapter-level detail for logs.
        message: String,
    },
    /// The attempt task failed for reasons outside the saga itself.
    Internal {
        /// Detail for logs.
        message: String,
    },
}

impl FailureReason {
    /// Short caller-facing message, free of upstream error strings.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvitationInvalid { .. } => "invitation is not valid",
            Self::InvitationLookup { .. } => "invitation could not be checked",
            Self::UnknownBackendKind { .. } => "server configuration error",
            Self::Provisioning { error } => match error.code() {
                ClientErrorCode::UserAlreadyExists | ClientErrorCode::UsernameTaken => {
                    "username is already in use"
                }
                ClientErrorCode::EmailRequired => "an email address is required",
                ClientErrorCode::ConnectionError => "media server is unreachable",
                ClientErrorCode::InvalidCredentials
                | ClientErrorCode::Unsupported
                | ClientErrorCode::Unknown => "account creation failed",
            },
            Self::Repository { .. } => "account could not be saved",
            Self::Internal { .. } => "internal error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvitationInvalid { rejection } => {
                write!(f, "invitation cannot be redeemed: {rejection}")
            }
            Self::InvitationLookup { message } => {
                write!(f, "invitation lookup failed: {message}")
            }
            Self::UnknownBackendKind { kind } => {
                write!(f, "no backend client registered for kind {kind}")
            }
            Self::Provisioning { error } => write!(f, "provisioning failed: {error}"),
            Self::Repository { message } => write!(f, "identity commit failed: {message}"),
            Self::Internal { message } => write!(f, "internal error: {message}"),
        }
    }
}

impl From<InvitationValidationError> for FailureReason {
    fn from(value: InvitationValidationError) -> Self {
        match value {
            InvitationValidationError::Invalid { rejection } => {
                Self::InvitationInvalid { rejection }
            }
            InvitationValidationError::Lookup { message } => Self::InvitationLookup { message },
        }
    }
}

impl From<RegistryError> for FailureReason {
    fn from(value: RegistryError) -> Self {
        match value {
            RegistryError::UnknownBackendKind { kind } => Self::UnknownBackendKind { kind },
        }
    }
}

impl From<ClientError> for FailureReason {
    fn from(error: ClientError) -> Self {
        Self::Provisioning { error }
    }
}

/// One account whose compensation attempt failed.
///
/// The owning attempt still reports its original failure reason; entries
/// here name remote accounts that may remain live and need operator
/// attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompensationFailure {
    /// Backend the orphaned account lives on.
    pub backend: super::account::BackendRef,
    /// Backend-assigned identifier of the orphaned account.
    pub external_id: ExternalUserId,
    /// The delete failure.
    pub error: ClientError,
}

/// Failed redemption: the original cause plus compensation diagnostics.
///
/// By the time this value is returned, compensation has been attempted for
/// every account created during the attempt; `failed_compensations` lists
/// the attempts that themselves failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionError {
    reason: FailureReason,
    failed_compensations: Vec<CompensationFailure>,
}

impl RedemptionError {
    /// Construct a failure with a clean rollback.
    pub fn new(reason: impl Into<FailureReason>) -> Self {
        Self {
            reason: reason.into(),
            failed_compensations: Vec::new(),
        }
    }

    /// Attach accounts whose compensation failed.
    #[must_use]
    pub fn with_failed_compensations(mut self, failures: Vec<CompensationFailure>) -> Self {
        self.failed_compensations = failures;
        self
    }

    /// The failure that ended the attempt.
    pub const fn reason(&self) -> &FailureReason {
        &self.reason
    }

    /// Accounts left live because their delete failed; empty on a clean
    /// rollback.
    pub fn failed_compensations(&self) -> &[CompensationFailure] {
        &self.failed_compensations
    }

    /// Short caller-facing message for the original failure.
    pub fn user_message(&self) -> &'static str {
        self.reason.user_message()
    }
}

impl fmt::Display for RedemptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)?;
        if !self.failed_compensations.is_empty() {
            write!(
                f,
                " ({count} account(s) could not be compensated)",
                count = self.failed_compensations.len(),
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for RedemptionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.reason {
            FailureReason::Provisioning { error } => Some(error),
            _ => None,
        }
    }
}
