//! Invitation aggregate and target backend configuration.
//!
//! An invitation is immutable input for one redemption attempt. Validity
//! checks (expiry, use count) live behind the
//! [`InvitationValidator`](crate::domain::ports::InvitationValidator) port;
//! this module only models the validated shape the orchestrator consumes.

use std::fmt;

use url::Url;

use super::account::{LibraryId, UserKind};

/// Maximum accepted length for an invitation code.
pub const INVITATION_CODE_MAX: usize = 64;

/// Validation errors returned when constructing an [`InvitationCode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvitationCodeError {
    Empty,
    TooLong { max: usize },
    InvalidCharacters,
}

impl fmt::Display for InvitationCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "invitation code must not be empty"),
            Self::TooLong { max } => {
                write!(f, "invitation code must be at most {max} characters")
            }
            Self::InvalidCharacters => write!(
                f,
                "invitation code may only contain letters, numbers, or hyphens",
            ),
        }
    }
}

impl std::error::Error for InvitationCodeError {}

/// Opaque code a redeemer presents to claim an invitation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InvitationCode(String);

impl InvitationCode {
    /// Validate and construct an [`InvitationCode`] from borrowed input.
    pub fn new(code: impl AsRef<str>) -> Result<Self, InvitationCodeError> {
        Self::from_owned(code.as_ref().to_owned())
    }

    fn from_owned(code: String) -> Result<Self, InvitationCodeError> {
        if code.trim().is_empty() {
            return Err(InvitationCodeError::Empty);
        }
        if code.trim() != code {
            return Err(InvitationCodeError::InvalidCharacters);
        }
        if code.len() > INVITATION_CODE_MAX {
            return Err(InvitationCodeError::TooLong {
                max: INVITATION_CODE_MAX,
            });
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(InvitationCodeError::InvalidCharacters);
        }
        Ok(Self(code))
    }

    /// Borrow the code as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for InvitationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<InvitationCode> for String {
    fn from(value: InvitationCode) -> Self {
        value.0
    }
}

impl TryFrom<String> for InvitationCode {
    type Error = InvitationCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

/// Closed set of backend types the registry can resolve.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Plex Media Server, accounts managed through plex.tv.
    Plex,
    /// Jellyfin server with locally managed accounts.
    Jellyfin,
}

impl BackendKind {
    /// Stable string tag used in configuration and telemetry.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plex => "plex",
            Self::Jellyfin => "jellyfin",
        }
    }

    /// Account class provisioned when the invitation does not pick one.
    pub const fn default_user_kind(self) -> UserKind {
        match self {
            Self::Plex => UserKind::Friend,
            Self::Jellyfin => UserKind::Local,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection and scoping details for one target backend.
///
/// Read-only input to a redemption attempt. `instance_id` is the stable
/// identifier recorded against each provisioned account so compensation can
/// name the owning backend even when endpoints move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Backend type resolved through the client registry.
    pub kind: BackendKind,
    /// Base URL of the backend API.
    pub endpoint: Url,
    /// Admin credential used by the backend client (server token or API key).
    pub api_token: String,
    /// Stable identifier for compensation bookkeeping and telemetry.
    pub instance_id: String,
    /// Account class to provision; `None` means the backend default.
    pub user_kind: Option<UserKind>,
    /// Libraries the provisioned account should be limited to.
    ///
    /// Empty means the backend's default (full) access.
    pub library_ids: Vec<LibraryId>,
}

/// Validation errors returned by [`Invitation::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvitationShapeError {
    /// An invitation must target at least one backend.
    NoTargets,
    /// The same backend instance appears more than once.
    DuplicateInstance { instance_id: String },
}

impl fmt::Display for InvitationShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTargets => write!(f, "invitation must target at least one backend"),
            Self::DuplicateInstance { instance_id } => {
                write!(f, "invitation targets backend instance {instance_id} twice")
            }
        }
    }
}

impl std::error::Error for InvitationShapeError {}

/// A validated invitation: the code plus the backends it provisions.
///
/// The target order is preserved exactly as listed; the orchestrator
/// provisions in that order and compensates in reverse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    code: InvitationCode,
    targets: Vec<BackendConfig>,
}

impl Invitation {
    /// Construct an invitation, rejecting empty or ambiguous target lists.
    pub fn new(
        code: InvitationCode,
        targets: Vec<BackendConfig>,
    ) -> Result<Self, InvitationShapeError> {
        if targets.is_empty() {
            return Err(InvitationShapeError::NoTargets);
        }
        for (index, target) in targets.iter().enumerate() {
            if targets
                .iter()
                .skip(index + 1)
                .any(|other| other.instance_id == target.instance_id)
            {
                return Err(InvitationShapeError::DuplicateInstance {
                    instance_id: target.instance_id.clone(),
                });
            }
        }
        Ok(Self { code, targets })
    }

    /// The code this invitation was claimed with.
    pub fn code(&self) -> &InvitationCode {
        &self.code
    }

    /// Target backends in provisioning order.
    pub fn targets(&self) -> &[BackendConfig] {
        &self.targets
    }
}
