//! Account and identity value types shared across ports and adapters.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::invitation::BackendKind;

/// Minimum allowed length for a provisioned username.
pub const USERNAME_MIN: usize = 2;
/// Maximum allowed length for a provisioned username.
pub const USERNAME_MAX: usize = 64;

static USERNAME_RE: OnceLock<Regex> = OnceLock::new();

fn username_regex() -> &'static Regex {
    USERNAME_RE.get_or_init(|| {
        // Length is enforced separately; this regex constrains allowed
        // characters and requires an alphanumeric first character.
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid username regex")
    })
}

/// Validation errors returned by [`Username::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsernameValidationError {
    Empty,
    TooShort { min: usize },
    TooLong { max: usize },
    InvalidCharacters,
}

impl fmt::Display for UsernameValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "username must not be empty"),
            Self::TooShort { min } => write!(f, "username must be at least {min} characters"),
            Self::TooLong { max } => write!(f, "username must be at most {max} characters"),
            Self::InvalidCharacters => write!(
                f,
                "username must start with a letter or number and may only contain \
                 letters, numbers, dots, hyphens, or underscores",
            ),
        }
    }
}

impl std::error::Error for UsernameValidationError {}

/// Username requested for the provisioned accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Validate and construct a [`Username`] from borrowed input.
    pub fn new(name: impl AsRef<str>) -> Result<Self, UsernameValidationError> {
        Self::from_owned(name.as_ref().to_owned())
    }

    fn from_owned(name: String) -> Result<Self, UsernameValidationError> {
        if name.is_empty() {
            return Err(UsernameValidationError::Empty);
        }
        let length = name.chars().count();
        if length < USERNAME_MIN {
            return Err(UsernameValidationError::TooShort { min: USERNAME_MIN });
        }
        if length > USERNAME_MAX {
            return Err(UsernameValidationError::TooLong { max: USERNAME_MAX });
        }
        if !username_regex().is_match(&name) {
            return Err(UsernameValidationError::InvalidCharacters);
        }
        Ok(Self(name))
    }

    /// Borrow the username as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl TryFrom<String> for Username {
    type Error = UsernameValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

/// Backend-assigned user identifier, opaque to the domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalUserId(String);

impl ExternalUserId {
    /// Wrap a backend-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ExternalUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend library (section/folder) identifier, opaque to the domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LibraryId(String);

impl LibraryId {
    /// Wrap a backend library identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account class requested on the target backend.
///
/// Backends that only know one class ignore the distinction; backends with
/// multiple classes use it to pick the provisioning flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserKind {
    /// Externally invited account (Plex friend share); requires an email.
    Friend,
    /// Managed home/profile account owned by the server account.
    Home,
    /// Locally managed account with its own credentials.
    Local,
}

impl UserKind {
    /// Stable string tag used in telemetry and persisted records.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Friend => "friend",
            Self::Home => "home",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for UserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one backend instance, carried on accounts and client errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendRef {
    /// Backend type.
    pub kind: BackendKind,
    /// Stable instance identifier from [`BackendConfig`].
    ///
    /// [`BackendConfig`]: super::invitation::BackendConfig
    pub instance_id: String,
}

impl BackendRef {
    /// Construct a reference from a kind and instance identifier.
    pub fn new(kind: BackendKind, instance_id: impl Into<String>) -> Self {
        Self {
            kind,
            instance_id: instance_id.into(),
        }
    }
}

impl fmt::Display for BackendRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.instance_id)
    }
}

/// An account provisioned on one backend, pending promotion or compensation.
///
/// Owned transiently by the redemption service: it is either written into the
/// identity repository on commit or deleted from its backend on rollback
/// before the attempt returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAccount {
    /// Backend the account lives on.
    pub backend: BackendRef,
    /// Backend-assigned user identifier.
    pub external_id: ExternalUserId,
    /// Username as created on the backend.
    pub username: Username,
    /// Email recorded against the account, when the backend tracks one.
    pub email: Option<String>,
    /// Account class the backend created.
    pub user_kind: UserKind,
}

/// Local identity identifier minted at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityId(Uuid);

impl IdentityId {
    /// Generate a fresh identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity fields committed alongside the provisioned accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIdentity {
    /// Display username shared across the accounts.
    pub username: Username,
    /// Contact email, when supplied by the redeemer.
    pub email: Option<String>,
    /// Code of the invitation this identity was redeemed from.
    pub invitation_code: super::invitation::InvitationCode,
}

/// Credentials supplied by the redeemer for the accounts to be created.
///
/// The password is absent for flows where authentication happens out of band
/// (Plex OAuth); backends that need local credentials reject its absence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemerCredentials {
    /// Requested username.
    pub username: Username,
    /// Password for backends with local credential stores.
    pub password: Option<String>,
    /// Email for backends that invite by address.
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    //! Regression coverage for account value types.

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("")]
    #[case("a")]
    fn username_rejects_too_short(#[case] raw: &str) {
        let err = Username::new(raw).expect_err("short username rejected");
        assert!(matches!(
            err,
            UsernameValidationError::Empty | UsernameValidationError::TooShort { .. }
        ));
    }

    #[rstest]
    #[case(".leading-dot")]
    #[case("-leading-hyphen")]
    #[case("has space")]
    #[case("émile")]
    fn username_rejects_invalid_characters(#[case] raw: &str) {
        let err = Username::new(raw).expect_err("invalid username rejected");
        assert_eq!(err, UsernameValidationError::InvalidCharacters);
    }

    #[rstest]
    #[case("alice")]
    #[case("bob.smith")]
    #[case("carol_92")]
    #[case("0day-fan")]
    fn username_accepts_reasonable_names(#[case] raw: &str) {
        let name = Username::new(raw).expect("valid username");
        assert_eq!(name.as_str(), raw);
    }

    #[test]
    fn username_rejects_overlong_input() {
        let raw = "a".repeat(USERNAME_MAX + 1);
        let err = Username::new(raw).expect_err("overlong username rejected");
        assert_eq!(err, UsernameValidationError::TooLong { max: USERNAME_MAX });
    }

    #[test]
    fn backend_ref_display_names_kind_and_instance() {
        let backend = BackendRef::new(BackendKind::Plex, "living-room");
        assert_eq!(backend.to_string(), "plex/living-room");
    }

    #[test]
    fn user_kind_serialises_as_snake_case_tag() {
        let json = serde_json::to_string(&UserKind::Friend).expect("serialises");
        assert_eq!(json, "\"friend\"");
        assert_eq!(UserKind::Home.as_str(), "home");
    }
}
