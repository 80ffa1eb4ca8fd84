//! Port for invitation lookup and validity checking.
//!
//! Validity is re-checked at the start of every redemption attempt, not when
//! the invitation was last viewed, so expiry and use-count races close at
//! the moment side effects begin.

use std::fmt;

use async_trait::async_trait;

use crate::domain::{Invitation, InvitationCode};

use super::define_port_error;

/// Why an invitation cannot be redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvitationRejection {
    /// No invitation exists for the presented code.
    NotFound,
    /// The invitation was disabled by an administrator.
    Disabled,
    /// The invitation's expiry has passed.
    Expired,
    /// The invitation's use count is exhausted.
    UsesExhausted,
}

impl InvitationRejection {
    /// Stable string tag used in telemetry and caller-facing messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Disabled => "disabled",
            Self::Expired => "expired",
            Self::UsesExhausted => "uses_exhausted",
        }
    }
}

impl fmt::Display for InvitationRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

define_port_error! {
    /// Errors raised by invitation validator implementations.
    pub enum InvitationValidationError {
        /// The invitation exists but cannot be redeemed.
        Invalid { rejection: InvitationRejection } =>
            "invitation cannot be redeemed: {rejection}",
        /// The lookup itself failed (store unavailable, query error).
        Lookup { message: String } =>
            "invitation lookup failed: {message}",
    }
}

/// Port for resolving a presented code into a validated invitation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InvitationValidator: Send + Sync {
    /// Check validity and return the invitation's target configuration.
    ///
    /// Implementations must evaluate expiry and use count at call time.
    async fn validate(
        &self,
        code: &InvitationCode,
    ) -> Result<Invitation, InvitationValidationError>;
}
