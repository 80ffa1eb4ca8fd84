//! Domain types, ports, and the redemption saga.
//!
//! Purpose: define strongly typed invitation, account, and outcome types,
//! the ports the saga drives (backend clients, registry, validator,
//! identity repository), and the redemption service that ties them into an
//! all-or-nothing provisioning attempt.

pub mod ports;

mod account;
mod invitation;
mod redemption;
mod redemption_service;

pub use self::account::{
    BackendRef, ExternalAccount, ExternalUserId, IdentityId, LibraryId, NewIdentity,
    RedeemerCredentials, USERNAME_MAX, USERNAME_MIN, UserKind, Username, UsernameValidationError,
};
pub use self::invitation::{
    BackendConfig, BackendKind, INVITATION_CODE_MAX, Invitation, InvitationCode,
    InvitationCodeError, InvitationShapeError,
};
pub use self::redemption::{CompensationFailure, FailureReason, Redemption, RedemptionError};
pub use self::redemption_service::{RedeemRequest, RedemptionService};
