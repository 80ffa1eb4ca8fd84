//! Port for committing a redeemed identity and its backend accounts.

use async_trait::async_trait;

use crate::domain::{ExternalAccount, IdentityId, NewIdentity};

use super::define_port_error;

define_port_error! {
    /// Errors raised by identity repository adapters.
    pub enum IdentityRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "identity repository connection failed: {message}",
        /// The commit transaction failed or rolled back locally.
        Commit { message: String } =>
            "identity commit failed: {message}",
    }
}

/// Port for the single transactional commit at the end of a successful
/// redemption.
///
/// The identity record and one account record per [`ExternalAccount`] are
/// written in one local transaction; implementations must not persist
/// anything on failure. The redemption service invokes `commit` at most once
/// per attempt and never speculatively.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Persist the identity and its accounts, returning the minted id.
    async fn commit(
        &self,
        identity: &NewIdentity,
        accounts: &[ExternalAccount],
    ) -> Result<IdentityId, IdentityRepositoryError>;
}

/// Fixture repository for tests that do not exercise persistence.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureIdentityRepository;

#[async_trait]
impl IdentityRepository for FixtureIdentityRepository {
    async fn commit(
        &self,
        _identity: &NewIdentity,
        _accounts: &[ExternalAccount],
    ) -> Result<IdentityId, IdentityRepositoryError> {
        Ok(IdentityId::random())
    }
}
