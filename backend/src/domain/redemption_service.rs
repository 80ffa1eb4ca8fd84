//! Redemption saga: all-or-nothing account provisioning across backends.
//!
//! One attempt moves through `Validating`, `Provisioning`, `Committing` on
//! the happy path, or `Validating`, `Provisioning`, `RollingBack` on any
//! failure. There is no in-place retry: a failed attempt rolls back every
//! account it created and the redeemer starts over from validation.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::domain::ports::{
    BackendClient, Capability, ClientError, ClientErrorCode, ClientProvider, CreateUserRequest,
    IdentityRepository, InvitationValidator,
};
use crate::domain::{
    BackendConfig, CompensationFailure, ExternalAccount, FailureReason, InvitationCode,
    NewIdentity, Redemption, RedemptionError, RedeemerCredentials,
};

/// One redemption request: the presented code plus redeemer credentials.
///
/// Credentials arrive already resolved; OAuth-style flows (the Plex PIN
/// exchange) complete before redemption starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemRequest {
    /// Invitation code to redeem.
    pub code: InvitationCode,
    /// Credentials for the accounts to be created.
    pub credentials: RedeemerCredentials,
}

/// Orchestrates one redemption attempt across all target backends.
///
/// Guarantees, per attempt:
/// - at most one identity commit, and only after every backend produced a
///   live account;
/// - on any failure, a best-effort delete of every account created so far,
///   in reverse creation order;
/// - rollback runs to completion even when the caller stops awaiting
///   [`redeem`](Self::redeem).
pub struct RedemptionService<V, P, R> {
    validator: Arc<V>,
    clients: Arc<P>,
    identities: Arc<R>,
}

// Manual impl: the service is cloneable whenever its collaborators are
// shared, without requiring the collaborators themselves to be Clone.
impl<V, P, R> Clone for RedemptionService<V, P, R> {
    fn clone(&self) -> Self {
        Self {
            validator: Arc::clone(&self.validator),
            clients: Arc::clone(&self.clients),
            identities: Arc::clone(&self.identities),
        }
    }
}

impl<V, P, R> RedemptionService<V, P, R> {
    /// Create a service from its injected collaborators.
    ///
    /// The client provider is expected to be the process-wide registry,
    /// populated at start-up and read-only afterwards.
    pub fn new(validator: Arc<V>, clients: Arc<P>, identities: Arc<R>) -> Self {
        Self {
            validator,
            clients,
            identities,
        }
    }
}

impl<V, P, R> RedemptionService<V, P, R>
where
    V: InvitationValidator + 'static,
    P: ClientProvider + 'static,
    R: IdentityRepository + 'static,
{
    /// Redeem an invitation, provisioning an account on every target
    /// backend.
    ///
    /// Synchronous from the caller's point of view: the future resolves once
    /// the attempt is committed or fully rolled back. The attempt body runs
    /// in its own task so that dropping this future cannot skip
    /// compensation; it only forgoes the result.
    ///
    /// # Errors
    ///
    /// Returns [`RedemptionError`] with the original failure reason after
    /// compensation has been attempted for every created account.
    pub async fn redeem(&self, request: RedeemRequest) -> Result<Redemption, RedemptionError> {
        let service = self.clone();
        let attempt = tokio::spawn(async move { service.run_attempt(request).await });
        match attempt.await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                error!(error = %join_error, "redemption attempt task failed");
                Err(RedemptionError::new(FailureReason::Internal {
                    message: join_error.to_string(),
                }))
            }
        }
    }

    async fn run_attempt(&self, request: RedeemRequest) -> Result<Redemption, RedemptionError> {
        // Validating: re-check at the start of the attempt, not earlier, so
        // expiry and use-count races close before any side effect.
        let invitation = self
            .validator
            .validate(&request.code)
            .await
            .map_err(|err| RedemptionError::new(FailureReason::from(err)))?;

        debug!(
            code = %invitation.code(),
            targets = invitation.targets().len(),
            "invitation validated, resolving backend clients",
        );

        // Resolve every client and gate on CreateUser before any remote
        // call: a misconfigured target fails the attempt with zero side
        // effects.
        let mut clients: Vec<Box<dyn BackendClient>> =
            Vec::with_capacity(invitation.targets().len());
        for target in invitation.targets() {
            let client = self
                .clients
                .client_for(target)
                .map_err(|err| RedemptionError::new(FailureReason::from(err)))?;
            if !client.capabilities().supports(Capability::CreateUser) {
                let error = ClientError::unsupported("create_user", client.backend().clone());
                return Err(RedemptionError::new(FailureReason::from(error)));
            }
            clients.push(client);
        }

        // Provisioning: invitation list order, fail-fast on the first
        // failure. Every successful create is recorded before the loop can
        // break so no account escapes compensation.
        let mut created: Vec<(usize, ExternalAccount)> = Vec::new();
        let mut failure: Option<FailureReason> = None;
        for (index, (client, target)) in clients.iter().zip(invitation.targets()).enumerate() {
            let create = CreateUserRequest {
                username: request.credentials.username.clone(),
                password: request.credentials.password.clone(),
                email: request.credentials.email.clone(),
                user_kind: target
                    .user_kind
                    .unwrap_or_else(|| target.kind.default_user_kind()),
            };
            match client.create_user(&create).await {
                Ok(account) => {
                    debug!(
                        backend = %account.backend,
                        external_id = %account.external_id,
                        "account created",
                    );
                    let scoping = Self::scope_libraries(client.as_ref(), target, &account).await;
                    created.push((index, account));
                    if let Err(error) = scoping {
                        failure = Some(FailureReason::from(error));
                        break;
                    }
                }
                Err(error) => {
                    warn!(backend = %client.backend(), %error, "account creation failed");
                    failure = Some(FailureReason::from(error));
                    break;
                }
            }
        }

        if let Some(reason) = failure {
            let failures = Self::roll_back(&clients, &created).await;
            return Err(RedemptionError::new(reason).with_failed_compensations(failures));
        }

        // Committing: exactly one local transaction; a local failure after
        // full remote success rolls back exactly like a remote failure.
        let accounts: Vec<ExternalAccount> =
            created.iter().map(|(_, account)| account.clone()).collect();
        let identity = NewIdentity {
            username: request.credentials.username.clone(),
            email: request.credentials.email.clone(),
            invitation_code: invitation.code().clone(),
        };
        match self.identities.commit(&identity, &accounts).await {
            Ok(identity_id) => {
                info!(
                    %identity_id,
                    accounts = accounts.len(),
                    "redemption committed",
                );
                Ok(Redemption {
                    identity_id,
                    accounts,
                })
            }
            Err(err) => {
                warn!(error = %err, "identity commit failed, rolling back remote accounts");
                let failures = Self::roll_back(&clients, &created).await;
                Err(
                    RedemptionError::new(FailureReason::Repository {
                        message: err.to_string(),
                    })
                    .with_failed_compensations(failures),
                )
            }
        }
    }

    /// Apply per-target library scoping after a successful create.
    ///
    /// Skipped silently when the target scopes nothing or the backend does
    /// not declare [`Capability::LibraryAccess`]; never reaches the network
    /// for an undeclared capability.
    async fn scope_libraries(
        client: &dyn BackendClient,
        target: &BackendConfig,
        account: &ExternalAccount,
    ) -> Result<(), ClientError> {
        if target.library_ids.is_empty() {
            return Ok(());
        }
        if !client.capabilities().supports(Capability::LibraryAccess) {
            debug!(
                backend = %account.backend,
                "backend does not support library scoping, leaving default access",
            );
            return Ok(());
        }
        let found = client
            .set_library_access(&account.external_id, &target.library_ids)
            .await?;
        if found {
            Ok(())
        } else {
            // The account vanished between create and scoping; treat it as a
            // provisioning failure so the attempt rolls back.
            Err(ClientError::new(
                "set_library_access",
                account.backend.clone(),
                ClientErrorCode::Unknown,
            )
            .with_cause("account missing immediately after creation"))
        }
    }

    /// RollingBack: best-effort delete of every created account, reverse
    /// creation order. One failed delete never aborts the rest; failures are
    /// logged at error level and reported to the caller, since an orphaned
    /// remote account needs operator attention.
    async fn roll_back(
        clients: &[Box<dyn BackendClient>],
        created: &[(usize, ExternalAccount)],
    ) -> Vec<CompensationFailure> {
        let mut failures = Vec::new();
        for (index, account) in created.iter().rev() {
            let Some(client) = clients.get(*index) else {
                continue;
            };
            match client.delete_user(&account.external_id).await {
                Ok(true) => {
                    debug!(
                        backend = %account.backend,
                        external_id = %account.external_id,
                        "account compensated",
                    );
                }
                Ok(false) => {
                    debug!(
                        backend = %account.backend,
                        external_id = %account.external_id,
                        "account already absent during compensation",
                    );
                }
                Err(err) => {
                    error!(
                        backend = %account.backend,
                        external_id = %account.external_id,
                        error = %err,
                        "compensation failed, remote account may be orphaned",
                    );
                    failures.push(CompensationFailure {
                        backend: account.backend.clone(),
                        external_id: account.external_id.clone(),
                        error: err,
                    });
                }
            }
        }
        failures
    }
}

#[cfg(test)]
#[path = "redemption_service_tests.rs"]
mod tests;
