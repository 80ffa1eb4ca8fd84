//! Tests for the redemption saga.

use std::sync::Arc;

use mockall::Sequence;
use url::Url;

use super::*;
use crate::domain::ports::{
    Capabilities, InvitationRejection, InvitationValidationError, MockBackendClient,
    MockClientProvider, MockIdentityRepository, MockInvitationValidator, RegistryError,
};
use crate::domain::{
    BackendKind, BackendRef, ExternalUserId, IdentityId, Invitation, LibraryId, UserKind, Username,
};
use crate::domain::ports::IdentityRepositoryError;

const FULL: &[Capability] = &[
    Capability::CreateUser,
    Capability::DeleteUser,
    Capability::EnableDisable,
    Capability::LibraryAccess,
    Capability::PermissionUpdate,
];
const CREATE_DELETE: &[Capability] = &[Capability::CreateUser, Capability::DeleteUser];

fn target(kind: BackendKind, instance_id: &str) -> BackendConfig {
    BackendConfig {
        kind,
        endpoint: Url::parse("https://media.example.net").expect("valid url"),
        api_token: "token".to_owned(),
        instance_id: instance_id.to_owned(),
        user_kind: None,
        library_ids: Vec::new(),
    }
}

fn redeem_request() -> RedeemRequest {
    RedeemRequest {
        code: InvitationCode::new("WELCOME-1").expect("valid code"),
        credentials: RedeemerCredentials {
            username: Username::new("alice").expect("valid username"),
            password: Some("hunter2".to_owned()),
            email: Some("alice@example.net".to_owned()),
        },
    }
}

fn validator_for(targets: Vec<BackendConfig>) -> MockInvitationValidator {
    let mut validator = MockInvitationValidator::new();
    validator.expect_validate().times(1).return_once(move |code| {
        Ok(Invitation::new(code.clone(), targets).expect("valid invitation"))
    });
    validator
}

fn mock_client(
    kind: BackendKind,
    instance_id: &str,
    capabilities: &'static [Capability],
) -> MockBackendClient {
    let mut client = MockBackendClient::new();
    client
        .expect_backend()
        .return_const(BackendRef::new(kind, instance_id));
    client
        .expect_capabilities()
        .return_const(Capabilities::new(capabilities));
    client
}

fn account(kind: BackendKind, instance_id: &str, external_id: &str) -> ExternalAccount {
    ExternalAccount {
        backend: BackendRef::new(kind, instance_id),
        external_id: ExternalUserId::new(external_id),
        username: Username::new("alice").expect("valid username"),
        email: Some("alice@example.net".to_owned()),
        user_kind: kind.default_user_kind(),
    }
}

fn provider_with(clients: Vec<(&'static str, MockBackendClient)>) -> MockClientProvider {
    let mut provider = MockClientProvider::new();
    for (instance_id, client) in clients {
        provider
            .expect_client_for()
            .withf(move |config: &BackendConfig| config.instance_id == instance_id)
            .times(1)
            .return_once(move |_| Ok(Box::new(client)));
    }
    provider
}

fn committing_repository(expected_accounts: usize) -> MockIdentityRepository {
    let mut identities = MockIdentityRepository::new();
    identities
        .expect_commit()
        .withf(move |identity: &NewIdentity, accounts: &[ExternalAccount]| {
            identity.username.as_str() == "alice" && accounts.len() == expected_accounts
        })
        .times(1)
        .return_once(|_, _| Ok(IdentityId::random()));
    identities
}

fn uncalled_repository() -> MockIdentityRepository {
    let mut identities = MockIdentityRepository::new();
    identities.expect_commit().times(0);
    identities
}

fn service(
    validator: MockInvitationValidator,
    provider: MockClientProvider,
    identities: MockIdentityRepository,
) -> RedemptionService<MockInvitationValidator, MockClientProvider, MockIdentityRepository> {
    RedemptionService::new(Arc::new(validator), Arc::new(provider), Arc::new(identities))
}

#[tokio::test]
async fn redeem_provisions_every_backend_and_commits_once() {
    let mut plex = mock_client(BackendKind::Plex, "plex-1", CREATE_DELETE);
    plex.expect_create_user()
        .withf(|request: &CreateUserRequest| {
            request.username.as_str() == "alice" && request.user_kind == UserKind::Friend
        })
        .times(1)
        .return_once(|_| Ok(account(BackendKind::Plex, "plex-1", "p-100")));

    let mut jellyfin = mock_client(BackendKind::Jellyfin, "jf-1", FULL);
    jellyfin
        .expect_create_user()
        .withf(|request: &CreateUserRequest| request.user_kind == UserKind::Local)
        .times(1)
        .return_once(|_| Ok(account(BackendKind::Jellyfin, "jf-1", "j-200")));

    let service = service(
        validator_for(vec![
            target(BackendKind::Plex, "plex-1"),
            target(BackendKind::Jellyfin, "jf-1"),
        ]),
        provider_with(vec![("plex-1", plex), ("jf-1", jellyfin)]),
        committing_repository(2),
    );

    let redemption = service.redeem(redeem_request()).await.expect("redeem succeeds");

    let instances: Vec<_> = redemption
        .accounts
        .iter()
        .map(|account| account.backend.instance_id.as_str())
        .collect();
    assert_eq!(instances, ["plex-1", "jf-1"], "accounts keep creation order");
}

#[tokio::test]
async fn second_create_failure_compensates_the_first_account() {
    let mut plex = mock_client(BackendKind::Plex, "plex-1", CREATE_DELETE);
    plex.expect_create_user()
        .times(1)
        .return_once(|_| Ok(account(BackendKind::Plex, "plex-1", "p-100")));
    plex.expect_delete_user()
        .withf(|id: &ExternalUserId| id.as_str() == "p-100")
        .times(1)
        .return_once(|_| Ok(true));

    let mut jellyfin = mock_client(BackendKind::Jellyfin, "jf-1", FULL);
    jellyfin.expect_create_user().times(1).return_once(|_| {
        Err(ClientError::new(
            "create_user",
            BackendRef::new(BackendKind::Jellyfin, "jf-1"),
            ClientErrorCode::UsernameTaken,
        ))
    });
    jellyfin.expect_delete_user().times(0);

    let service = service(
        validator_for(vec![
            target(BackendKind::Plex, "plex-1"),
            target(BackendKind::Jellyfin, "jf-1"),
        ]),
        provider_with(vec![("plex-1", plex), ("jf-1", jellyfin)]),
        uncalled_repository(),
    );

    let error = service
        .redeem(redeem_request())
        .await
        .expect_err("attempt fails");

    match error.reason() {
        FailureReason::Provisioning { error } => {
            assert_eq!(error.code(), ClientErrorCode::UsernameTaken);
        }
        other => panic!("unexpected failure reason: {other:?}"),
    }
    assert!(
        error.failed_compensations().is_empty(),
        "rollback was clean",
    );
    assert_eq!(error.user_message(), "username is already in use");
}

#[tokio::test]
async fn first_create_failure_never_dispatches_to_later_backends() {
    let mut plex = mock_client(BackendKind::Plex, "plex-1", CREATE_DELETE);
    plex.expect_create_user().times(1).return_once(|_| {
        Err(ClientError::connection(
            "create_user",
            BackendRef::new(BackendKind::Plex, "plex-1"),
            "connect timed out",
        ))
    });
    plex.expect_delete_user().times(0);

    let mut jellyfin = mock_client(BackendKind::Jellyfin, "jf-1", FULL);
    jellyfin.expect_create_user().times(0);
    jellyfin.expect_delete_user().times(0);

    let service = service(
        validator_for(vec![
            target(BackendKind::Plex, "plex-1"),
            target(BackendKind::Jellyfin, "jf-1"),
        ]),
        provider_with(vec![("plex-1", plex), ("jf-1", jellyfin)]),
        uncalled_repository(),
    );

    let error = service
        .redeem(redeem_request())
        .await
        .expect_err("attempt fails");
    assert_eq!(error.user_message(), "media server is unreachable");
}

#[tokio::test]
async fn commit_failure_rolls_back_in_reverse_creation_order() {
    let mut sequence = Sequence::new();

    let mut plex = mock_client(BackendKind::Plex, "plex-1", CREATE_DELETE);
    plex.expect_create_user()
        .times(1)
        .return_once(|_| Ok(account(BackendKind::Plex, "plex-1", "p-100")));

    let mut jellyfin = mock_client(BackendKind::Jellyfin, "jf-1", FULL);
    jellyfin
        .expect_create_user()
        .times(1)
        .return_once(|_| Ok(account(BackendKind::Jellyfin, "jf-1", "j-200")));

    // Reverse creation order: the jellyfin account goes first.
    jellyfin
        .expect_delete_user()
        .withf(|id: &ExternalUserId| id.as_str() == "j-200")
        .times(1)
        .in_sequence(&mut sequence)
        .return_once(|_| Ok(true));
    plex.expect_delete_user()
        .withf(|id: &ExternalUserId| id.as_str() == "p-100")
        .times(1)
        .in_sequence(&mut sequence)
        .return_once(|_| Ok(true));

    let mut identities = MockIdentityRepository::new();
    identities
        .expect_commit()
        .times(1)
        .return_once(|_, _| Err(IdentityRepositoryError::commit("constraint violation")));

    let service = service(
        validator_for(vec![
            target(BackendKind::Plex, "plex-1"),
            target(BackendKind::Jellyfin, "jf-1"),
        ]),
        provider_with(vec![("plex-1", plex), ("jf-1", jellyfin)]),
        identities,
    );

    let error = service
        .redeem(redeem_request())
        .await
        .expect_err("attempt fails");

    assert!(
        matches!(error.reason(), FailureReason::Repository { .. }),
        "local commit failure is reported as the cause",
    );
    assert!(error.failed_compensations().is_empty());
}

#[tokio::test]
async fn failed_compensations_are_reported_without_aborting_the_rest() {
    let mut plex = mock_client(BackendKind::Plex, "plex-1", CREATE_DELETE);
    plex.expect_create_user()
        .times(1)
        .return_once(|_| Ok(account(BackendKind::Plex, "plex-1", "p-100")));
    // This delete fails; the plex account is the one left orphaned.
    plex.expect_delete_user().times(1).return_once(|_| {
        Err(ClientError::connection(
            "delete_user",
            BackendRef::new(BackendKind::Plex, "plex-1"),
            "connection reset",
        ))
    });

    let mut jellyfin = mock_client(BackendKind::Jellyfin, "jf-1", FULL);
    jellyfin
        .expect_create_user()
        .times(1)
        .return_once(|_| Ok(account(BackendKind::Jellyfin, "jf-1", "j-200")));
    jellyfin
        .expect_delete_user()
        .times(1)
        .return_once(|_| Ok(true));

    let mut identities = MockIdentityRepository::new();
    identities
        .expect_commit()
        .times(1)
        .return_once(|_, _| Err(IdentityRepositoryError::commit("disk full")));

    let service = service(
        validator_for(vec![
            target(BackendKind::Plex, "plex-1"),
            target(BackendKind::Jellyfin, "jf-1"),
        ]),
        provider_with(vec![("plex-1", plex), ("jf-1", jellyfin)]),
        identities,
    );

    let error = service
        .redeem(redeem_request())
        .await
        .expect_err("attempt fails");

    let orphans: Vec<_> = error
        .failed_compensations()
        .iter()
        .map(|failure| failure.backend.instance_id.as_str())
        .collect();
    assert_eq!(orphans, ["plex-1"], "only the failed delete is reported");
}

#[tokio::test]
async fn invalid_invitation_has_zero_side_effects() {
    let mut validator = MockInvitationValidator::new();
    validator.expect_validate().times(1).return_once(|_| {
        Err(InvitationValidationError::invalid(
            InvitationRejection::Expired,
        ))
    });

    let mut provider = MockClientProvider::new();
    provider.expect_client_for().times(0);

    let service = service(validator, provider, uncalled_repository());

    let error = service
        .redeem(redeem_request())
        .await
        .expect_err("attempt fails");

    assert_eq!(
        error.reason(),
        &FailureReason::InvitationInvalid {
            rejection: InvitationRejection::Expired
        }
    );
    assert_eq!(error.user_message(), "invitation is not valid");
}

#[tokio::test]
async fn unknown_backend_kind_fails_before_any_create() {
    let mut plex = mock_client(BackendKind::Plex, "plex-1", CREATE_DELETE);
    plex.expect_create_user().times(0);
    plex.expect_delete_user().times(0);

    let mut provider = MockClientProvider::new();
    provider
        .expect_client_for()
        .withf(|config: &BackendConfig| config.instance_id == "plex-1")
        .times(1)
        .return_once(move |_| Ok(Box::new(plex)));
    provider
        .expect_client_for()
        .withf(|config: &BackendConfig| config.instance_id == "jf-1")
        .times(1)
        .return_once(|_| Err(RegistryError::unknown_backend_kind("jellyfin")));

    let service = service(
        validator_for(vec![
            target(BackendKind::Plex, "plex-1"),
            target(BackendKind::Jellyfin, "jf-1"),
        ]),
        provider,
        uncalled_repository(),
    );

    let error = service
        .redeem(redeem_request())
        .await
        .expect_err("attempt fails");

    assert_eq!(
        error.reason(),
        &FailureReason::UnknownBackendKind {
            kind: "jellyfin".to_owned()
        }
    );
    assert_eq!(error.user_message(), "server configuration error");
}

#[tokio::test]
async fn missing_create_capability_is_rejected_before_dispatch() {
    const DELETE_ONLY: &[Capability] = &[Capability::DeleteUser];
    let mut client = mock_client(BackendKind::Jellyfin, "jf-1", DELETE_ONLY);
    client.expect_create_user().times(0);

    let service = service(
        validator_for(vec![target(BackendKind::Jellyfin, "jf-1")]),
        provider_with(vec![("jf-1", client)]),
        uncalled_repository(),
    );

    let error = service
        .redeem(redeem_request())
        .await
        .expect_err("attempt fails");

    match error.reason() {
        FailureReason::Provisioning { error } => {
            assert_eq!(error.code(), ClientErrorCode::Unsupported);
            assert_eq!(error.operation(), "create_user");
        }
        other => panic!("unexpected failure reason: {other:?}"),
    }
}

#[tokio::test]
async fn library_scoping_is_applied_when_the_backend_supports_it() {
    let mut config = target(BackendKind::Jellyfin, "jf-1");
    config.library_ids = vec![LibraryId::new("films"), LibraryId::new("series")];

    let mut jellyfin = mock_client(BackendKind::Jellyfin, "jf-1", FULL);
    jellyfin
        .expect_create_user()
        .times(1)
        .return_once(|_| Ok(account(BackendKind::Jellyfin, "jf-1", "j-200")));
    jellyfin
        .expect_set_library_access()
        .withf(|id: &ExternalUserId, libraries: &[LibraryId]| {
            id.as_str() == "j-200" && libraries.len() == 2
        })
        .times(1)
        .return_once(|_, _| Ok(true));

    let service = service(
        validator_for(vec![config]),
        provider_with(vec![("jf-1", jellyfin)]),
        committing_repository(1),
    );

    service.redeem(redeem_request()).await.expect("redeem succeeds");
}

#[tokio::test]
async fn library_scoping_is_skipped_for_backends_without_the_capability() {
    let mut config = target(BackendKind::Plex, "plex-1");
    config.library_ids = vec![LibraryId::new("films")];

    let mut plex = mock_client(BackendKind::Plex, "plex-1", CREATE_DELETE);
    plex.expect_create_user()
        .times(1)
        .return_once(|_| Ok(account(BackendKind::Plex, "plex-1", "p-100")));
    plex.expect_set_library_access().times(0);

    let service = service(
        validator_for(vec![config]),
        provider_with(vec![("plex-1", plex)]),
        committing_repository(1),
    );

    service.redeem(redeem_request()).await.expect("redeem succeeds");
}

#[tokio::test]
async fn scoping_failure_rolls_back_the_created_account() {
    let mut config = target(BackendKind::Jellyfin, "jf-1");
    config.library_ids = vec![LibraryId::new("films")];

    let mut jellyfin = mock_client(BackendKind::Jellyfin, "jf-1", FULL);
    jellyfin
        .expect_create_user()
        .times(1)
        .return_once(|_| Ok(account(BackendKind::Jellyfin, "jf-1", "j-200")));
    // Account not found during scoping: it vanished after creation.
    jellyfin
        .expect_set_library_access()
        .times(1)
        .return_once(|_, _| Ok(false));
    jellyfin
        .expect_delete_user()
        .withf(|id: &ExternalUserId| id.as_str() == "j-200")
        .times(1)
        .return_once(|_| Ok(false));

    let service = service(
        validator_for(vec![config]),
        provider_with(vec![("jf-1", jellyfin)]),
        uncalled_repository(),
    );

    let error = service
        .redeem(redeem_request())
        .await
        .expect_err("attempt fails");

    assert!(matches!(
        error.reason(),
        FailureReason::Provisioning { .. }
    ));
    assert!(
        error.failed_compensations().is_empty(),
        "an already-absent account is a clean rollback",
    );
}
