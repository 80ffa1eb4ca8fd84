//! Unit coverage for the Plex client.
//!
//! Network behaviour is covered through the pure status mapping; the async
//! tests point at an unresolvable host so a request that escaped the
//! pre-flight checks would surface as a connection error instead.

use rstest::rstest;

use crate::domain::Username;
use crate::domain::ports::BackendClient;

use super::*;

fn client() -> Box<dyn BackendClient> {
    let factory = PlexClientFactory::new().expect("factory builds");
    factory.client_for(&BackendConfig {
        kind: BackendKind::Plex,
        endpoint: Url::parse("https://plex.invalid").expect("valid url"),
        api_token: "token".to_owned(),
        instance_id: "machine-1".to_owned(),
        user_kind: None,
        library_ids: Vec::new(),
    })
}

fn create_request(user_kind: UserKind, email: Option<&str>) -> CreateUserRequest {
    CreateUserRequest {
        username: Username::new("alice").expect("valid username"),
        password: None,
        email: email.map(str::to_owned),
        user_kind,
    }
}

#[rstest]
#[case(StatusCode::UNAUTHORIZED, ClientErrorCode::InvalidCredentials)]
#[case(StatusCode::FORBIDDEN, ClientErrorCode::InvalidCredentials)]
#[case(StatusCode::CONFLICT, ClientErrorCode::UserAlreadyExists)]
#[case(StatusCode::UNPROCESSABLE_ENTITY, ClientErrorCode::UserAlreadyExists)]
#[case(StatusCode::REQUEST_TIMEOUT, ClientErrorCode::ConnectionError)]
#[case(StatusCode::GATEWAY_TIMEOUT, ClientErrorCode::ConnectionError)]
#[case(StatusCode::INTERNAL_SERVER_ERROR, ClientErrorCode::Unknown)]
fn status_mapping_classifies_plex_failures(
    #[case] status: StatusCode,
    #[case] expected: ClientErrorCode,
) {
    let backend = BackendRef::new(BackendKind::Plex, "machine-1");
    let error = map_status_error("create_user", backend, status, b"");
    assert_eq!(error.code(), expected);
}

#[test]
fn status_mapping_previews_the_response_body() {
    let backend = BackendRef::new(BackendKind::Plex, "machine-1");
    let error = map_status_error(
        "create_user",
        backend,
        StatusCode::CONFLICT,
        br#"{"error": "already shared"}"#,
    );
    let cause = error.cause().expect("cause captured");
    assert!(cause.starts_with("status 409"));
    assert!(cause.contains("already shared"));
}

#[tokio::test]
async fn friend_invite_without_email_fails_before_any_request() {
    let client = client();
    let error = client
        .create_user(&create_request(UserKind::Friend, None))
        .await
        .expect_err("missing email rejected");
    assert_eq!(error.code(), ClientErrorCode::EmailRequired);
}

#[tokio::test]
async fn local_accounts_are_unsupported() {
    let client = client();
    let error = client
        .create_user(&create_request(UserKind::Local, Some("alice@example.net")))
        .await
        .expect_err("local account rejected");
    assert_eq!(error.code(), ClientErrorCode::Unsupported);
}

#[tokio::test]
async fn enable_and_permission_operations_are_unsupported() {
    let client = client();
    let id = ExternalUserId::new("42");

    let error = client
        .set_enabled(&id, false)
        .await
        .expect_err("enable toggle rejected");
    assert_eq!(error.code(), ClientErrorCode::Unsupported);

    let error = client
        .update_permissions(&id, &PermissionUpdate::default())
        .await
        .expect_err("permission update rejected");
    assert_eq!(error.code(), ClientErrorCode::Unsupported);
}

#[test]
fn declared_capabilities_match_the_supported_operations() {
    let client = client();
    let capabilities = client.capabilities();
    assert!(capabilities.supports(Capability::CreateUser));
    assert!(capabilities.supports(Capability::DeleteUser));
    assert!(capabilities.supports(Capability::LibraryAccess));
    assert!(!capabilities.supports(Capability::EnableDisable));
    assert!(!capabilities.supports(Capability::PermissionUpdate));
}
