//! Plex backend client over the plex.tv v2 API.
//!
//! Accounts are modelled as shared-server entries: a friend invite or a home
//! user both materialise as one `shared_servers` resource, and its id is the
//! external user id recorded against the account. Deleting or rescoping the
//! account therefore always addresses the same resource, whichever class was
//! provisioned.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode, Url, header};
use tracing::debug;

use crate::domain::ports::{
    BackendClient, Capabilities, Capability, ClientError, ClientErrorCode, CreateUserRequest,
    PermissionUpdate,
};
use crate::domain::{
    BackendConfig, BackendKind, BackendRef, ExternalAccount, ExternalUserId, LibraryId, UserKind,
};
use crate::outbound::http::{api_url, body_preview, transport_error};
use crate::outbound::registry::BackendClientFactory;

use super::dto::{ShareRequestDto, ShareResponseDto, UpdateShareDto};

const PLEX_CAPABILITIES: &[Capability] = &[
    Capability::CreateUser,
    Capability::DeleteUser,
    Capability::LibraryAccess,
];

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client identification headers sent with every plex.tv request.
#[derive(Debug, Clone)]
pub struct PlexHttpSettings {
    /// `X-Plex-Product` value.
    pub product: String,
    /// `X-Plex-Client-Identifier` value; stable per deployment.
    pub client_identifier: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for PlexHttpSettings {
    fn default() -> Self {
        Self {
            product: "Gatehouse".to_owned(),
            client_identifier: "gatehouse-server".to_owned(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Builds attempt-scoped [`PlexClient`]s over one shared connection pool.
pub struct PlexClientFactory {
    http: reqwest::Client,
    settings: Arc<PlexHttpSettings>,
}

impl PlexClientFactory {
    /// Create a factory with default client identification.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_settings(PlexHttpSettings::default())
    }

    /// Create a factory with explicit client identification.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn with_settings(settings: PlexHttpSettings) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            http,
            settings: Arc::new(settings),
        })
    }
}

impl BackendClientFactory for PlexClientFactory {
    fn kind(&self) -> BackendKind {
        BackendKind::Plex
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new(PLEX_CAPABILITIES)
    }

    fn client_for(&self, config: &BackendConfig) -> Box<dyn BackendClient> {
        Box::new(PlexClient {
            http: self.http.clone(),
            settings: Arc::clone(&self.settings),
            backend: BackendRef::new(BackendKind::Plex, config.instance_id.clone()),
            endpoint: config.endpoint.clone(),
            api_token: config.api_token.clone(),
            user_kind: config
                .user_kind
                .unwrap_or_else(|| BackendKind::Plex.default_user_kind()),
            library_ids: config.library_ids.clone(),
        })
    }
}

/// Account management for one Plex server, scoped to one redemption attempt.
///
/// `instance_id` doubles as the server's machine identifier: plex.tv scopes
/// shared-server resources by it.
pub struct PlexClient {
    http: reqwest::Client,
    settings: Arc<PlexHttpSettings>,
    backend: BackendRef,
    endpoint: Url,
    api_token: String,
    user_kind: UserKind,
    library_ids: Vec<LibraryId>,
}

impl PlexClient {
    fn identify(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("X-Plex-Token", &self.api_token)
            .header("X-Plex-Client-Identifier", &self.settings.client_identifier)
            .header("X-Plex-Product", &self.settings.product)
            .header(header::ACCEPT, "application/json")
    }

    fn url(&self, path: &str) -> String {
        api_url(&self.endpoint, path)
    }

    async fn status_error(
        &self,
        operation: &'static str,
        response: Response,
    ) -> ClientError {
        let status = response.status();
        let body = response.bytes().await.unwrap_or_default();
        map_status_error(operation, self.backend.clone(), status, &body)
    }
}

/// Classify an unsuccessful plex.tv status into a [`ClientError`].
///
/// plex.tv reports an already-shared address as a conflict (409) and an
/// unprocessable invite (422) when the address is the server owner's own
/// account; both collapse to [`ClientErrorCode::UserAlreadyExists`].
fn map_status_error(
    operation: &'static str,
    backend: BackendRef,
    status: StatusCode,
    body: &[u8],
) -> ClientError {
    let code = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientErrorCode::InvalidCredentials,
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            ClientErrorCode::UserAlreadyExists
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ClientErrorCode::ConnectionError
        }
        _ => ClientErrorCode::Unknown,
    };
    let preview = body_preview(body);
    let cause = if preview.is_empty() {
        format!("status {status}")
    } else {
        format!("status {status}: {preview}")
    };
    ClientError::new(operation, backend, code).with_cause(cause)
}

#[async_trait]
impl BackendClient for PlexClient {
    fn backend(&self) -> &BackendRef {
        &self.backend
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new(PLEX_CAPABILITIES)
    }

    async fn create_user(
        &self,
        request: &CreateUserRequest,
    ) -> Result<ExternalAccount, ClientError> {
        const OPERATION: &str = "create_user";

        let user_kind = request.user_kind;
        if user_kind == UserKind::Local {
            return Err(ClientError::unsupported(OPERATION, self.backend.clone())
                .with_cause("plex has no locally managed accounts"));
        }
        if user_kind == UserKind::Friend && request.email.is_none() {
            return Err(ClientError::new(
                OPERATION,
                self.backend.clone(),
                ClientErrorCode::EmailRequired,
            )
            .with_cause("friend invites are sent to an email address"));
        }

        let library_section_ids = self
            .library_ids
            .iter()
            .map(LibraryId::as_str)
            .collect::<Vec<_>>();
        let body = ShareRequestDto {
            machine_identifier: &self.backend.instance_id,
            invited_email: request.email.as_deref(),
            invited_title: Some(request.username.as_str()),
            home: user_kind == UserKind::Home,
            library_section_ids,
        };

        let response = self
            .identify(self.http.post(self.url("api/v2/shared_servers")))
            .json(&body)
            .send()
            .await
            .map_err(|error| transport_error(OPERATION, &self.backend, &error))?;
        if !response.status().is_success() {
            return Err(self.status_error(OPERATION, response).await);
        }

        let share = response.json::<ShareResponseDto>().await.map_err(|error| {
            ClientError::new(OPERATION, self.backend.clone(), ClientErrorCode::Unknown)
                .with_cause(format!("undecodable share response: {error}"))
        })?;
        debug!(
            backend = %self.backend,
            share_id = share.id,
            user_kind = %user_kind,
            "provisioned plex share",
        );
        Ok(share.into_account(self.backend.clone(), &request.username, user_kind))
    }

    async fn delete_user(&self, external_id: &ExternalUserId) -> Result<bool, ClientError> {
        const OPERATION: &str = "delete_user";

        let path = format!("api/v2/shared_servers/{id}", id = external_id.as_str());
        let response = self
            .identify(self.http.delete(self.url(&path)))
            .send()
            .await
            .map_err(|error| transport_error(OPERATION, &self.backend, &error))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(self.status_error(OPERATION, response).await);
        }
        Ok(true)
    }

    async fn set_enabled(
        &self,
        _external_id: &ExternalUserId,
        _enabled: bool,
    ) -> Result<bool, ClientError> {
        Err(ClientError::unsupported("set_enabled", self.backend.clone()))
    }

    async fn set_library_access(
        &self,
        external_id: &ExternalUserId,
        libraries: &[LibraryId],
    ) -> Result<bool, ClientError> {
        const OPERATION: &str = "set_library_access";

        let body = UpdateShareDto {
            library_section_ids: libraries.iter().map(LibraryId::as_str).collect(),
        };
        let path = format!("api/v2/shared_servers/{id}", id = external_id.as_str());
        let response = self
            .identify(self.http.put(self.url(&path)))
            .json(&body)
            .send()
            .await
            .map_err(|error| transport_error(OPERATION, &self.backend, &error))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(self.status_error(OPERATION, response).await);
        }
        Ok(true)
    }

    async fn update_permissions(
        &self,
        _external_id: &ExternalUserId,
        _update: &PermissionUpdate,
    ) -> Result<bool, ClientError> {
        Err(ClientError::unsupported(
            "update_permissions",
            self.backend.clone(),
        ))
    }

    async fn test_connection(&self) -> bool {
        let response = self.identify(self.http.get(self.url("api/v2/user"))).send();
        match response.await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                debug!(backend = %self.backend, %error, "plex connectivity probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
