//! Jellyfin backend client.
//!
//! Jellyfin manages accounts locally, so every capability is available.
//! Enable state, library scoping, and permission flags all live on the user
//! policy, which the client reads, mutates, and writes back whole so fields
//! it does not understand survive the update.

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

use super::dto::{NewUserDto, PolicyDto, UserDto};

const JELLYFIN_CAPABILITIES: &[Capability] = &[
    Capability::CreateUser,
    Capability::DeleteUser,
    Capability::EnableDisable,
    Capability::LibraryAccess,
    Capability::PermissionUpdate,
];

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP settings for Jellyfin clients.
#[derive(Debug, Clone)]
pub struct JellyfinHttpSettings {
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for JellyfinHttpSettings {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Builds attempt-scoped [`JellyfinClient`]s over one shared connection pool.
pub struct JellyfinClientFactory {
    http: reqwest::Client,
}

impl JellyfinClientFactory {
    /// Create a factory with default HTTP settings.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_settings(JellyfinHttpSettings::default())
    }

    /// Create a factory with explicit HTTP settings.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn with_settings(settings: JellyfinHttpSettings) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self { http })
    }
}

impl BackendClientFactory for JellyfinClientFactory {
    fn kind(&self) -> BackendKind {
        BackendKind::Jellyfin
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new(JELLYFIN_CAPABILITIES)
    }

    fn client_for(&self, config: &BackendConfig) -> Box<dyn BackendClient> {
        Box::new(JellyfinClient {
            http: self.http.clone(),
            backend: BackendRef::new(BackendKind::Jellyfin, config.instance_id.clone()),
            endpoint: config.endpoint.clone(),
            api_token: config.api_token.clone(),
        })
    }
}

/// Account management for one Jellyfin server, scoped to one attempt.
pub struct JellyfinClient {
    http: reqwest::Client,
    backend: BackendRef,
    endpoint: Url,
    api_token: String,
}

impl JellyfinClient {
    fn authorise(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("X-Emby-Token", &self.api_token)
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

    /// Fetch a user's policy, apply `mutate`, and write the policy back.
    ///
    /// Returns `Ok(false)` when the user does not exist at either step.
    async fn modify_policy(
        &self,
        operation: &'static str,
        external_id: &ExternalUserId,
        mutate: impl FnOnce(&mut PolicyDto) + Send,
    ) -> Result<bool, ClientError> {
        let user_path = format!("Users/{id}", id = external_id.as_str());
        let response = self
            .authorise(self.http.get(self.url(&user_path)))
            .send()
            .await
            .map_err(|error| transport_error(operation, &self.backend, &error))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(self.status_error(operation, response).await);
        }
        let user = response.json::<UserDto>().await.map_err(|error| {
            ClientError::new(operation, self.backend.clone(), ClientErrorCode::Unknown)
                .with_cause(format!("undecodable user response: {error}"))
        })?;

        let mut policy = user.policy.unwrap_or_default();
        mutate(&mut policy);

        let policy_path = format!("Users/{id}/Policy", id = external_id.as_str());
        let response = self
            .authorise(self.http.post(self.url(&policy_path)))
            .json(&policy)
            .send()
            .await
            .map_err(|error| transport_error(operation, &self.backend, &error))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(self.status_error(operation, response).await);
        }
        Ok(true)
    }
}

/// Classify an unsuccessful Jellyfin status into a [`ClientError`].
///
/// Jellyfin rejects a duplicate username with a 400 (older releases used a
/// 409); both collapse to [`ClientErrorCode::UsernameTaken`] on account
/// creation paths.
fn map_status_error(
    operation: &'static str,
    backend: BackendRef,
    status: StatusCode,
    body: &[u8],
) -> ClientError {
    let code = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientErrorCode::InvalidCredentials,
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT if operation == "create_user" => {
            ClientErrorCode::UsernameTaken
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

fn apply_enabled(policy: &mut PolicyDto, enabled: bool) {
    policy.is_disabled = Some(!enabled);
}

fn apply_library_scope(policy: &mut PolicyDto, libraries: &[LibraryId]) {
    if libraries.is_empty() {
        policy.enable_all_folders = Some(true);
        policy.enabled_folders = Some(Vec::new());
    } else {
        policy.enable_all_folders = Some(false);
        policy.enabled_folders = Some(
            libraries
                .iter()
                .map(|library| library.as_str().to_owned())
                .collect(),
        );
    }
}

fn apply_permissions(policy: &mut PolicyDto, update: &PermissionUpdate) {
    if let Some(allow) = update.allow_downloads {
        policy.enable_content_downloading = Some(allow);
    }
    if let Some(allow) = update.allow_live_tv {
        policy.enable_live_tv_access = Some(allow);
    }
    if let Some(max) = update.max_sessions {
        policy.max_active_sessions = Some(max);
    }
}

#[async_trait]
impl BackendClient for JellyfinClient {
    fn backend(&self) -> &BackendRef {
        &self.backend
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new(JELLYFIN_CAPABILITIES)
    }

    async fn create_user(
        &self,
        request: &CreateUserRequest,
    ) -> Result<ExternalAccount, ClientError> {
        const OPERATION: &str = "create_user";

        let body = NewUserDto {
            name: request.username.as_str(),
            password: request.password.as_deref(),
        };
        let response = self
            .authorise(self.http.post(self.url("Users/New")))
            .json(&body)
            .send()
            .await
            .map_err(|error| transport_error(OPERATION, &self.backend, &error))?;
        if !response.status().is_success() {
            return Err(self.status_error(OPERATION, response).await);
        }
        let user = response.json::<UserDto>().await.map_err(|error| {
            ClientError::new(OPERATION, self.backend.clone(), ClientErrorCode::Unknown)
                .with_cause(format!("undecodable user response: {error}"))
        })?;
        debug!(backend = %self.backend, user_id = %user.id, "provisioned jellyfin user");
        Ok(ExternalAccount {
            backend: self.backend.clone(),
            external_id: ExternalUserId::new(user.id),
            username: request.username.clone(),
            email: request.email.clone(),
            user_kind: UserKind::Local,
        })
    }

    async fn delete_user(&self, external_id: &ExternalUserId) -> Result<bool, ClientError> {
        const OPERATION: &str = "delete_user";

        let path = format!("Users/{id}", id = external_id.as_str());
        let response = self
            .authorise(self.http.delete(self.url(&path)))
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
        external_id: &ExternalUserId,
        enabled: bool,
    ) -> Result<bool, ClientError> {
        self.modify_policy("set_enabled", external_id, |policy| {
            apply_enabled(policy, enabled);
        })
        .await
    }

    async fn set_library_access(
        &self,
        external_id: &ExternalUserId,
        libraries: &[LibraryId],
    ) -> Result<bool, ClientError> {
        self.modify_policy("set_library_access", external_id, |policy| {
            apply_library_scope(policy, libraries);
        })
        .await
    }

    async fn update_permissions(
        &self,
        external_id: &ExternalUserId,
        update: &PermissionUpdate,
    ) -> Result<bool, ClientError> {
        self.modify_policy("update_permissions", external_id, |policy| {
            apply_permissions(policy, update);
        })
        .await
    }

    async fn test_connection(&self) -> bool {
        let request = self.authorise(self.http.get(self.url("System/Info/Public")));
        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                debug!(backend = %self.backend, %error, "jellyfin connectivity probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
