//! Wire DTOs for the plex.tv v2 API.
//!
//! DTOs stay inside the adapter: they decode the wire shape and convert into
//! domain types at the boundary.

use serde::{Deserialize, Serialize};

use crate::domain::{BackendRef, ExternalAccount, ExternalUserId, UserKind, Username};

/// Body for creating a shared-server entry (friend invite or home user).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ShareRequestDto<'a> {
    pub machine_identifier: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invited_email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invited_title: Option<&'a str>,
    pub home: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub library_section_ids: Vec<&'a str>,
}

/// Body for rescoping an existing shared-server entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateShareDto<'a> {
    pub library_section_ids: Vec<&'a str>,
}

/// The invited account, present once plex.tv resolved the address.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InvitedDto {
    pub username: Option<String>,
    pub email: Option<String>,
}

/// A shared-server entry as returned on creation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ShareResponseDto {
    pub id: i64,
    pub invited: Option<InvitedDto>,
}

impl ShareResponseDto {
    /// Convert into a domain account.
    ///
    /// plex.tv may not know a username yet for a pending invite, so the
    /// redeemer's requested username is the fallback.
    pub(crate) fn into_account(
        self,
        backend: BackendRef,
        requested_username: &Username,
        user_kind: UserKind,
    ) -> ExternalAccount {
        let invited = self.invited;
        let username = invited
            .as_ref()
            .and_then(|i| i.username.as_deref())
            .and_then(|name| Username::new(name).ok())
            .unwrap_or_else(|| requested_username.clone());
        ExternalAccount {
            backend,
            external_id: ExternalUserId::new(self.id.to_string()),
            username,
            email: invited.and_then(|i| i.email),
            user_kind,
        }
    }
}

/// An OAuth PIN as returned by `POST`/`GET /api/v2/pins`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PinDto {
    pub id: i64,
    pub code: String,
    pub auth_token: Option<String>,
}
