//! Wire DTOs for the Jellyfin user API.
//!
//! The user policy is read-modify-write: the typed fields cover what this
//! adapter mutates and the flattened map carries every other policy field
//! back to the server untouched.

use serde::{Deserialize, Serialize};

/// Body for `POST /Users/New`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct NewUserDto<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<&'a str>,
}

/// A Jellyfin user as returned by `GET /Users/{id}` and `POST /Users/New`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct UserDto {
    pub id: String,
    pub name: String,
    pub policy: Option<PolicyDto>,
}

/// The subset of the user policy this adapter mutates.
///
/// Absent typed fields stay absent on write-back; unknown fields round-trip
/// through `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct PolicyDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_all_folders: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_folders: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_content_downloading: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_live_tv_access: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_active_sessions: Option<u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    //! Decode coverage, including unknown-field round-tripping.

    use super::*;

    #[test]
    fn user_decodes_with_policy() {
        let body = r#"{
            "Id": "abc-123",
            "Name": "alice",
            "Policy": { "IsDisabled": false, "EnableAllFolders": true }
        }"#;
        let user: UserDto = serde_json::from_str(body).expect("decodes");
        assert_eq!(user.id, "abc-123");
        assert_eq!(user.name, "alice");
        let policy = user.policy.expect("policy present");
        assert_eq!(policy.is_disabled, Some(false));
        assert_eq!(policy.enable_all_folders, Some(true));
    }

    #[test]
    fn policy_round_trips_unknown_fields() {
        let body = r#"{
            "IsDisabled": false,
            "IsAdministrator": true,
            "RemoteClientBitrateLimit": 8000000
        }"#;
        let policy: PolicyDto = serde_json::from_str(body).expect("decodes");
        assert_eq!(policy.extra.get("IsAdministrator"), Some(&true.into()));

        let json = serde_json::to_value(&policy).expect("serialises");
        assert_eq!(json["IsAdministrator"], true);
        assert_eq!(json["RemoteClientBitrateLimit"], 8_000_000);
        assert!(json.get("EnabledFolders").is_none());
    }

    #[test]
    fn new_user_omits_an_absent_password() {
        let body = NewUserDto {
            name: "alice",
            password: None,
        };
        let json = serde_json::to_value(&body).expect("serialises");
        assert_eq!(json["Name"], "alice");
        assert!(json.get("Password").is_none());
    }
}
