// src/social.rs

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Profile fields requested from the provider's graph API when a
/// brand-new account is enriched and the caller supplied no list.
pub const DEFAULT_PROFILE_FIELDS: &str = "id,email,first_name,last_name,gender,picture,age_range";

/// Read permissions requested during the social sign-up flow.
pub const READ_PERMISSIONS: &[&str] = &["public_profile", "email"];

/// An access token issued by a social identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialToken {
    pub user_id: String,
    pub access_token: String,
    pub expiration_date: Option<chrono::DateTime<chrono::Utc>>,
}

impl SocialToken {
    /// The `authData` payload Parse expects for this token.
    pub(crate) fn to_auth_payload(&self) -> Value {
        let mut payload = json!({
            "id": self.user_id,
            "access_token": self.access_token,
        });
        if let Some(expiration) = self.expiration_date {
            payload["expiration_date"] = json!(expiration.to_rfc3339());
        }
        payload
    }
}

/// Outcome of presenting the provider's login dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocialLogin {
    /// The user granted the requested permissions.
    Authorized(SocialToken),
    /// The user dismissed the dialog without logging in.
    Cancelled,
}

#[derive(Error, Debug)]
#[error("social provider error: {0}")]
pub struct SocialProviderError(pub String);

/// External collaborator supplying social identity: token storage, the
/// interactive permission dialog, and the graph-style profile endpoint.
#[async_trait]
pub trait SocialProvider: Send + Sync {
    /// The Parse `authData` provider key, e.g. `"facebook"`.
    fn provider_name(&self) -> &str;

    /// A previously stored token, used for silent re-authentication.
    fn current_token(&self) -> Option<SocialToken>;

    /// Presents the provider's login dialog requesting the given read
    /// permissions.
    async fn log_in_with_read_permissions(
        &self,
        permissions: &[&str],
    ) -> Result<SocialLogin, SocialProviderError>;

    /// Fetches profile details for the logged-in identity, keyed by a
    /// comma-separated field list.
    async fn profile_details(
        &self,
        fields: &str,
    ) -> Result<Map<String, Value>, SocialProviderError>;
}
