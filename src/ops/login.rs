// src/ops/login.rs

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::runtime::Handle;

use crate::client::Parse;
use crate::error::UserError;
use crate::social::{SocialLogin, SocialProvider, DEFAULT_PROFILE_FIELDS, READ_PERMISSIONS};
use crate::user::ParseUser;

/// The authentication flow a login operation performs.
///
/// `Facebook` carries the optional comma-separated profile field list
/// requested from the provider when a brand-new account is enriched;
/// the default is [`DEFAULT_PROFILE_FIELDS`].
#[derive(Debug, Clone)]
pub enum LoginKind {
    Normal { username: String, password: String },
    Facebook { profile_fields: Option<String> },
    Twitter,
}

impl LoginKind {
    fn name(&self) -> &'static str {
        match self {
            LoginKind::Normal { .. } => "normal",
            LoginKind::Facebook { .. } => "facebook",
            LoginKind::Twitter => "twitter",
        }
    }
}

/// Terminal state of a login operation: the mapped error, the user
/// record when authentication reached one, and the provider profile map
/// gathered during social sign-up.
pub type LoginResult = (Option<UserError>, Option<ParseUser>, Option<Map<String, Value>>);

/// Completion callback for a login operation.
pub type LoginCompletion =
    Box<dyn FnOnce(Option<UserError>, Option<ParseUser>, Option<Map<String, Value>>) + Send + 'static>;

/// Authenticates a user against the Parse server, by password or
/// through a social identity provider. Login operations always report;
/// they have no cancellation hook.
pub struct LoginOperation {
    kind: LoginKind,
    provider: Option<Arc<dyn SocialProvider>>,
    completion: Option<LoginCompletion>,
    completion_context: Option<Handle>,
}

impl LoginOperation {
    pub fn new(kind: LoginKind) -> Self {
        Self {
            kind,
            provider: None,
            completion: None,
            completion_context: None,
        }
    }

    /// Wires in the social identity provider used by the `Facebook`
    /// login kind.
    pub fn with_provider(mut self, provider: Arc<dyn SocialProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Sets the completion callback and the runtime handle it is
    /// delivered on. With no handle the callback runs on the worker's
    /// runtime.
    pub fn on_complete(mut self, context: Option<Handle>, completion: LoginCompletion) -> Self {
        self.completion = Some(completion);
        self.completion_context = context;
        self
    }

    pub(crate) async fn run(mut self, client: Arc<Parse>) -> Option<LoginResult> {
        let result = match &self.kind {
            LoginKind::Normal { username, password } => {
                Self::normal_login(&client, username, password).await
            }
            LoginKind::Facebook { profile_fields } => {
                let fields = profile_fields.clone();
                match self.provider.clone() {
                    Some(provider) => Self::facebook_login(&client, provider, fields).await,
                    None => {
                        log::warn!("Facebook login requested but no social provider is configured");
                        (Some(UserError::Unknown), None, None)
                    }
                }
            }
            LoginKind::Twitter => {
                log::warn!("Twitter login is not implemented");
                (Some(UserError::NotImplemented), None, None)
            }
        };

        log::info!("Login operation of type {} finished", self.kind.name());

        if let Some(completion) = self.completion.take() {
            let context = self
                .completion_context
                .clone()
                .unwrap_or_else(Handle::current);
            let (error, user, extra_info) = result.clone();
            context.spawn(async move { completion(error, user, extra_info) });
        }

        Some(result)
    }

    async fn normal_login(client: &Parse, username: &str, password: &str) -> LoginResult {
        match client.login(username, password).await {
            Ok(user) => (None, Some(user), None),
            Err(error) => {
                let mapped = UserError::from_parse(&error);
                if mapped == UserError::InvalidCredentials {
                    log::info!("The given credentials for {} are not valid", username);
                }
                (Some(mapped), None, None)
            }
        }
    }

    /// Attempts a silent login with the provider's stored token; with
    /// no stored token the flow falls through to social sign-up.
    async fn facebook_login(
        client: &Parse,
        provider: Arc<dyn SocialProvider>,
        profile_fields: Option<String>,
    ) -> LoginResult {
        let Some(token) = provider.current_token() else {
            log::info!("No previously saved token, skipping to registration");
            return Self::facebook_sign_up(client, provider, profile_fields).await;
        };

        match client
            .login_with_auth_data(provider.provider_name(), token.to_auth_payload())
            .await
        {
            Ok(user) => {
                log::info!("User logged in through {}", provider.provider_name());
                (None, Some(user), None)
            }
            Err(error) => {
                log::warn!("There was an error logging in: {}", error);
                (Some(UserError::from_parse(&error)), None, None)
            }
        }
    }

    /// Sign-up flow: request read permissions, exchange the granted
    /// token with the backend, and for a brand-new account enrich the
    /// user record with the provider's profile details.
    async fn facebook_sign_up(
        client: &Parse,
        provider: Arc<dyn SocialProvider>,
        profile_fields: Option<String>,
    ) -> LoginResult {
        let token = match provider.log_in_with_read_permissions(READ_PERMISSIONS).await {
            Ok(SocialLogin::Authorized(token)) => token,
            Ok(SocialLogin::Cancelled) => {
                log::info!("The user cancelled the social login process");
                return (Some(UserError::UserCancelledSocialLogin), None, None);
            }
            Err(error) => {
                log::warn!("Something went wrong when logging with the provider: {}", error);
                return (Some(UserError::Unknown), None, None);
            }
        };

        let user = match client
            .login_with_auth_data(provider.provider_name(), token.to_auth_payload())
            .await
        {
            Ok(user) => user,
            Err(error) => return (Some(UserError::from_parse(&error)), None, None),
        };

        if !user.is_new {
            log::info!("The user is not new, logging in");
            return (None, Some(user), None);
        }

        let fields = profile_fields.as_deref().unwrap_or(DEFAULT_PROFILE_FIELDS);
        let details = match provider.profile_details(fields).await {
            Ok(details) => details,
            Err(error) => {
                log::warn!("Could not fetch profile details: {}", error);
                return (Some(UserError::Unknown), Some(user), None);
            }
        };

        Self::enrich_new_user(client, user, details).await
    }

    /// Maps the provider profile fields onto the new user record and
    /// persists it. The provider's `id` key names the social identity,
    /// not a user field, and is left out of the update.
    async fn enrich_new_user(
        client: &Parse,
        mut user: ParseUser,
        details: Map<String, Value>,
    ) -> LoginResult {
        let Some(object_id) = user.object_id.clone() else {
            log::warn!("New user record is missing its objectId, skipping enrichment");
            return (Some(UserError::Unknown), Some(user), Some(details));
        };

        let update: HashMap<String, Value> = details
            .iter()
            .filter(|(key, _)| key.as_str() != "id")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        if let Some(user_id) = details.get("id").and_then(Value::as_str) {
            log::info!("Details from user with id {} successfully acquired", user_id);
        }

        match client.update_user(&object_id, &update).await {
            Ok(()) => {
                user.fields.extend(update);
                (None, Some(user), Some(details))
            }
            Err(error) => {
                log::warn!("Error updating user {}: {}", object_id, error);
                (Some(UserError::from_parse(&error)), Some(user), Some(details))
            }
        }
    }
}
