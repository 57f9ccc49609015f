// src/user.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An authenticated Parse user record.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ParseUser {
    #[serde(rename = "objectId")]
    pub object_id: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "emailVerified")]
    pub email_verified: Option<bool>,
    #[serde(rename = "sessionToken")]
    pub session_token: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
    /// Whether the backend created this account during the call that
    /// returned it. Set from the response status, never serialized.
    #[serde(skip)]
    pub is_new: bool,
}

// Request body for user login
#[derive(Serialize, Debug)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

// Request body for user signup
#[derive(Serialize, Debug)]
pub(crate) struct SignupRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
}

// Request body for a social-token login/signup: {"authData": {"<provider>": {...}}}
#[derive(Serialize, Debug)]
pub(crate) struct AuthDataRequest {
    #[serde(rename = "authData")]
    pub auth_data: HashMap<String, Value>,
}
