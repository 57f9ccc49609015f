// src/error.rs
use reqwest::header::InvalidHeaderValue;
use serde_json::Value;
use thiserror::Error;

/// Transport-level failure raised by the bundled REST client.
///
/// Backend rejections keep their numeric Parse error code in
/// [`ParseError::Api`] so the domain mappers below can translate them.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("HTTP request failed: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("URL parsing failed: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("JSON processing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("JSON deserialization failed: {0}")]
    JsonDeserializationFailed(String),

    #[error("Parse API error (code {code}): {error}")]
    Api { code: i32, error: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(InvalidHeaderValue),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("No cached result for query against class {0}")]
    CacheMiss(String),

    #[error("SDK error: {0}")]
    SdkError(String),
}

impl ParseError {
    /// Creates a `ParseError` from an HTTP status code and a JSON response body.
    pub(crate) fn from_response(status_code: u16, response_body: Value) -> Self {
        let error_code = response_body
            .get("code")
            .and_then(|v| v.as_i64())
            .unwrap_or(i64::from(status_code)) as i32;
        let error_message = response_body
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown error")
            .to_string();

        ParseError::Api {
            code: error_code,
            error: error_message,
        }
    }

    /// The numeric Parse error code, when the failure came from the backend.
    pub fn backend_code(&self) -> Option<i32> {
        match self {
            ParseError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Domain error for object-fetch operations.
///
/// Beyond success (the absence of an error) the backend only ever
/// surfaces an undifferentiated failure here.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectError {
    #[error("unknown object error")]
    Unknown,
}

impl ObjectError {
    /// Maps a backend numeric code to an error variant. Code 200 is
    /// success and yields `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        log::info!("Mapping object error code: {}", code);
        match code {
            200 => None,
            _ => Some(ObjectError::Unknown),
        }
    }

    pub(crate) fn from_parse(error: &ParseError) -> Self {
        error
            .backend_code()
            .and_then(Self::from_code)
            .unwrap_or(ObjectError::Unknown)
    }
}

/// Domain error for login and user operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserError {
    /// Code 101, invalid username/password combination.
    #[error("invalid username/password combination")]
    InvalidCredentials,
    /// Code 202, the username is already registered.
    #[error("user already exists")]
    DuplicateUser,
    /// Code 203, the email is already in use.
    #[error("email already in use")]
    DuplicateEmail,
    /// Code 125, the email address is malformed.
    #[error("invalid email format")]
    InvalidEmailFormat,
    /// Code 111, a field value did not match the class schema.
    #[error("field type mismatch against class schema")]
    SchemaMismatch,
    /// The user dismissed the social provider's login dialog.
    #[error("user cancelled the social login")]
    UserCancelledSocialLogin,
    /// The requested login method is not implemented.
    #[error("login method not implemented")]
    NotImplemented,
    #[error("unknown user error")]
    Unknown,
}

impl UserError {
    /// Maps a backend numeric code to an error variant. Code 200 is
    /// success and yields `None`; unrecognized codes degrade to
    /// [`UserError::Unknown`].
    pub fn from_code(code: i32) -> Option<Self> {
        log::info!("Mapping user error code: {}", code);
        match code {
            101 => Some(UserError::InvalidCredentials),
            111 => Some(UserError::SchemaMismatch),
            125 => Some(UserError::InvalidEmailFormat),
            200 => None,
            202 => Some(UserError::DuplicateUser),
            203 => Some(UserError::DuplicateEmail),
            _ => Some(UserError::Unknown),
        }
    }

    pub(crate) fn from_parse(error: &ParseError) -> Self {
        error
            .backend_code()
            .and_then(Self::from_code)
            .unwrap_or(UserError::Unknown)
    }
}
