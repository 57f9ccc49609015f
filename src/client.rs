// src/client.rs

use std::collections::HashMap;
use std::sync::RwLock;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cache::QueryCache;
use crate::config::ParseConfiguration;
use crate::error::ParseError;
use crate::query::{CachePolicy, ParseQuery};
use crate::user::{AuthDataRequest, LoginRequest, ParseUser, SignupRequest};

/// The client for interacting with a Parse Server instance.
///
/// `Parse` holds the connection details (server URL, application id,
/// client key), the session token of the currently authenticated user,
/// and the local query-result cache that backs the cache policies on
/// [`ParseQuery`]. Operations share one instance behind an `Arc`.
///
/// # Initialization
///
/// ```rust,no_run
/// use parse_ops::Parse;
/// # use parse_ops::ParseError;
/// # fn main() -> Result<(), ParseError> {
/// let client = Parse::new("http://localhost:1338/parse", "myAppId", Some("myClientKey"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Parse {
    pub server_url: String,
    pub(crate) app_id: String,
    pub(crate) client_key: Option<String>,
    pub(crate) http_client: Client,
    session_token: RwLock<Option<String>>,
    pub(crate) cache: QueryCache,
}

#[derive(serde::Deserialize, Debug)]
struct FindResponse {
    results: Vec<Value>,
}

#[derive(serde::Deserialize, Debug)]
struct CountResponse {
    count: u64,
}

impl Parse {
    /// Creates a new `Parse` client.
    ///
    /// The server URL is normalized: a missing scheme defaults to
    /// `http://` and a trailing `/parse` segment is stripped, so both
    /// `http://host/parse` and `http://host` configure the same base.
    pub fn new(
        server_url: &str,
        app_id: &str,
        client_key: Option<&str>,
    ) -> Result<Self, ParseError> {
        let mut temp_url_string = server_url.to_string();

        if !temp_url_string.starts_with("http://") && !temp_url_string.starts_with("https://") {
            temp_url_string = format!("http://{}", temp_url_string);
        }

        let parsed_server_url = Url::parse(&temp_url_string)?;
        if parsed_server_url.cannot_be_a_base() {
            return Err(ParseError::SdkError(format!(
                "The server_url '{}' resolved to '{}', which cannot be a base URL.",
                server_url, parsed_server_url
            )));
        }

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            "X-Parse-Application-Id",
            HeaderValue::from_str(app_id).map_err(ParseError::InvalidHeaderValue)?,
        );
        if let Some(key) = client_key {
            default_headers.insert(
                "X-Parse-Client-Key",
                HeaderValue::from_str(key).map_err(ParseError::InvalidHeaderValue)?,
            );
        }

        let http_client = Client::builder()
            .default_headers(default_headers)
            .build()
            .map_err(ParseError::ReqwestError)?;

        let mut final_server_url = parsed_server_url.as_str().trim_end_matches('/').to_string();
        if final_server_url.ends_with("/parse") {
            final_server_url.truncate(final_server_url.len() - "/parse".len());
        }

        log::debug!("Parse initialized with base server_url: {}", final_server_url);

        Ok(Self {
            server_url: final_server_url,
            app_id: app_id.to_string(),
            client_key: client_key.map(|s| s.to_string()),
            http_client,
            session_token: RwLock::new(None),
            cache: QueryCache::new(),
        })
    }

    /// Builds a client from a [`ParseConfiguration`] read from disk.
    pub fn from_configuration(configuration: &ParseConfiguration) -> Result<Self, ParseError> {
        Self::new(
            &configuration.server,
            &configuration.application_id,
            Some(&configuration.client_key),
        )
    }

    /// Returns the current session token, if a user is logged in.
    pub fn session_token(&self) -> Option<String> {
        self.session_token
            .read()
            .ok()
            .and_then(|token| token.clone())
    }

    /// Checks whether the client currently has an active session token.
    pub fn is_authenticated(&self) -> bool {
        self.session_token().is_some()
    }

    pub(crate) fn set_session_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.session_token.write() {
            *slot = token;
        }
    }

    // --- Query cache surface ---

    /// Whether the cache currently holds a result for this query.
    pub fn has_cached_result(&self, query: &ParseQuery) -> bool {
        self.cache.contains(&query.cache_fingerprint())
    }

    /// Evicts the cached result for this query, if any.
    pub fn clear_cached_result(&self, query: &ParseQuery) {
        self.cache.remove(&query.cache_fingerprint());
    }

    /// Evicts every cached query result.
    pub fn clear_query_cache(&self) {
        self.cache.clear();
    }

    // --- Query execution ---

    /// Executes the query under its cache policy and returns matching
    /// objects deserialized as `T`.
    pub async fn find<T: DeserializeOwned>(&self, query: &ParseQuery) -> Result<Vec<T>, ParseError> {
        let fingerprint = query.cache_fingerprint();

        match query.cache_policy() {
            CachePolicy::IgnoreCache => {
                let results = self.find_over_network(query).await?;
                deserialize_results(results)
            }
            CachePolicy::CacheElseNetwork => {
                if let Some(cached) = self.cache.get(&fingerprint) {
                    log::debug!("Serving query {} from cache", fingerprint);
                    return deserialize_results(cached);
                }
                let results = self.find_over_network(query).await?;
                self.cache.store(&fingerprint, results.clone());
                deserialize_results(results)
            }
            CachePolicy::NetworkElseCache => match self.find_over_network(query).await {
                Ok(results) => {
                    self.cache.store(&fingerprint, results.clone());
                    deserialize_results(results)
                }
                Err(network_error) => match self.cache.get(&fingerprint) {
                    Some(cached) => {
                        log::debug!(
                            "Network fetch failed ({}), serving query {} from cache",
                            network_error,
                            fingerprint
                        );
                        deserialize_results(cached)
                    }
                    None => Err(network_error),
                },
            },
            CachePolicy::CacheOnly => match self.cache.get(&fingerprint) {
                Some(cached) => deserialize_results(cached),
                None => Err(ParseError::CacheMiss(query.class_name().to_string())),
            },
            CachePolicy::NetworkOnly => {
                let results = self.find_over_network(query).await?;
                self.cache.store(&fingerprint, results.clone());
                deserialize_results(results)
            }
        }
    }

    async fn find_over_network(&self, query: &ParseQuery) -> Result<Value, ParseError> {
        let endpoint = format!("classes/{}", query.class_name());
        let params = query.build_query_params();
        let (_, body) = self
            .send(Method::GET, &endpoint, &params, None)
            .await?;
        let response: FindResponse = serde_json::from_value(body)?;
        Ok(Value::Array(response.results))
    }

    /// Counts the objects matching this query. Count queries always go
    /// to the network; they are a paging-plan input, not a result set.
    pub async fn count(&self, query: &ParseQuery) -> Result<u64, ParseError> {
        let mut query_clone = query.clone();
        query_clone.limit(0); // Limit 0 is for count
        let endpoint = format!("classes/{}", query_clone.class_name());
        let mut params = query_clone.build_query_params();
        params.push(("count".to_string(), "1".to_string()));

        let (_, body) = self
            .send(Method::GET, &endpoint, &params, None)
            .await?;
        let response: CountResponse = serde_json::from_value(body)?;
        Ok(response.count)
    }

    // --- Authentication ---

    /// Logs a user in with username/password credentials and stores the
    /// returned session token on the client.
    pub async fn login(&self, username: &str, password: &str) -> Result<ParseUser, ParseError> {
        let body = serde_json::to_value(LoginRequest { username, password })?;
        let (_, response) = self.send(Method::POST, "login", &[], Some(body)).await?;
        let user: ParseUser = serde_json::from_value(response)?;
        self.set_session_token(user.session_token.clone());
        Ok(user)
    }

    /// Creates a new user account. On success the returned record is
    /// marked [`ParseUser::is_new`] and its session token is stored.
    pub async fn signup(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<ParseUser, ParseError> {
        let body = serde_json::to_value(SignupRequest {
            username,
            password,
            email,
        })?;
        let (_, response) = self.send(Method::POST, "users", &[], Some(body)).await?;
        let mut user: ParseUser = serde_json::from_value(response)?;
        user.is_new = true;
        self.set_session_token(user.session_token.clone());
        Ok(user)
    }

    /// Logs in (or signs up) a user through a social identity provider's
    /// token. A `201 Created` response marks the account as brand new.
    pub async fn login_with_auth_data(
        &self,
        provider: &str,
        auth_payload: Value,
    ) -> Result<ParseUser, ParseError> {
        let mut auth_data = HashMap::new();
        auth_data.insert(provider.to_string(), auth_payload);
        let body = serde_json::to_value(AuthDataRequest { auth_data })?;

        let (status, response) = self.send(Method::POST, "users", &[], Some(body)).await?;
        let mut user: ParseUser = serde_json::from_value(response)?;
        user.is_new = status == StatusCode::CREATED;
        self.set_session_token(user.session_token.clone());
        Ok(user)
    }

    /// Updates fields on an existing user record, authenticated by the
    /// current session token.
    pub async fn update_user(
        &self,
        object_id: &str,
        fields: &HashMap<String, Value>,
    ) -> Result<(), ParseError> {
        if object_id.is_empty() {
            return Err(ParseError::InvalidInput(
                "Object ID cannot be empty".to_string(),
            ));
        }
        let endpoint = format!("users/{}", object_id);
        let body = serde_json::to_value(fields)?;
        let _ = self.send(Method::PUT, &endpoint, &[], Some(body)).await?;
        Ok(())
    }

    // Central request helper. Builds the /parse/<endpoint> URL, applies
    // the session token when one is held, sends, and parses the body;
    // backend rejections become `ParseError::Api` with their code.
    pub(crate) async fn send(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(String, String)],
        body: Option<Value>,
    ) -> Result<(StatusCode, Value), ParseError> {
        let base_url = Url::parse(&self.server_url).map_err(|e| {
            ParseError::InvalidUrl(format!(
                "Base server URL '{}' is invalid: {}",
                self.server_url, e
            ))
        })?;

        let api_path = format!("/parse/{}", endpoint.trim_start_matches('/'));
        let mut full_url = base_url.join(&api_path).map_err(|e| {
            ParseError::InvalidUrl(format!(
                "Failed to join base URL '{}' with API path '{}': {}",
                base_url, api_path, e
            ))
        })?;

        for (key, value) in params {
            full_url.query_pairs_mut().append_pair(key, value);
        }

        let mut request_builder = self.http_client.request(method.clone(), full_url.clone());

        let mut headers = HeaderMap::new();
        if let Some(token) = self.session_token() {
            headers.insert(
                "X-Parse-Session-Token",
                HeaderValue::from_str(&token).map_err(ParseError::InvalidHeaderValue)?,
            );
        }
        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        request_builder = request_builder.headers(headers);

        if let Some(body_value) = &body {
            request_builder = request_builder.body(serde_json::to_string(body_value)?);
        }

        log::debug!(
            "Parse request: Method={}, URL={}, Body={}",
            method,
            full_url.as_str(),
            body.is_some()
        );

        let response = request_builder
            .send()
            .await
            .map_err(ParseError::ReqwestError)?;

        let status = response.status();
        let body_bytes = response.bytes().await.map_err(ParseError::ReqwestError)?;

        if status.is_success() {
            if body_bytes.is_empty() {
                return Ok((status, Value::Object(serde_json::Map::new())));
            }
            let value = serde_json::from_slice(&body_bytes).map_err(|e| {
                ParseError::JsonDeserializationFailed(format!(
                    "Error: {}, Body: {}",
                    e,
                    String::from_utf8_lossy(&body_bytes)
                ))
            })?;
            Ok((status, value))
        } else {
            let error_body_string = String::from_utf8_lossy(&body_bytes).to_string();
            log::warn!(
                "Request failed with status {} and body: {}",
                status,
                error_body_string
            );
            match serde_json::from_slice::<Value>(&body_bytes) {
                Ok(json_value) => Err(ParseError::from_response(status.as_u16(), json_value)),
                Err(_) => {
                    let fallback_json = serde_json::json!({
                        "code": status.as_u16(),
                        "error": error_body_string
                    });
                    Err(ParseError::from_response(status.as_u16(), fallback_json))
                }
            }
        }
    }
}

fn deserialize_results<T: DeserializeOwned>(results: Value) -> Result<Vec<T>, ParseError> {
    serde_json::from_value(results).map_err(|e| {
        ParseError::JsonDeserializationFailed(format!("Error deserializing results: {}", e))
    })
}
