// src/config.rs

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Connection settings for a Parse Server backend, read once at startup
/// from a JSON configuration file carrying the application identifier,
/// the client key and the server URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParseConfiguration {
    #[serde(rename = "applicationId")]
    pub application_id: String,
    #[serde(rename = "clientKey")]
    pub client_key: String,
    pub server: String,
}

impl ParseConfiguration {
    /// Reads a configuration from the given file.
    ///
    /// An unreadable or malformed file yields `None` after logging the
    /// diagnostic; no configuration is installed in that case.
    pub fn read_from(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(error) => {
                log::warn!(
                    "Could not read Parse configuration from {}: {}",
                    path.display(),
                    error
                );
                return None;
            }
        };

        match serde_json::from_slice(&data) {
            Ok(configuration) => Some(configuration),
            Err(error) => {
                log::warn!(
                    "Malformed Parse configuration at {}: {}",
                    path.display(),
                    error
                );
                None
            }
        }
    }
}
