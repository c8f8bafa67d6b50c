//! Cosmos DB and Service Bus connection string parsing. Storage connection
//! strings go through `azure_storage::ConnectionString`.
//!
//! Both use one textual format: `Key=Value` segments separated by
//! `;`. Keys are matched case-insensitively and values keep everything after
//! the first `=`, so base64 account keys survive intact.

use std::collections::HashMap;

use url::Url;

use crate::error::{Error, Result};

/// A parsed connection string.
#[derive(Debug, Clone, Default)]
pub struct ConnectionString {
    pairs: HashMap<String, String>,
}

impl ConnectionString {
    /// Parses a connection string into its key/value pairs.
    pub fn parse(input: &str) -> Result<Self> {
        let mut pairs = HashMap::new();

        for segment in input.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }

            let (key, value) = segment.split_once('=').ok_or_else(|| {
                Error::InvalidConnectionString(format!("segment '{}' has no '='", segment))
            })?;

            let key = key.trim();
            if key.is_empty() {
                return Err(Error::InvalidConnectionString(format!(
                    "segment '{}' has an empty key",
                    segment
                )));
            }

            pairs.insert(key.to_ascii_lowercase(), value.trim().to_string());
        }

        Ok(Self { pairs })
    }

    /// Returns the value for `key`, ignoring case.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Returns the value for `key` or an error naming the missing key.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| Error::InvalidConnectionString(format!("missing '{}'", key)))
    }

    /// Returns true if the connection string has no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Cosmos DB connection string.
#[derive(Debug, Clone)]
pub struct CosmosConnectionString {
    pub account_endpoint: String,
    pub account_key: String,
}

impl CosmosConnectionString {
    /// Parses a Cosmos DB connection string.
    pub fn parse(input: &str) -> Result<Self> {
        let cs = ConnectionString::parse(input)?;

        let account_endpoint = cs.require("AccountEndpoint")?.to_string();
        Url::parse(&account_endpoint).map_err(|e| {
            Error::InvalidConnectionString(format!(
                "AccountEndpoint '{}' is not a URL: {}",
                account_endpoint, e
            ))
        })?;

        Ok(Self {
            account_endpoint,
            account_key: cs.require("AccountKey")?.to_string(),
        })
    }

    /// Returns the account name: the first label of the endpoint host.
    pub fn account_name(&self) -> String {
        Url::parse(&self.account_endpoint)
            .ok()
            .and_then(|url| url.host_str().map(|h| h.split('.').next().unwrap_or(h).to_string()))
            .unwrap_or_default()
    }
}

/// Service Bus connection string.
#[derive(Debug, Clone)]
pub struct ServiceBusConnectionString {
    pub endpoint: String,
    pub namespace: String,
    pub shared_access_key_name: String,
    pub shared_access_key: String,
    pub use_development_emulator: bool,
}

impl ServiceBusConnectionString {
    /// Parses a Service Bus connection string.
    pub fn parse(input: &str) -> Result<Self> {
        let cs = ConnectionString::parse(input)?;

        let endpoint = cs.require("Endpoint")?.to_string();
        let url = Url::parse(&endpoint).map_err(|e| {
            Error::InvalidConnectionString(format!("Endpoint '{}' is not a URL: {}", endpoint, e))
        })?;
        let host = url.host_str().ok_or_else(|| {
            Error::InvalidConnectionString(format!("Endpoint '{}' has no host", endpoint))
        })?;
        let namespace = host.split('.').next().unwrap_or(host).to_string();

        let use_development_emulator = cs
            .get("UseDevelopmentEmulator")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        Ok(Self {
            namespace,
            shared_access_key_name: cs.require("SharedAccessKeyName")?.to_string(),
            shared_access_key: cs.require("SharedAccessKey")?.to_string(),
            use_development_emulator,
            endpoint,
        })
    }
}
