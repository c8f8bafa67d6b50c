//! SDK client construction.
//!
//! Storage clients authenticate with the account key from the storage
//! connection string, or with a token credential when that string is empty.
//! Cosmos DB uses the primary key from its connection string and Service Bus
//! the shared access policy from its own.

use azure_data_cosmos::prelude::{
    AuthorizationToken, CloudLocation as CosmosLocation, CosmosClient, CosmosClientBuilder,
};
use azure_data_tables::clients::TableServiceClientBuilder;
use azure_data_tables::prelude::TableServiceClient;
use azure_storage::{CloudLocation, ConnectionString, EndpointProtocol, StorageCredentials};
use azure_storage_blobs::prelude::{BlobServiceClient, ClientBuilder};
use azure_storage_queues::{QueueServiceClient, QueueServiceClientBuilder};
use tracing::debug;
use url::Url;

use crate::config::{Config, DEFAULT_ACCOUNT, DEFAULT_ACCOUNT_KEY};
use crate::connection_string::{CosmosConnectionString, ServiceBusConnectionString};
use crate::error::{Error, Result};

/// Storage service a client is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageService {
    Blob,
    Queue,
    Table,
}

impl StorageService {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageService::Blob => "blob",
            StorageService::Queue => "queue",
            StorageService::Table => "table",
        }
    }

    /// Port the service listens on under `UseDevelopmentStorage=true`.
    pub fn development_port(&self) -> u16 {
        match self {
            StorageService::Blob => 10000,
            StorageService::Queue => 10001,
            StorageService::Table => 10002,
        }
    }
}

/// Resolves the location and credentials for one storage service.
pub fn storage_location(
    config: &Config,
    service: StorageService,
) -> Result<(CloudLocation, StorageCredentials)> {
    if config.uses_token_credential() {
        let uri = match service {
            StorageService::Blob => &config.blob_uri,
            StorageService::Queue => &config.queue_uri,
            StorageService::Table => {
                return Err(Error::Config(
                    "the table client requires a storage connection string".to_string(),
                ))
            }
        };
        let account = account_from_uri(uri)?;
        let credential = azure_identity::create_credential()?;
        debug!(service = service.as_str(), %account, "using token credential");

        return Ok((
            CloudLocation::Custom {
                account,
                uri: uri.trim_end_matches('/').to_string(),
            },
            StorageCredentials::token_credential(credential),
        ));
    }

    let cs = ConnectionString::new(&config.storage_connection_string)?;

    if cs.use_development_storage == Some(true) {
        let uri = format!(
            "http://127.0.0.1:{}/{}",
            service.development_port(),
            DEFAULT_ACCOUNT
        );
        debug!(service = service.as_str(), %uri, "using development storage");

        return Ok((
            CloudLocation::Custom {
                account: DEFAULT_ACCOUNT.to_string(),
                uri,
            },
            StorageCredentials::access_key(DEFAULT_ACCOUNT, DEFAULT_ACCOUNT_KEY),
        ));
    }

    let account = cs
        .account_name
        .ok_or_else(|| Error::InvalidConnectionString("missing 'AccountName'".to_string()))?
        .to_string();
    let endpoint = match service {
        StorageService::Blob => cs.blob_endpoint,
        StorageService::Queue => cs.queue_endpoint,
        StorageService::Table => cs.table_endpoint,
    };
    let uri = match endpoint {
        Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
        None => {
            let protocol = match cs.default_endpoints_protocol {
                Some(EndpointProtocol::Http) => "http",
                _ => "https",
            };
            format!(
                "{}://{}.{}.{}",
                protocol,
                account,
                service.as_str(),
                cs.endpoint_suffix.unwrap_or("core.windows.net")
            )
        }
    };
    let credentials = cs.storage_credentials()?;
    debug!(service = service.as_str(), %account, %uri, "using connection string");

    Ok((CloudLocation::Custom { account, uri }, credentials))
}

/// Derives the account name from a storage endpoint. Emulator endpoints carry
/// it as the first path segment, cloud endpoints as the first host label.
pub fn account_from_uri(uri: &str) -> Result<String> {
    let url = Url::parse(uri)
        .map_err(|e| Error::Config(format!("invalid storage endpoint '{}': {}", uri, e)))?;

    let from_path = url
        .path_segments()
        .and_then(|mut segments| segments.next())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let from_host = || {
        url.host_str()
            .filter(|h| h.parse::<std::net::IpAddr>().is_err() && *h != "localhost")
            .and_then(|h| h.split('.').next())
            .map(str::to_string)
    };

    from_path
        .or_else(from_host)
        .ok_or_else(|| Error::Config(format!("cannot derive an account name from '{}'", uri)))
}

/// Creates the Blob service client.
pub fn blob_service_client(config: &Config) -> Result<BlobServiceClient> {
    let (location, credentials) = storage_location(config, StorageService::Blob)?;
    Ok(ClientBuilder::with_location(location, credentials).blob_service_client())
}

/// Creates the Queue service client.
pub fn queue_service_client(config: &Config) -> Result<QueueServiceClient> {
    let (location, credentials) = storage_location(config, StorageService::Queue)?;
    Ok(QueueServiceClientBuilder::with_location(location, credentials).build())
}

/// Creates the Table service client.
pub fn table_service_client(config: &Config) -> Result<TableServiceClient> {
    let (location, credentials) = storage_location(config, StorageService::Table)?;
    Ok(TableServiceClientBuilder::with_location(location, credentials).build())
}

/// Creates the Cosmos DB client.
pub fn cosmos_client(config: &Config) -> Result<CosmosClient> {
    let cs = CosmosConnectionString::parse(&config.cosmos_connection_string)?;
    let auth_token = AuthorizationToken::primary_key(&cs.account_key)?;
    debug!(account = %cs.account_name(), endpoint = %cs.account_endpoint, "creating cosmos client");

    let location = CosmosLocation::Custom {
        uri: cs.account_endpoint.trim_end_matches('/').to_string(),
        auth_token,
    };
    Ok(CosmosClientBuilder::with_location(location).build())
}

/// Validates the Service Bus connection string and returns it for the AMQP
/// client, which parses it again on connect.
pub fn service_bus_connection(config: &Config) -> Result<&str> {
    let cs = ServiceBusConnectionString::parse(&config.service_bus_connection_string)?;
    debug!(
        namespace = %cs.namespace,
        endpoint = %cs.endpoint,
        policy = %cs.shared_access_key_name,
        emulator = cs.use_development_emulator,
        "using service bus connection string"
    );
    Ok(&config.service_bus_connection_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BLOB_EMULATOR_URI, DEFAULT_ACCOUNT};

    #[test]
    fn test_account_from_emulator_uri() {
        assert_eq!(account_from_uri(BLOB_EMULATOR_URI).unwrap(), DEFAULT_ACCOUNT);
    }

    #[test]
    fn test_account_from_cloud_uri() {
        assert_eq!(
            account_from_uri("https://contoso.blob.core.windows.net/").unwrap(),
            "contoso"
        );
    }

    #[test]
    fn test_account_from_bare_ip_fails() {
        assert!(account_from_uri("http://127.0.0.1:40000").is_err());
        assert!(account_from_uri("not a uri").is_err());
    }

    #[test]
    fn test_storage_location_from_connection_string() {
        let config = Config::default();
        let (location, _) = storage_location(&config, StorageService::Queue).unwrap();
        let CloudLocation::Custom { account, uri } = location else {
            panic!("expected a custom location");
        };
        assert_eq!(account, DEFAULT_ACCOUNT);
        assert_eq!(uri, "http://127.0.0.1:40001/devstoreaccount1");
    }

    #[test]
    fn test_table_requires_connection_string() {
        let config = Config {
            storage_connection_string: String::new(),
            ..Config::default()
        };
        assert!(matches!(
            storage_location(&config, StorageService::Table),
            Err(Error::Config(_))
        ));
    }

    fn location_uri(connection_string: &str, service: StorageService) -> String {
        let config = Config {
            storage_connection_string: connection_string.to_string(),
            ..Config::default()
        };
        let (location, _) = storage_location(&config, service).unwrap();
        let CloudLocation::Custom { uri, .. } = location else {
            panic!("expected a custom location");
        };
        uri
    }

    #[test]
    fn test_development_storage_shorthand() {
        assert_eq!(
            location_uri("UseDevelopmentStorage=true", StorageService::Blob),
            "http://127.0.0.1:10000/devstoreaccount1"
        );
        assert_eq!(
            location_uri("UseDevelopmentStorage=true", StorageService::Table),
            "http://127.0.0.1:10002/devstoreaccount1"
        );
    }

    #[test]
    fn test_default_endpoints_from_account() {
        let cs = "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=a2V5";
        assert_eq!(
            location_uri(cs, StorageService::Blob),
            "https://acct.blob.core.windows.net"
        );
        assert_eq!(
            location_uri(cs, StorageService::Queue),
            "https://acct.queue.core.windows.net"
        );
    }

    #[test]
    fn test_storage_location_requires_account() {
        let config = Config {
            storage_connection_string: "AccountKey=a2V5".to_string(),
            ..Config::default()
        };
        assert!(storage_location(&config, StorageService::Blob).is_err());
    }

    #[test]
    fn test_service_bus_connection_is_validated() {
        let config = Config::default();
        assert_eq!(
            service_bus_connection(&config).unwrap(),
            config.service_bus_connection_string
        );

        let config = Config {
            service_bus_connection_string: "Endpoint=sb://localhost".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            service_bus_connection(&config),
            Err(Error::InvalidConnectionString(_))
        ));
    }
}
