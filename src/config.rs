//! Scenario configuration.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::scenario::Scenario;

/// Default account name for development storage.
pub const DEFAULT_ACCOUNT: &str = "devstoreaccount1";

/// Default account key for development storage (base64 encoded).
pub const DEFAULT_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

/// Blob emulator endpoint.
pub const BLOB_EMULATOR_URI: &str = "http://127.0.0.1:40000/devstoreaccount1";

/// Queue emulator endpoint.
pub const QUEUE_EMULATOR_URI: &str = "http://127.0.0.1:40001/devstoreaccount1";

/// Table emulator endpoint.
pub const TABLE_EMULATOR_URI: &str = "http://127.0.0.1:40002/devstoreaccount1";

/// Connection string for the storage emulators (Blob, Queue, Table).
pub const STORAGE_EMULATOR_CONNECTION_STRING: &str = "DefaultEndpointsProtocol=http;AccountName=devstoreaccount1;AccountKey=Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==;BlobEndpoint=http://127.0.0.1:40000/devstoreaccount1;QueueEndpoint=http://127.0.0.1:40001/devstoreaccount1;TableEndpoint=http://127.0.0.1:40002/devstoreaccount1;";

/// Connection string for the Cosmos DB emulator (plain HTTP).
pub const COSMOS_EMULATOR_CONNECTION_STRING: &str = "AccountEndpoint=http://localhost:8081/;AccountKey=C2y6yDjf5/R+ob0N8A7Cgv30VRDJIWEHLM+4QDU5DE2nQ9nDuVTqobD4b8mGGyPMbIZnqyMsEcaGQy67XIw/Jw==";

/// Connection string for the Service Bus emulator.
pub const SERVICE_BUS_EMULATOR_CONNECTION_STRING: &str = "Endpoint=sb://localhost;SharedAccessKeyName=RootManageSharedAccessKey;SharedAccessKey=SAS_KEY_VALUE;UseDevelopmentEmulator=true;";

/// Default blob container name.
pub const DEFAULT_CONTAINER: &str = "testcontainer";

/// Default storage queue name.
pub const DEFAULT_QUEUE: &str = "testqueue";

/// Default table name.
pub const DEFAULT_TABLE: &str = "testtable";

/// Default Cosmos DB database name.
pub const DEFAULT_COSMOS_DATABASE: &str = "testdb";

/// Default Cosmos DB container name.
pub const DEFAULT_COSMOS_CONTAINER: &str = "testcontainer";

/// Default Service Bus queue name.
pub const DEFAULT_SERVICE_BUS_QUEUE: &str = "queue.1";

/// Default number of seconds the queue scenario lets its poller run.
pub const DEFAULT_POLL_WINDOW_SECS: u64 = 15;

/// Command-line arguments for the smoke runner.
#[derive(Parser, Debug, Clone)]
#[command(name = "azure-smoke")]
#[command(about = "Smoke scenarios for Azure SDK clients against local emulators")]
#[command(version)]
pub struct Args {
    /// Scenarios to run. Runs all of them when omitted.
    #[arg(value_enum)]
    pub scenarios: Vec<Scenario>,

    /// Storage connection string (Blob, Queue, Table). Pass an empty string
    /// to authenticate with a token credential instead.
    #[arg(
        long,
        env = "AZURE_STORAGE_CONNECTION_STRING",
        default_value = STORAGE_EMULATOR_CONNECTION_STRING,
        hide_default_value = true
    )]
    pub storage_connection_string: String,

    /// Blob endpoint used with a token credential.
    #[arg(long, default_value = BLOB_EMULATOR_URI)]
    pub blob_uri: String,

    /// Queue endpoint used with a token credential.
    #[arg(long, default_value = QUEUE_EMULATOR_URI)]
    pub queue_uri: String,

    /// Cosmos DB connection string.
    #[arg(
        long,
        env = "AZURE_COSMOS_CONNECTION_STRING",
        default_value = COSMOS_EMULATOR_CONNECTION_STRING,
        hide_default_value = true
    )]
    pub cosmos_connection_string: String,

    /// Service Bus connection string.
    #[arg(
        long,
        env = "AZURE_SERVICEBUS_CONNECTION_STRING",
        default_value = SERVICE_BUS_EMULATOR_CONNECTION_STRING,
        hide_default_value = true
    )]
    pub service_bus_connection_string: String,

    /// Directory blobs are downloaded into.
    #[arg(long, default_value = ".")]
    pub download_dir: PathBuf,

    /// Seconds the queue scenario lets its poller run.
    #[arg(long, default_value_t = DEFAULT_POLL_WINDOW_SECS)]
    pub poll_window_secs: u64,

    /// Enable debug logging.
    #[arg(long, short = 'd')]
    pub debug: bool,

    /// Enable silent mode (errors only).
    #[arg(long, short = 's')]
    pub silent: bool,
}

/// Resource names the scenarios create and clean up.
#[derive(Debug, Clone)]
pub struct ResourceNames {
    pub container: String,
    pub queue: String,
    pub table: String,
    pub cosmos_database: String,
    pub cosmos_container: String,
    pub service_bus_queue: String,
}

impl Default for ResourceNames {
    fn default() -> Self {
        Self {
            container: DEFAULT_CONTAINER.to_string(),
            queue: DEFAULT_QUEUE.to_string(),
            table: DEFAULT_TABLE.to_string(),
            cosmos_database: DEFAULT_COSMOS_DATABASE.to_string(),
            cosmos_container: DEFAULT_COSMOS_CONTAINER.to_string(),
            service_bus_queue: DEFAULT_SERVICE_BUS_QUEUE.to_string(),
        }
    }
}

/// Scenario configuration derived from command-line arguments.
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage connection string; empty selects token credentials.
    pub storage_connection_string: String,
    /// Blob endpoint used with token credentials.
    pub blob_uri: String,
    /// Queue endpoint used with token credentials.
    pub queue_uri: String,
    /// Cosmos DB connection string.
    pub cosmos_connection_string: String,
    /// Service Bus connection string.
    pub service_bus_connection_string: String,
    /// Resource names.
    pub names: ResourceNames,
    /// Number of blobs uploaded by the blob scenario.
    pub blob_count: usize,
    /// Number of messages sent by the queue and Service Bus scenarios.
    pub message_count: usize,
    /// Maximum number of Service Bus messages received in one run.
    pub receive_max: usize,
    /// How long the queue scenario lets its poller run.
    pub poll_window: Duration,
    /// Directory blobs are downloaded into.
    pub download_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_connection_string: STORAGE_EMULATOR_CONNECTION_STRING.to_string(),
            blob_uri: BLOB_EMULATOR_URI.to_string(),
            queue_uri: QUEUE_EMULATOR_URI.to_string(),
            cosmos_connection_string: COSMOS_EMULATOR_CONNECTION_STRING.to_string(),
            service_bus_connection_string: SERVICE_BUS_EMULATOR_CONNECTION_STRING.to_string(),
            names: ResourceNames::default(),
            blob_count: 10,
            message_count: 10,
            receive_max: 20,
            poll_window: Duration::from_secs(DEFAULT_POLL_WINDOW_SECS),
            download_dir: PathBuf::from("."),
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            storage_connection_string: args.storage_connection_string,
            blob_uri: args.blob_uri,
            queue_uri: args.queue_uri,
            cosmos_connection_string: args.cosmos_connection_string,
            service_bus_connection_string: args.service_bus_connection_string,
            poll_window: Duration::from_secs(args.poll_window_secs),
            download_dir: args.download_dir,
            ..Config::default()
        }
    }
}

impl Config {
    /// Returns true if storage clients authenticate with a token credential.
    pub fn uses_token_credential(&self) -> bool {
        self.storage_connection_string.trim().is_empty()
    }
}
