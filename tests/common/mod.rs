//! Common test utilities.
//!
//! The tests in this directory talk to live emulators and are ignored by
//! default. Run them with `cargo test -- --ignored` once the emulators are up.

#![allow(dead_code)]

use std::time::Duration;

use tokio::net::TcpStream;
use url::Url;

use azure_smoke::Config;

/// Installs a test log subscriber once per test binary.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Returns a short random suffix usable in every resource name kind.
pub fn unique_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Emulator-backed test context with resource names unique to one test.
pub struct TestEmulator {
    pub config: Config,
}

impl TestEmulator {
    /// Creates a context whose resource names will not collide with other
    /// tests running in parallel.
    pub fn new() -> Self {
        init_logging();

        let suffix = unique_suffix();
        let mut config = Config::default();
        config.names.container = format!("smoke-{}", suffix);
        config.names.queue = format!("smoke-{}", suffix);
        config.names.table = format!("smoke{}", suffix);
        config.names.cosmos_database = format!("smokedb-{}", suffix);
        config.names.cosmos_container = format!("smoke-{}", suffix);
        config.download_dir = std::env::temp_dir();

        Self { config }
    }

    /// Panics with a readable message if nothing listens at `uri`.
    pub async fn require(uri: &str) {
        assert!(
            reachable(uri).await,
            "no emulator listening at {}; start it before running ignored tests",
            uri
        );
    }
}

/// Returns true if a TCP connection to the host and port of `uri` succeeds.
pub async fn reachable(uri: &str) -> bool {
    let Ok(url) = Url::parse(uri) else {
        return false;
    };
    let (Some(host), Some(port)) = (url.host_str(), url.port_or_known_default()) else {
        return false;
    };

    matches!(
        tokio::time::timeout(Duration::from_secs(1), TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}
