//! azure-smoke: smoke scenarios for Azure SDK clients against local emulators.
//!
//! Each service module builds its client from a [`Config`], runs a short
//! sequence of calls against one emulator, and cleans up after itself.
//!
//! # Example
//!
//! ```no_run
//! use azure_smoke::{scenario, Config, Scenario};
//!
//! #[tokio::main]
//! async fn main() {
//!     let report = scenario::run_all(&[Scenario::Blob], &Config::default()).await;
//!     assert!(report.is_success());
//! }
//! ```

pub mod clients;
pub mod config;
pub mod connection_string;
pub mod error;
pub mod models;
pub mod scenario;
pub mod services;

// Re-exports for convenience
pub use config::{Args, Config, ResourceNames, DEFAULT_ACCOUNT, DEFAULT_ACCOUNT_KEY};
pub use error::{Error, ErrorCode, Result, ServiceFailure};
pub use models::{EdmEntity, EdmValue, Item, MyEntity};
pub use scenario::{Outcome, Report, Scenario};
