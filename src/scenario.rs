//! Scenario selection and sequencing.

use std::time::{Duration, Instant};

use clap::ValueEnum;
use tracing::{error, info};

use crate::config::Config;
use crate::error::Result;
use crate::services::{blob, cosmos, queue, servicebus, table};

/// A runnable smoke scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Container and blob CRUD, listing, downloads.
    Blob,
    /// Tagged upload, SAS URL, tags and properties.
    BlobMisc,
    /// Enqueue with a background poller.
    Queue,
    /// Raw and typed entities, row key query.
    Table,
    /// Database, container, and item CRUD.
    Cosmos,
    /// Remove the Cosmos item left by an interrupted run.
    CosmosCleanup,
    /// Send, receive, complete.
    ServiceBus,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Blob => "blob",
            Scenario::BlobMisc => "blob-misc",
            Scenario::Queue => "queue",
            Scenario::Table => "table",
            Scenario::Cosmos => "cosmos",
            Scenario::CosmosCleanup => "cosmos-cleanup",
            Scenario::ServiceBus => "service-bus",
        }
    }

    /// Every scenario, in declaration order.
    pub fn all() -> &'static [Scenario] {
        Scenario::value_variants()
    }

    /// The scenarios run when none are selected. Cleanup only runs on request.
    pub fn defaults() -> Vec<Scenario> {
        vec![
            Scenario::Blob,
            Scenario::BlobMisc,
            Scenario::Queue,
            Scenario::Table,
            Scenario::Cosmos,
            Scenario::ServiceBus,
        ]
    }
}

/// Runs one scenario.
pub async fn run(scenario: Scenario, config: &Config) -> Result<()> {
    match scenario {
        Scenario::Blob => blob::run_basic(config).await,
        Scenario::BlobMisc => blob::run_misc(config).await,
        Scenario::Queue => queue::run(config).await,
        Scenario::Table => table::run(config).await,
        Scenario::Cosmos => cosmos::run(config).await,
        Scenario::CosmosCleanup => cosmos::cleanup(config).await,
        Scenario::ServiceBus => servicebus::run(config).await,
    }
}

/// How a scenario ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(String),
}

impl Outcome {
    /// Maps a scenario result.
    pub fn from_result(result: Result<()>) -> Self {
        match result {
            Ok(()) => Outcome::Passed,
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }
}

/// Result of one scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub scenario: Scenario,
    pub outcome: Outcome,
    pub elapsed: Duration,
}

/// Results of a sequence of scenario runs.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub results: Vec<ScenarioResult>,
}

impl Report {
    /// Number of failed scenarios.
    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Failed(_)))
            .count()
    }

    /// True if no scenario failed.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Runs the scenarios one after another, logging each outcome.
pub async fn run_all(scenarios: &[Scenario], config: &Config) -> Report {
    let mut report = Report::default();

    for &scenario in scenarios {
        info!(scenario = scenario.as_str(), "starting scenario");
        let started = Instant::now();
        let outcome = Outcome::from_result(run(scenario, config).await);
        let elapsed = started.elapsed();

        match &outcome {
            Outcome::Passed => {
                info!(scenario = scenario.as_str(), elapsed_ms = elapsed.as_millis() as u64, "scenario passed")
            }
            Outcome::Failed(reason) => {
                error!(scenario = scenario.as_str(), %reason, "scenario failed")
            }
        }

        report.results.push(ScenarioResult {
            scenario,
            outcome,
            elapsed,
        });
    }

    info!(
        total = report.results.len(),
        failed = report.failed(),
        "finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ServiceFailure};

    #[test]
    fn test_defaults_exclude_cleanup() {
        let defaults = Scenario::defaults();
        assert_eq!(defaults.len(), 6);
        assert!(!defaults.contains(&Scenario::CosmosCleanup));
        assert!(defaults.iter().all(|s| Scenario::all().contains(s)));
        assert_eq!(Scenario::all().len(), 7);
    }

    #[test]
    fn test_value_names_match_as_str() {
        for scenario in Scenario::value_variants() {
            let name = scenario
                .to_possible_value()
                .map(|v| v.get_name().to_string());
            assert_eq!(name.as_deref(), Some(scenario.as_str()));
        }
    }

    #[test]
    fn test_outcome_from_result() {
        assert_eq!(Outcome::from_result(Ok(())), Outcome::Passed);
        assert!(matches!(
            Outcome::from_result(Err(Error::Service(ServiceFailure::new(500, None, "x")))),
            Outcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_run_all_reports_failed_service_bus() {
        let config = Config {
            service_bus_connection_string: "Endpoint=sb://localhost".to_string(),
            ..Config::default()
        };
        let report = run_all(&[Scenario::ServiceBus], &config).await;
        assert_eq!(report.results.len(), 1);
        assert!(matches!(report.results[0].outcome, Outcome::Failed(_)));
        assert!(!report.is_success());
    }

    #[test]
    fn test_report_counts_failures() {
        let report = Report {
            results: vec![
                ScenarioResult {
                    scenario: Scenario::Blob,
                    outcome: Outcome::Passed,
                    elapsed: Duration::from_millis(5),
                },
                ScenarioResult {
                    scenario: Scenario::Table,
                    outcome: Outcome::Failed("boom".into()),
                    elapsed: Duration::from_millis(5),
                },
            ],
        };
        assert_eq!(report.failed(), 1);
        assert!(!report.is_success());
    }
}
