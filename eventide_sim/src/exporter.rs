//! JSON report exporter.
//!
//! Collects scenario results for one invocation and writes them as a single
//! JSON document for CI or offline analysis.

use crate::config::ScenarioConfig;
use crate::error::RunResult;
use crate::runner::ScenarioResult;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Complete run export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Base seed of the invocation
    pub seed: u64,

    /// Parameters every scenario ran with
    pub config: ScenarioConfig,

    /// One entry per (seed, scenario) run
    pub results: Vec<ScenarioResult>,

    /// Whether every run passed
    pub passed: bool,
}

impl RunReport {
    pub fn new(seed: u64, config: ScenarioConfig) -> Self {
        Self {
            seed,
            config,
            results: Vec::new(),
            passed: true,
        }
    }

    /// Adds a result.
    pub fn add_result(&mut self, result: ScenarioResult) {
        self.passed &= result.passed;
        self.results.push(result);
    }

    pub fn failed(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> RunResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ScenarioRunner;
    use crate::scenarios::ScenarioId;

    #[test]
    fn test_report_tracks_failures() {
        let mut report = RunReport::new(9, ScenarioConfig::default());
        let loose = ScenarioConfig {
            tolerance: 1.0,
            ..ScenarioConfig::default()
        };
        let ok = ScenarioRunner::new(9)
            .with_config(loose)
            .with_hours(20.0)
            .with_warmup_hours(1.0)
            .run(ScenarioId::Mm1);
        assert!(ok.passed);
        report.add_result(ok);

        let bad = ScenarioRunner::new(9).with_hours(-1.0).run(ScenarioId::Mm1);
        assert!(!bad.passed);
        report.add_result(bad);

        assert!(!report.passed);
        assert_eq!(report.failed().count(), 1);
    }

    #[test]
    fn test_write_to_file() {
        let mut report = RunReport::new(3, ScenarioConfig::default());
        report.add_result(ScenarioRunner::new(3).with_hours(10.0).with_warmup_hours(1.0).run(ScenarioId::Mmc));

        let path = std::env::temp_dir().join(format!("eventide-report-{}.json", std::process::id()));
        report.write_to_file(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["seed"], 3);
        assert_eq!(value["results"][0]["scenario"], "mmc");
        std::fs::remove_file(&path).unwrap();
    }
}
