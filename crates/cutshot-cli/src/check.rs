//! `cutshot validate`: config checks against the policy and backend registries.

use std::path::Path;

use cutshot_backend::BackendRegistry;
use cutshot_core::{ExecutionMode, Handoff, PipelineConfig};
use cutshot_policy::PolicyRegistry;
use tracing::{error, info};

/// Outcome of `cutshot validate`.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub config_valid: bool,
    pub shots: u64,
    pub backends: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

pub fn validate(path: &Path, backends: &BackendRegistry) -> ValidationReport {
    let mut report = ValidationReport::default();

    let config = match PipelineConfig::load(path) {
        Ok(c) => c,
        Err(e) => {
            report.errors.push(format!("Failed to load {}: {}", path.display(), e));
            return report;
        }
    };
    report.shots = config.shots;
    report.backends = config.backends.len();

    let policies = PolicyRegistry::from_config(&config);
    if let Err(e) = policies.allocation(&config.allocation_policy) {
        report.errors.push(e.to_string());
    }
    if let Err(e) = policies.split(&config.split_policy) {
        report.errors.push(e.to_string());
    }
    for id in &config.backends {
        if !backends.supports(id) {
            report
                .errors
                .push(format!("No adapter registered for backend {}", id));
        }
    }

    if config.split_policy != "weighted" && !config.split_weights.is_empty() {
        report
            .warnings
            .push("split_weights are ignored by this split policy".to_string());
    }
    if config.execution.handoff == Handoff::Mailbox
        && config.execution.mode == ExecutionMode::Sequential
    {
        report
            .warnings
            .push("mailbox handoff only applies to parallel mode".to_string());
    }
    if config.execution.max_retries.is_none() {
        report
            .warnings
            .push("max_retries is unset: a persistently failing backend retries forever".to_string());
    }

    report.config_valid = report.errors.is_empty();
    report
}

pub fn print_report(report: &ValidationReport) {
    if report.config_valid {
        info!(
            "Config valid: {} shots over {} backends",
            report.shots, report.backends
        );
    }
    for warning in &report.warnings {
        println!("warning: {}", warning);
    }
    for err in &report.errors {
        error!("{}", err);
        println!("error: {}", err);
    }
    println!("{}", if report.config_valid { "OK" } else { "INVALID" });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("config.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_validate_ok_with_replay_backends() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(
            tmp.path(),
            r#"{"shots": 100, "backends": [["replay", "a"]], "execution": {"max_retries": 3}}"#,
        );
        let report = validate(&path, &crate::default_backends());
        assert!(report.config_valid, "{:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(
            tmp.path(),
            r#"{"shots": 100, "backends": [["ibm", "x"]], "allocation_policy": "bogus"}"#,
        );
        let report = validate(&path, &crate::default_backends());
        assert!(!report.config_valid);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_validate_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let report = validate(&tmp.path().join("nope.json"), &crate::default_backends());
        assert!(!report.config_valid);
    }
}
