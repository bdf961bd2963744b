//! Pipeline configuration.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::BackendId;

/// Scheduling mode for the execution phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One coordinator drives every backend group and joins them per attempt.
    #[default]
    Sequential,
    /// One isolated unit per (provider, backend), fan-out then fan-in.
    Parallel,
}

/// How parallel units hand their results back to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handoff {
    /// In-memory message passing.
    #[default]
    Channel,
    /// Serialized artifacts in a scratch directory.
    Mailbox,
}

/// Execution phase settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub handoff: Handoff,
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    /// Retries after the first attempt. `None` retries forever.
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Upper bound on one attempt's wall time; expiry is retryable.
    #[serde(default)]
    pub attempt_timeout_secs: Option<u64>,
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("temp")
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
            handoff: Handoff::Channel,
            scratch_dir: default_scratch_dir(),
            max_retries: None,
            attempt_timeout_secs: None,
        }
    }
}

/// Optional report sections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFlags {
    #[serde(default)]
    pub times: bool,
    #[serde(default)]
    pub params: bool,
    #[serde(default)]
    pub stats: bool,
}

impl ReportFlags {
    /// Stats and params both imply timings.
    pub fn normalized(self) -> Self {
        Self {
            times: self.times || self.params || self.stats,
            ..self
        }
    }
}

/// Per-backend weight for the weighted split policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendWeight {
    pub provider: String,
    pub backend: String,
    pub weight: f64,
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Global shot budget.
    pub shots: u64,
    /// Available (provider, backend) pairs, in split order.
    pub backends: Vec<BackendId>,
    #[serde(default = "default_allocation_policy")]
    pub allocation_policy: String,
    #[serde(default = "default_split_policy")]
    pub split_policy: String,
    #[serde(default)]
    pub split_weights: Vec<BackendWeight>,
    /// Budget share reserved for equal division by the hybrid policy.
    #[serde(default = "default_reserve_fraction")]
    pub reserve_fraction: f64,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub report: ReportFlags,
    /// Known exact value; the report carries `reference - result`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_value: Option<f64>,
}

fn default_allocation_policy() -> String {
    "divider".into()
}
fn default_split_policy() -> String {
    "fair".into()
}
fn default_reserve_fraction() -> f64 {
    0.2
}

impl PipelineConfig {
    pub fn new(shots: u64, backends: Vec<BackendId>) -> Self {
        Self {
            shots,
            backends,
            allocation_policy: default_allocation_policy(),
            split_policy: default_split_policy(),
            split_weights: Vec::new(),
            reserve_fraction: default_reserve_fraction(),
            execution: ExecutionConfig::default(),
            report: ReportFlags::default(),
            reference_value: None,
        }
    }

    /// Load from a JSON file, overlay environment, and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let mut config: PipelineConfig = serde_json::from_str(&data)?;
        config.apply_env();
        config.validate()?;
        debug!(
            "Loaded config from {}: {} shots, {} backends",
            path.as_ref().display(),
            config.shots,
            config.backends.len()
        );
        Ok(config)
    }

    /// Overlay `CUTSHOT_*` environment variables.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = var("CUTSHOT_SHOTS") {
            match raw.parse() {
                Ok(shots) => self.shots = shots,
                Err(_) => warn!("Ignoring CUTSHOT_SHOTS={}: not a shot count", raw),
            }
        }
        if let Some(dir) = var("CUTSHOT_SCRATCH_DIR") {
            self.execution.scratch_dir = PathBuf::from(dir);
        }
        if let Some(raw) = var("CUTSHOT_MAX_RETRIES") {
            match raw.parse() {
                Ok(retries) => self.execution.max_retries = Some(retries),
                Err(_) => warn!("Ignoring CUTSHOT_MAX_RETRIES={}: not a retry count", raw),
            }
        }
        if let Some(flag) = var("CUTSHOT_PARALLEL") {
            self.execution.mode = match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" => ExecutionMode::Parallel,
                _ => ExecutionMode::Sequential,
            };
        }
        self.report = self.report.normalized();
    }

    pub fn validate(&self) -> Result<()> {
        if self.backends.is_empty() {
            return Err(Error::Config("at least one backend is required".into()));
        }
        let mut seen = HashSet::new();
        for id in &self.backends {
            if !seen.insert(id) {
                return Err(Error::Config(format!("duplicate backend {}", id)));
            }
        }
        if !(0.0..=1.0).contains(&self.reserve_fraction) {
            return Err(Error::Config(format!(
                "reserve_fraction must be within [0, 1], got {}",
                self.reserve_fraction
            )));
        }
        if self.execution.attempt_timeout_secs == Some(0) {
            return Err(Error::Config("attempt_timeout_secs must be positive".into()));
        }
        if let Some(w) = self.split_weights.iter().find(|w| !(w.weight >= 0.0)) {
            return Err(Error::Config(format!(
                "negative weight for {}/{}",
                w.provider, w.backend
            )));
        }
        Ok(())
    }
}
