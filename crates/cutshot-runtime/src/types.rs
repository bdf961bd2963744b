//! Runtime types.

use std::collections::BTreeMap;
use std::time::Duration;

use cutshot_backend::{BitOrder, JobResult};
use cutshot_core::{
    content_hash, BackendId, Coefficients, DispatchPlan, ExecutionMode, FragmentKey,
    FragmentStats, Observable, ProbabilityTable, RawCounts, ShotAllocation, Shots,
};
use serde::{Deserialize, Serialize, Serializer};

/// Pipeline phase, used as the timing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Cutting,
    Allocation,
    Dispatch,
    Execution,
    Synchronization,
    Counts,
    Merge,
    ExpectedValues,
    Sew,
    Total,
    ExecutionRetries,
}

/// Elapsed seconds per phase. Re-recording a phase overwrites it, so after
/// retries `execution` and `counts` describe the successful attempt only.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct PhaseTimes(BTreeMap<Phase, f64>);

impl PhaseTimes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, phase: Phase, elapsed: Duration) {
        self.0.insert(phase, elapsed.as_secs_f64());
    }

    pub fn get(&self, phase: Phase) -> Option<f64> {
        self.0.get(&phase).copied()
    }

    /// Copy every phase recorded in `other` into `self`.
    pub fn merge(&mut self, other: &PhaseTimes) {
        self.0.extend(other.0.iter().map(|(k, v)| (*k, *v)));
    }
}

/// What one execution unit produced for its (provider, backend) batch.
///
/// This is also the mailbox artifact format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitReport {
    pub backend: BackendId,
    pub bit_order: BitOrder,
    pub results: Vec<JobResult>,
}

/// Result of the execution phase.
#[derive(Debug, Clone)]
pub struct ExecutionOutput {
    pub counts: RawCounts,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Wall time lost to discarded attempts.
    pub retry_time: Duration,
    pub times: PhaseTimes,
}

/// Expectation value per (fragment, observable).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpectationValues {
    values: BTreeMap<FragmentKey, f64>,
}

impl ExpectationValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: FragmentKey, value: f64) {
        self.values.insert(key, value);
    }

    pub fn get(&self, key: &FragmentKey) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Look up by circuit text, as handed out by the cutter.
    pub fn for_circuit(&self, circuit: &str, observable: &str) -> Option<f64> {
        let observable = Observable::parse(observable).ok()?;
        self.get(&FragmentKey::new(content_hash(circuit), observable))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FragmentKey, f64)> {
        self.values.iter().map(|(k, v)| (k, *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Serialize)]
struct ExpectationEntry<'a> {
    fragment_id: &'a str,
    observable: &'a Observable,
    value: f64,
}

impl Serialize for ExpectationValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.values.iter().map(|(k, v)| ExpectationEntry {
            fragment_id: &k.fragment_id,
            observable: &k.observable,
            value: *v,
        }))
    }
}

/// Split coefficients produced for one fragment.
#[derive(Debug, Clone, Serialize)]
pub struct FragmentCoefficients {
    pub fragment_id: String,
    pub observable: Observable,
    pub coefficients: Coefficients,
}

/// Per-fragment descriptive statistics.
#[derive(Debug, Clone, Serialize)]
pub struct FragmentReport {
    pub fragment_id: String,
    pub observable: Observable,
    pub shots: Shots,
    pub stats: FragmentStats,
}

/// Parameters of the run, echoed in the report.
#[derive(Debug, Clone, Serialize)]
pub struct RunParams {
    pub circuit: String,
    pub observable: String,
    pub shots: Shots,
    pub backends: Vec<BackendId>,
    pub cut_strategy: String,
    pub allocation_policy: String,
    pub split_policy: String,
    pub execution_mode: ExecutionMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_value: Option<f64>,
}

/// Intermediate statistics of the run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_stats: Option<FragmentStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cut_info: Option<serde_json::Value>,
    pub fragments: Vec<FragmentReport>,
    pub allocation: ShotAllocation,
    pub dispatch: DispatchPlan,
    pub counts: RawCounts,
    pub probabilities: ProbabilityTable,
    /// Coefficients of the last split, as a single summary.
    pub split_coefficients: Coefficients,
    pub fragment_split_coefficients: Vec<FragmentCoefficients>,
    pub merge_coefficients: Coefficients,
    pub expectation_values: ExpectationValues,
    pub attempts: u32,
}

/// Final report of one pipeline run. Optional sections are present only
/// when requested.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub started_at: String,
    pub result: f64,
    /// `reference_value - result`, when a reference was configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<RunParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub times: Option<PhaseTimes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<RunStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_times_keys() {
        let mut times = PhaseTimes::new();
        times.record(Phase::ExpectedValues, Duration::from_millis(1500));
        times.record(Phase::ExecutionRetries, Duration::ZERO);
        let json = serde_json::to_value(&times).unwrap();
        assert_eq!(json["expected_values"], 1.5);
        assert_eq!(json["execution_retries"], 0.0);
    }

    #[test]
    fn test_expectation_lookup_by_circuit() {
        let mut values = ExpectationValues::new();
        values.insert(
            FragmentKey::new(content_hash("circ"), Observable::parse("ZZ").unwrap()),
            0.25,
        );
        assert_eq!(values.for_circuit("circ", "ZZ"), Some(0.25));
        assert_eq!(values.for_circuit("circ", "XX"), None);
        assert_eq!(values.for_circuit("other", "ZZ"), None);
    }
}
