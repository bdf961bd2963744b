//! Backend adapter trait and its result types.

use cutshot_core::{Counts, DispatchItem, Error, Observable, Result};
use serde::{Deserialize, Serialize};

/// Bit order of the bitstrings an adapter reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitOrder {
    /// Qubit 0 is the rightmost character (Qiskit convention).
    LittleEndian,
    /// Qubit 0 is the leftmost character, matching observable order.
    BigEndian,
}

impl BitOrder {
    /// Rewrite a raw bitstring into observable order (qubit 0 first).
    ///
    /// Register separators (whitespace) are dropped. Any character other
    /// than `0`/`1` is rejected.
    pub fn normalize(&self, raw: &str) -> Result<String> {
        let bits: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        if bits.is_empty() || bits.chars().any(|c| c != '0' && c != '1') {
            return Err(Error::InvalidBitstring(raw.to_string()));
        }
        Ok(match self {
            Self::LittleEndian => bits.chars().rev().collect(),
            Self::BigEndian => bits,
        })
    }
}

/// Outcome of one job in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    /// Raw counts, in the adapter's declared bit order.
    Completed { counts: Counts },
    /// The backend returned nothing for this job. Retryable.
    Missing { reason: String },
}

/// Result for one (fragment, observable) job of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub fragment_id: String,
    pub observable: Observable,
    pub outcome: JobOutcome,
}

impl JobResult {
    pub fn completed(item: &DispatchItem, counts: Counts) -> Self {
        Self {
            fragment_id: item.fragment.id().to_string(),
            observable: item.fragment.observable().clone(),
            outcome: JobOutcome::Completed { counts },
        }
    }

    pub fn missing(item: &DispatchItem, reason: impl Into<String>) -> Self {
        Self {
            fragment_id: item.fragment.id().to_string(),
            observable: item.fragment.observable().clone(),
            outcome: JobOutcome::Missing {
                reason: reason.into(),
            },
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self.outcome, JobOutcome::Missing { .. })
    }
}

/// Executes batches on one physical or simulated backend.
///
/// Adapters are not assumed to be shareable: each execution unit owns its
/// own instance, so only `Send` is required.
pub trait BackendAdapter: Send {
    /// Bit order of reported bitstrings.
    fn bit_order(&self) -> BitOrder;

    /// Run every item of `batch`, returning one result per item in order.
    ///
    /// `Err` is fatal (network, auth, malformed circuit) and aborts the
    /// run; use [`JobOutcome::Missing`] for results that should be retried.
    fn run(&mut self, batch: &[DispatchItem]) -> Result<Vec<JobResult>>;
}
