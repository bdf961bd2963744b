//! Fragments: the executable units produced by circuit cutting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::observable::Observable;
use crate::types::FragmentKey;

/// Descriptive statistics of a fragment circuit.
///
/// Supplied by a [`CircuitIntrospector`]; consumed only as heuristic input
/// by allocation policies and reported in run statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentStats {
    pub qubits: u64,
    pub depth: u64,
    pub num_gates: u64,
    pub num_1q_gates: u64,
    pub num_2q_gates: u64,
    pub num_measurements: u64,
    #[serde(default)]
    pub gates: BTreeMap<String, u64>,
}

/// Scalar fragment feature used by feature-weighted allocation policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Qubits,
    TwoQubitGates,
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Qubits => write!(f, "qubits"),
            Self::TwoQubitGates => write!(f, "2qgates"),
        }
    }
}

/// Source of circuit statistics. Implementations inspect the opaque
/// circuit text; the core never looks inside it.
pub trait CircuitIntrospector: Send + Sync {
    fn describe(&self, circuit: &str) -> Result<FragmentStats>;
}

/// One fragment measured against one observable. Immutable once built.
///
/// Two fragments with the same circuit text share an id; the aggregation
/// key is `(id, observable)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fragment {
    id: String,
    circuit: String,
    observable: Observable,
    stats: FragmentStats,
}

impl Fragment {
    pub fn new(circuit: impl Into<String>, observable: Observable, stats: FragmentStats) -> Self {
        let circuit = circuit.into();
        Self {
            id: content_hash(&circuit),
            circuit,
            observable,
            stats,
        }
    }

    /// Content-derived identifier (hex SHA-256 of the circuit text).
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn circuit(&self) -> &str {
        &self.circuit
    }

    pub fn observable(&self) -> &Observable {
        &self.observable
    }

    /// Qubit count as seen by the observable (one Pauli per qubit).
    pub fn num_qubits(&self) -> usize {
        self.observable.num_qubits()
    }

    pub fn stats(&self) -> &FragmentStats {
        &self.stats
    }

    pub fn feature(&self, feature: Feature) -> u64 {
        match feature {
            Feature::Qubits => self.stats.qubits,
            Feature::TwoQubitGates => self.stats.num_2q_gates,
        }
    }

    pub fn key(&self) -> FragmentKey {
        FragmentKey::new(self.id.clone(), self.observable.clone())
    }
}

/// Expand cut output into fragments: one per (circuit, observable) pair,
/// preserving order.
pub fn fragments_from_cut(
    cut_output: &[(String, Vec<String>)],
    introspector: &dyn CircuitIntrospector,
) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::new();
    for (circuit, observables) in cut_output {
        let stats = introspector.describe(circuit)?;
        for obs in observables {
            let observable = Observable::parse(obs)?;
            fragments.push(Fragment::new(circuit.clone(), observable, stats.clone()));
        }
    }
    Ok(fragments)
}

/// Compute SHA-256 content hash.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
