//! Shared data model: allocations, dispatch plans, weights, counts and
//! probability tables.

use std::collections::BTreeMap;

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};

use crate::fragment::Fragment;
use crate::observable::Observable;

/// Shot count.
pub type Shots = u64;

/// Observed bitstring → occurrence count.
pub type Counts = BTreeMap<String, u64>;

/// Bitstring → probability.
pub type Distribution = BTreeMap<String, f64>;

/// A (provider, backend) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BackendId {
    pub provider: String,
    pub backend: String,
}

impl BackendId {
    pub fn new(provider: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            backend: backend.into(),
        }
    }
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.backend)
    }
}

/// Aggregation key: a fragment id measured against one observable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FragmentKey {
    pub fragment_id: String,
    pub observable: Observable,
}

impl FragmentKey {
    pub fn new(fragment_id: impl Into<String>, observable: Observable) -> Self {
        Self {
            fragment_id: fragment_id.into(),
            observable,
        }
    }
}

impl std::fmt::Display for FragmentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.fragment_id, self.observable)
    }
}

/// Serialize a `BackendId`-keyed map as `{provider: {backend: value}}`.
fn serialize_nested<S, T>(
    entries: &BTreeMap<BackendId, T>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    let mut nested: BTreeMap<&str, BTreeMap<&str, &T>> = BTreeMap::new();
    for (id, value) in entries {
        nested
            .entry(id.provider.as_str())
            .or_default()
            .insert(id.backend.as_str(), value);
    }
    let mut map = serializer.serialize_map(Some(nested.len()))?;
    for (provider, backends) in &nested {
        map.serialize_entry(provider, backends)?;
    }
    map.end()
}

// ---------------------------------------------------------------
// Shot allocation
// ---------------------------------------------------------------

/// Ordered (fragment, shots) pairs produced by an allocation policy.
#[derive(Debug, Clone, Default)]
pub struct ShotAllocation {
    entries: Vec<(Fragment, Shots)>,
}

impl ShotAllocation {
    pub fn new(entries: Vec<(Fragment, Shots)>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[(Fragment, Shots)] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Fragment, Shots)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all allocated shots.
    pub fn total(&self) -> Shots {
        self.entries.iter().map(|(_, s)| *s).sum()
    }

    pub fn shots(&self) -> Vec<Shots> {
        self.entries.iter().map(|(_, s)| *s).collect()
    }
}

impl Serialize for ShotAllocation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.iter().map(|(f, s)| DispatchItemRef {
            fragment: f,
            shots: *s,
        }))
    }
}

// ---------------------------------------------------------------
// Dispatch plan
// ---------------------------------------------------------------

/// One batch entry: run `fragment` for `shots` shots.
#[derive(Debug, Clone)]
pub struct DispatchItem {
    pub fragment: Fragment,
    pub shots: Shots,
}

struct DispatchItemRef<'a> {
    fragment: &'a Fragment,
    shots: Shots,
}

impl Serialize for DispatchItemRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("DispatchItem", 3)?;
        s.serialize_field("fragment_id", self.fragment.id())?;
        s.serialize_field("observable", self.fragment.observable())?;
        s.serialize_field("shots", &self.shots)?;
        s.end()
    }
}

impl Serialize for DispatchItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        DispatchItemRef {
            fragment: &self.fragment,
            shots: self.shots,
        }
        .serialize(serializer)
    }
}

/// Execution plan grouped by provider, then backend.
#[derive(Debug, Clone, Default)]
pub struct DispatchPlan {
    groups: BTreeMap<BackendId, Vec<DispatchItem>>,
}

impl DispatchPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, backend: BackendId, fragment: Fragment, shots: Shots) {
        self.groups
            .entry(backend)
            .or_default()
            .push(DispatchItem { fragment, shots });
    }

    pub fn groups(&self) -> impl Iterator<Item = (&BackendId, &[DispatchItem])> {
        self.groups.iter().map(|(id, items)| (id, items.as_slice()))
    }

    pub fn get(&self, backend: &BackendId) -> Option<&[DispatchItem]> {
        self.groups.get(backend).map(Vec::as_slice)
    }

    pub fn backends(&self) -> impl Iterator<Item = &BackendId> {
        self.groups.keys()
    }

    /// Number of (provider, backend) groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total shots dispatched for one (fragment, observable) key.
    pub fn shots_for(&self, key: &FragmentKey) -> Shots {
        self.groups
            .values()
            .flatten()
            .filter(|item| {
                item.fragment.id() == key.fragment_id && item.fragment.observable() == &key.observable
            })
            .map(|item| item.shots)
            .sum()
    }

    pub fn total_shots(&self) -> Shots {
        self.groups.values().flatten().map(|item| item.shots).sum()
    }
}

impl Serialize for DispatchPlan {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_nested(&self.groups, serializer)
    }
}

// ---------------------------------------------------------------
// Coefficients
// ---------------------------------------------------------------

/// Non-negative per-backend weights. A single split or merge produces
/// weights summing to 1.0 over the backends present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Coefficients {
    weights: BTreeMap<BackendId, f64>,
}

impl Coefficients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, backend: BackendId, weight: f64) {
        self.weights.insert(backend, weight);
    }

    pub fn get(&self, backend: &BackendId) -> Option<f64> {
        self.weights.get(backend).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BackendId, f64)> {
        self.weights.iter().map(|(id, w)| (id, *w))
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl FromIterator<(BackendId, f64)> for Coefficients {
    fn from_iter<I: IntoIterator<Item = (BackendId, f64)>>(iter: I) -> Self {
        Self {
            weights: iter.into_iter().collect(),
        }
    }
}

impl Serialize for Coefficients {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_nested(&self.weights, serializer)
    }
}

// ---------------------------------------------------------------
// Counts and probabilities
// ---------------------------------------------------------------

/// Counts for one executed (fragment, observable), bit order already
/// normalized to observable order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountsEntry {
    pub fragment_id: String,
    pub observable: Observable,
    pub counts: Counts,
}

impl CountsEntry {
    pub fn key(&self) -> FragmentKey {
        FragmentKey::new(self.fragment_id.clone(), self.observable.clone())
    }
}

/// Counts of all backends for one execution attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCounts {
    by_backend: BTreeMap<BackendId, Vec<CountsEntry>>,
}

impl RawCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, backend: BackendId, entry: CountsEntry) {
        self.by_backend.entry(backend).or_default().push(entry);
    }

    /// Append all entries for `backend`, keeping any already present.
    pub fn extend(&mut self, backend: BackendId, entries: Vec<CountsEntry>) {
        self.by_backend.entry(backend).or_default().extend(entries);
    }

    pub fn get(&self, backend: &BackendId) -> Option<&[CountsEntry]> {
        self.by_backend.get(backend).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BackendId, &[CountsEntry])> {
        self.by_backend.iter().map(|(id, e)| (id, e.as_slice()))
    }

    pub fn backends(&self) -> Vec<BackendId> {
        self.by_backend.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.by_backend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_backend.is_empty()
    }
}

impl Serialize for RawCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_nested(&self.by_backend, serializer)
    }
}

/// Normalized probability distributions per (fragment, observable).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbabilityTable {
    table: BTreeMap<FragmentKey, Distribution>,
}

impl ProbabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: FragmentKey, distribution: Distribution) {
        self.table.insert(key, distribution);
    }

    pub fn get(&self, key: &FragmentKey) -> Option<&Distribution> {
        self.table.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FragmentKey, &Distribution)> {
        self.table.iter()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[derive(Serialize)]
struct ProbabilityEntry<'a> {
    fragment_id: &'a str,
    observable: &'a Observable,
    probabilities: &'a Distribution,
}

impl Serialize for ProbabilityTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.table.iter().map(|(key, dist)| ProbabilityEntry {
            fragment_id: &key.fragment_id,
            observable: &key.observable,
            probabilities: dist,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::FragmentStats;

    fn fragment(circuit: &str, obs: &str) -> Fragment {
        Fragment::new(circuit, Observable::parse(obs).unwrap(), FragmentStats::default())
    }

    #[test]
    fn test_dispatch_plan_grouping() {
        let f = fragment("c1", "Z");
        let mut plan = DispatchPlan::new();
        plan.push(BackendId::new("aer", "b"), f.clone(), 10);
        plan.push(BackendId::new("aer", "a"), f.clone(), 20);
        plan.push(BackendId::new("aer", "a"), fragment("c2", "ZZ"), 5);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.get(&BackendId::new("aer", "a")).unwrap().len(), 2);
        assert_eq!(plan.shots_for(&f.key()), 30);
        assert_eq!(plan.total_shots(), 35);

        let first = plan.backends().next().unwrap();
        assert_eq!(first.backend, "a");
    }

    #[test]
    fn test_coefficients_serialize_nested() {
        let coeffs: Coefficients = vec![
            (BackendId::new("p", "a"), 0.25),
            (BackendId::new("p", "b"), 0.75),
        ]
        .into_iter()
        .collect();
        assert!((coeffs.sum() - 1.0).abs() < 1e-12);

        let json = serde_json::to_value(&coeffs).unwrap();
        assert_eq!(json["p"]["a"], 0.25);
        assert_eq!(json["p"]["b"], 0.75);
    }

    #[test]
    fn test_raw_counts_extend_keeps_entries() {
        let backend = BackendId::new("p", "a");
        let entry = CountsEntry {
            fragment_id: "x".into(),
            observable: Observable::parse("Z").unwrap(),
            counts: Counts::from([("0".to_string(), 3)]),
        };
        let mut counts = RawCounts::new();
        counts.push(backend.clone(), entry.clone());
        counts.extend(backend.clone(), vec![entry]);
        assert_eq!(counts.get(&backend).unwrap().len(), 2);
    }

    #[test]
    fn test_probability_table_serializes_as_entries() {
        let mut table = ProbabilityTable::new();
        table.insert(
            FragmentKey::new("abc", Observable::parse("Z").unwrap()),
            Distribution::from([("0".to_string(), 0.5), ("1".to_string(), 0.5)]),
        );
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json[0]["fragment_id"], "abc");
        assert_eq!(json[0]["observable"], "Z");
        assert_eq!(json[0]["probabilities"]["1"], 0.5);
    }
}
