//! Weighted merge of per-backend counts into probability distributions.

use std::collections::BTreeMap;

use cutshot_core::{Coefficients, Distribution, Error, FragmentKey, ProbabilityTable, RawCounts, Result};
use tracing::debug;

/// Accumulate `count * coefficient` per bitstring for every
/// (fragment, observable) key across all backends, then normalize each key.
///
/// Entries sharing a key contribute to the same distribution regardless of
/// which backend or batch produced them. A backend missing from
/// `coefficients`, or a key whose accumulated weight is zero, is a
/// dispatch/aggregation mismatch and is reported as
/// [`Error::Aggregation`].
pub fn weighted_merge(counts: &RawCounts, coefficients: &Coefficients) -> Result<ProbabilityTable> {
    let mut accumulated: BTreeMap<FragmentKey, Distribution> = BTreeMap::new();

    for (backend, entries) in counts.iter() {
        let weight = coefficients.get(backend).ok_or_else(|| {
            Error::Aggregation(format!("no coefficient for backend {}", backend))
        })?;
        for entry in entries {
            let dist = accumulated.entry(entry.key()).or_default();
            for (state, count) in &entry.counts {
                *dist.entry(state.clone()).or_insert(0.0) += *count as f64 * weight;
            }
        }
    }

    let mut table = ProbabilityTable::new();
    for (key, mut dist) in accumulated {
        let total: f64 = dist.values().sum();
        if !(total > 0.0) {
            return Err(Error::Aggregation(format!(
                "zero total weight for {} before normalization",
                key
            )));
        }
        for p in dist.values_mut() {
            *p /= total;
        }
        debug!(fragment = %key.fragment_id, observable = %key.observable, states = dist.len(), "merged distribution");
        table.insert(key, dist);
    }
    Ok(table)
}
