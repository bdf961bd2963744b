//! Shot-wise split policies: one fragment's shots → per-backend shares.

use std::collections::{HashMap, HashSet};

use cutshot_core::{
    BackendId, BackendWeight, Coefficients, Error, ProbabilityTable, RawCounts, Result, Shots,
};

use crate::merge::weighted_merge;

/// Strategy distributing shots across backends, with the weights used to
/// recombine their counts.
pub trait SplitPolicy: Send + Sync {
    /// Registry name.
    fn name(&self) -> &str;

    /// Per-backend weights over `backends`, summing to 1.0.
    fn coefficients(&self, backends: &[BackendId]) -> Result<Coefficients>;

    /// Split `shots` across `backends`. Shares are returned in input order
    /// and always sum to exactly `shots`.
    fn split(
        &self,
        backends: &[BackendId],
        shots: Shots,
    ) -> Result<(Vec<(BackendId, Shots)>, Coefficients)> {
        let coefficients = self.coefficients(backends)?;
        let shares = conserve_shots(backends, &coefficients, shots);
        Ok((shares, coefficients))
    }

    /// Merge counts into normalized distributions.
    ///
    /// Coefficients are recomputed from the backends actually present in
    /// `counts`, which need not match the set used at split time.
    fn merge(&self, counts: &RawCounts) -> Result<(ProbabilityTable, Coefficients)> {
        let coefficients = self.coefficients(&counts.backends())?;
        let probs = weighted_merge(counts, &coefficients)?;
        Ok((probs, coefficients))
    }
}

fn ensure_distinct(backends: &[BackendId]) -> Result<()> {
    if backends.is_empty() {
        return Err(Error::InvalidInput("no backends to split across".into()));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = backends.iter().find(|b| !seen.insert(*b)) {
        return Err(Error::InvalidInput(format!("duplicate backend {}", dup)));
    }
    Ok(())
}

/// Floor each `coefficient * shots`, then correct the signed remainder one
/// shot at a time over the first positively weighted backends in input
/// order. A zero-weight backend never receives a shot, so its counts can
/// never reach a merge that would weight them by zero.
pub(crate) fn conserve_shots(
    backends: &[BackendId],
    coefficients: &Coefficients,
    shots: Shots,
) -> Vec<(BackendId, Shots)> {
    let weights: Vec<f64> = backends
        .iter()
        .map(|b| coefficients.get(b).unwrap_or(0.0))
        .collect();
    let mut shares: Vec<i128> = weights
        .iter()
        .map(|w| (w * shots as f64).floor() as i128)
        .collect();

    let mut eligible: Vec<usize> = (0..backends.len()).filter(|&i| weights[i] > 0.0).collect();
    if eligible.is_empty() {
        eligible = (0..backends.len()).collect();
    }

    let assigned: i128 = shares.iter().sum();
    let diff = assigned - shots as i128;
    let step = if diff > 0 { -1 } else { 1 };
    let mut remaining = diff.unsigned_abs();
    let mut i = 0;
    while remaining > 0 {
        let slot = eligible[i % eligible.len()];
        if step > 0 || shares[slot] > 0 {
            shares[slot] += step;
            remaining -= 1;
        }
        i += 1;
    }

    backends
        .iter()
        .cloned()
        .zip(shares.into_iter().map(|s| s as Shots))
        .collect()
}

/// Equal weight `1/n` for every backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct FairSplit;

impl SplitPolicy for FairSplit {
    fn name(&self) -> &str {
        "fair"
    }

    fn coefficients(&self, backends: &[BackendId]) -> Result<Coefficients> {
        ensure_distinct(backends)?;
        let weight = 1.0 / backends.len() as f64;
        Ok(backends.iter().map(|b| (b.clone(), weight)).collect())
    }
}

/// Static per-backend weights, normalized over the backends present.
///
/// Backends without a configured weight get zero; when every present
/// backend weighs zero the policy falls back to a fair split.
#[derive(Debug, Clone, Default)]
pub struct WeightedSplit {
    weights: HashMap<BackendId, f64>,
}

impl WeightedSplit {
    pub fn new(weights: HashMap<BackendId, f64>) -> Self {
        Self { weights }
    }

    pub fn from_config(weights: &[BackendWeight]) -> Self {
        Self::new(
            weights
                .iter()
                .map(|w| (BackendId::new(&w.provider, &w.backend), w.weight.max(0.0)))
                .collect(),
        )
    }
}

impl SplitPolicy for WeightedSplit {
    fn name(&self) -> &str {
        "weighted"
    }

    fn coefficients(&self, backends: &[BackendId]) -> Result<Coefficients> {
        ensure_distinct(backends)?;
        let raw: Vec<f64> = backends
            .iter()
            .map(|b| self.weights.get(b).copied().unwrap_or(0.0))
            .collect();
        let total: f64 = raw.iter().sum();
        if total <= 0.0 {
            return FairSplit.coefficients(backends);
        }
        Ok(backends
            .iter()
            .cloned()
            .zip(raw.into_iter().map(|w| w / total))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backends(n: usize) -> Vec<BackendId> {
        (0..n).map(|i| BackendId::new("aer", format!("b{}", i))).collect()
    }

    #[test]
    fn test_fair_split_even() {
        let (shares, coeffs) = FairSplit.split(&backends(2), 500).unwrap();
        assert_eq!(shares[0].1, 250);
        assert_eq!(shares[1].1, 250);
        assert_eq!(coeffs.get(&BackendId::new("aer", "b0")), Some(0.5));
    }

    #[test]
    fn test_fair_split_remainder_goes_to_first_backends() {
        let (shares, _) = FairSplit.split(&backends(3), 1001).unwrap();
        let shots: Vec<Shots> = shares.iter().map(|(_, s)| *s).collect();
        assert_eq!(shots, vec![334, 334, 333]);
    }

    #[test]
    fn test_shot_conservation() {
        for n in 1..=7 {
            let ids = backends(n);
            for shots in [0u64, 1, 2, 3, 7, 99, 100, 1001, 65_537] {
                let (shares, coeffs) = FairSplit.split(&ids, shots).unwrap();
                let total: Shots = shares.iter().map(|(_, s)| *s).sum();
                assert_eq!(total, shots, "n={} shots={}", n, shots);
                assert!((coeffs.sum() - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_weighted_split_conserves_and_normalizes() {
        let ids = backends(3);
        let mut weights = HashMap::new();
        weights.insert(ids[0].clone(), 3.0);
        weights.insert(ids[1].clone(), 1.0);
        let policy = WeightedSplit::new(weights);

        let (shares, coeffs) = policy.split(&ids, 1000).unwrap();
        assert_eq!(shares[0].1, 750);
        assert_eq!(shares[1].1, 250);
        assert_eq!(shares[2].1, 0);
        assert!((coeffs.sum() - 1.0).abs() < 1e-12);

        for shots in [1u64, 3, 17, 333] {
            let (shares, _) = policy.split(&ids, shots).unwrap();
            assert_eq!(shares.iter().map(|(_, s)| *s).sum::<Shots>(), shots);
        }
    }

    #[test]
    fn test_weighted_remainder_skips_unweighted_backends() {
        use cutshot_core::{Counts, CountsEntry, Observable};

        let ids = backends(3);
        let mut weights = HashMap::new();
        weights.insert(ids[1].clone(), 1.0);
        weights.insert(ids[2].clone(), 1.0);
        let policy = WeightedSplit::new(weights);

        for shots in [1u64, 3, 4, 5] {
            let (shares, _) = policy.split(&ids, shots).unwrap();
            assert_eq!(shares[0].1, 0, "shots={}", shots);
            assert_eq!(shares.iter().map(|(_, s)| *s).sum::<Shots>(), shots);

            let mut counts = RawCounts::new();
            for (backend, share) in shares.iter().filter(|(_, s)| *s > 0) {
                counts.push(
                    backend.clone(),
                    CountsEntry {
                        fragment_id: "f".into(),
                        observable: Observable::parse("Z").unwrap(),
                        counts: [("0".to_string(), *share)].into_iter().collect::<Counts>(),
                    },
                );
            }
            let (probs, _) = policy.merge(&counts).unwrap();
            assert_eq!(probs.len(), 1);
        }
    }

    #[test]
    fn test_weighted_split_all_zero_falls_back_to_fair() {
        let ids = backends(2);
        let coeffs = WeightedSplit::default().coefficients(&ids).unwrap();
        assert_eq!(coeffs.get(&ids[1]), Some(0.5));
    }

    #[test]
    fn test_split_rejects_empty_and_duplicates() {
        assert!(FairSplit.split(&[], 10).is_err());
        let dup = vec![BackendId::new("p", "a"), BackendId::new("p", "a")];
        assert!(FairSplit.split(&dup, 10).is_err());
    }
}
