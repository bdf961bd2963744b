//! Shot allocation policies: global budget → per-fragment shots.
//!
//! Every policy floors its shares. Truncation remainders are not
//! redistributed, so the allocated total may fall short of the budget.

use cutshot_core::{Error, Feature, Fragment, Result, ShotAllocation, Shots};

/// Strategy mapping fragments and a total budget to per-fragment shots.
///
/// Output has exactly one entry per fragment, in input order. Policies are
/// pure: the same input always yields the same allocation.
pub trait ShotAllocationPolicy: Send + Sync {
    /// Registry name.
    fn name(&self) -> &str;

    fn allocate(&self, fragments: &[Fragment], total_shots: Shots) -> Result<ShotAllocation>;
}

fn ensure_non_empty(fragments: &[Fragment]) -> Result<()> {
    if fragments.is_empty() {
        return Err(Error::InvalidInput("no fragments to allocate".into()));
    }
    Ok(())
}

fn zip_shares(fragments: &[Fragment], shares: Vec<Shots>) -> ShotAllocation {
    ShotAllocation::new(fragments.iter().cloned().zip(shares).collect())
}

/// Integer shares `floor(w_i / Σw * budget)`; all zero when Σw is zero.
fn proportional_shares(weights: &[u64], budget: Shots) -> Vec<Shots> {
    let total: u128 = weights.iter().map(|w| *w as u128).sum();
    if total == 0 {
        return vec![0; weights.len()];
    }
    weights
        .iter()
        .map(|w| (*w as u128 * budget as u128 / total) as Shots)
        .collect()
}

fn features(fragments: &[Fragment], feature: Feature) -> Vec<u64> {
    fragments.iter().map(|f| f.feature(feature)).collect()
}

/// Equal division: `total / n` for every fragment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualDivision;

impl ShotAllocationPolicy for EqualDivision {
    fn name(&self) -> &str {
        "divider"
    }

    fn allocate(&self, fragments: &[Fragment], total_shots: Shots) -> Result<ShotAllocation> {
        ensure_non_empty(fragments)?;
        let each = total_shots / fragments.len() as Shots;
        Ok(zip_shares(fragments, vec![each; fragments.len()]))
    }
}

/// Pass-through: every fragment receives the full budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct Multiplier;

impl ShotAllocationPolicy for Multiplier {
    fn name(&self) -> &str {
        "multiplier"
    }

    fn allocate(&self, fragments: &[Fragment], total_shots: Shots) -> Result<ShotAllocation> {
        ensure_non_empty(fragments)?;
        Ok(zip_shares(fragments, vec![total_shots; fragments.len()]))
    }
}

/// Weight proportional to a fragment feature.
#[derive(Debug, Clone, Copy)]
pub struct Proportional {
    pub feature: Feature,
}

impl Proportional {
    pub fn new(feature: Feature) -> Self {
        Self { feature }
    }
}

impl ShotAllocationPolicy for Proportional {
    fn name(&self) -> &str {
        match self.feature {
            Feature::Qubits => "qubit_proportional",
            Feature::TwoQubitGates => "2qgates_proportional",
        }
    }

    fn allocate(&self, fragments: &[Fragment], total_shots: Shots) -> Result<ShotAllocation> {
        ensure_non_empty(fragments)?;
        let shares = proportional_shares(&features(fragments, self.feature), total_shots);
        Ok(zip_shares(fragments, shares))
    }
}

/// Weight proportional to `exp(feature)`.
///
/// Computed as a max-shifted softmax so large features cannot overflow.
#[derive(Debug, Clone, Copy)]
pub struct Exponential {
    pub feature: Feature,
}

impl Exponential {
    pub fn new(feature: Feature) -> Self {
        Self { feature }
    }
}

impl ShotAllocationPolicy for Exponential {
    fn name(&self) -> &str {
        match self.feature {
            Feature::Qubits => "qubit_exp",
            Feature::TwoQubitGates => "2qgates_exp",
        }
    }

    fn allocate(&self, fragments: &[Fragment], total_shots: Shots) -> Result<ShotAllocation> {
        ensure_non_empty(fragments)?;
        let values: Vec<f64> = features(fragments, self.feature)
            .into_iter()
            .map(|v| v as f64)
            .collect();
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
        let sum: f64 = exps.iter().sum();

        let shares = exps
            .iter()
            .map(|e| ((e / sum) * total_shots as f64).floor().min(total_shots as f64) as Shots)
            .collect();
        Ok(zip_shares(fragments, shares))
    }
}

/// Hybrid: reserve a fraction of the budget for equal division, then
/// distribute the rest proportionally to a feature.
#[derive(Debug, Clone, Copy)]
pub struct ReserveAndDistribute {
    pub feature: Feature,
    pub reserve_fraction: f64,
}

impl ReserveAndDistribute {
    pub fn new(feature: Feature, reserve_fraction: f64) -> Self {
        Self {
            feature,
            reserve_fraction,
        }
    }
}

impl Default for ReserveAndDistribute {
    fn default() -> Self {
        Self::new(Feature::TwoQubitGates, 0.2)
    }
}

impl ShotAllocationPolicy for ReserveAndDistribute {
    fn name(&self) -> &str {
        match self.feature {
            Feature::Qubits => "qubit_proportional_pareto",
            Feature::TwoQubitGates => "2qgates_proportional_pareto",
        }
    }

    fn allocate(&self, fragments: &[Fragment], total_shots: Shots) -> Result<ShotAllocation> {
        ensure_non_empty(fragments)?;
        if !(0.0..=1.0).contains(&self.reserve_fraction) {
            return Err(Error::InvalidInput(format!(
                "reserve fraction {} outside [0, 1]",
                self.reserve_fraction
            )));
        }
        let reserve = (total_shots as f64 * self.reserve_fraction).floor() as Shots;
        let remainder = total_shots - reserve.min(total_shots);
        let equal = reserve / fragments.len() as Shots;

        let shares = proportional_shares(&features(fragments, self.feature), remainder)
            .into_iter()
            .map(|s| s + equal)
            .collect();
        Ok(zip_shares(fragments, shares))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutshot_core::{FragmentStats, Observable};

    fn fragment(name: &str, qubits: u64, two_q: u64) -> Fragment {
        Fragment::new(
            name,
            Observable::parse(&"Z".repeat(qubits.max(1) as usize)).unwrap(),
            FragmentStats {
                qubits,
                num_2q_gates: two_q,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_equal_division_floors() {
        let frags = vec![fragment("a", 1, 0), fragment("b", 2, 0), fragment("c", 2, 0)];
        let alloc = EqualDivision.allocate(&frags, 1001).unwrap();
        assert_eq!(alloc.shots(), vec![333, 333, 333]);
        assert_eq!(alloc.total(), 999);
        assert_eq!(alloc.entries()[1].0.circuit(), "b");
    }

    #[test]
    fn test_multiplier_passes_through() {
        let frags = vec![fragment("a", 1, 0), fragment("b", 2, 0)];
        let alloc = Multiplier.allocate(&frags, 700).unwrap();
        assert_eq!(alloc.shots(), vec![700, 700]);
    }

    #[test]
    fn test_proportional_by_qubits() {
        let frags = vec![fragment("a", 1, 0), fragment("b", 3, 0)];
        let alloc = Proportional::new(Feature::Qubits).allocate(&frags, 1000).unwrap();
        assert_eq!(alloc.shots(), vec![250, 750]);
    }

    #[test]
    fn test_proportional_zero_features() {
        let frags = vec![fragment("a", 1, 0), fragment("b", 2, 0)];
        let alloc = Proportional::new(Feature::TwoQubitGates)
            .allocate(&frags, 1000)
            .unwrap();
        assert_eq!(alloc.shots(), vec![0, 0]);
    }

    #[test]
    fn test_exponential_bias() {
        let frags = vec![fragment("a", 1, 0), fragment("b", 1, 1)];
        let alloc = Exponential::new(Feature::TwoQubitGates)
            .allocate(&frags, 1000)
            .unwrap();
        assert_eq!(alloc.shots(), vec![268, 731]);
    }

    #[test]
    fn test_exponential_large_features_do_not_overflow() {
        let frags = vec![fragment("a", 1, 5000), fragment("b", 1, 5000)];
        let alloc = Exponential::new(Feature::TwoQubitGates)
            .allocate(&frags, 1000)
            .unwrap();
        assert_eq!(alloc.shots(), vec![500, 500]);
    }

    #[test]
    fn test_reserve_and_distribute() {
        let frags = vec![fragment("a", 1, 1), fragment("b", 1, 3)];
        let alloc = ReserveAndDistribute::default().allocate(&frags, 1000).unwrap();
        assert_eq!(alloc.shots(), vec![300, 700]);
    }

    #[test]
    fn test_reserve_and_distribute_zero_features() {
        let frags = vec![fragment("a", 1, 0), fragment("b", 1, 0)];
        let alloc = ReserveAndDistribute::default().allocate(&frags, 1000).unwrap();
        assert_eq!(alloc.shots(), vec![100, 100]);
    }

    #[test]
    fn test_allocation_is_deterministic() {
        let frags = vec![fragment("a", 2, 3), fragment("b", 3, 1), fragment("c", 1, 7)];
        let policies: Vec<Box<dyn ShotAllocationPolicy>> = vec![
            Box::new(EqualDivision),
            Box::new(Proportional::new(Feature::TwoQubitGates)),
            Box::new(Exponential::new(Feature::Qubits)),
            Box::new(ReserveAndDistribute::default()),
        ];
        for policy in &policies {
            let first = policy.allocate(&frags, 12_345).unwrap();
            let second = policy.allocate(&frags, 12_345).unwrap();
            assert_eq!(first.shots(), second.shots(), "policy {}", policy.name());
            assert!(first.total() <= 12_345);
            assert_eq!(first.len(), frags.len());
        }
    }

    #[test]
    fn test_empty_fragments_rejected() {
        assert!(EqualDivision.allocate(&[], 100).is_err());
        assert!(Proportional::new(Feature::Qubits).allocate(&[], 100).is_err());
    }
}
