//! Dispatch builder: allocation + split policy → per-backend batches.

use cutshot_core::{BackendId, Coefficients, DispatchPlan, Error, FragmentKey, Result, ShotAllocation};
use cutshot_policy::SplitPolicy;
use tracing::debug;

use crate::types::FragmentCoefficients;

/// Output of [`build_dispatch`].
#[derive(Debug, Clone)]
pub struct DispatchBuild {
    pub plan: DispatchPlan,
    /// Coefficients of the last split. Stateless split policies produce the
    /// same weights for every fragment, so this doubles as the summary.
    pub coefficients: Coefficients,
    /// Coefficients of every split, in allocation order.
    pub per_fragment: Vec<FragmentCoefficients>,
}

/// Split every allocated fragment across `backends`.
///
/// Zero-shot shares are left out of the plan. The per-fragment sum over the
/// plan always equals the allocated shots.
pub fn build_dispatch(
    allocation: &ShotAllocation,
    backends: &[BackendId],
    policy: &dyn SplitPolicy,
) -> Result<DispatchBuild> {
    if allocation.is_empty() {
        return Err(Error::InvalidInput("empty shot allocation".into()));
    }

    let mut plan = DispatchPlan::new();
    let mut per_fragment = Vec::with_capacity(allocation.len());
    let mut last = Coefficients::new();

    for (fragment, shots) in allocation.iter() {
        let (shares, coefficients) = policy.split(backends, *shots)?;
        for (backend, share) in shares {
            if share > 0 {
                plan.push(backend, fragment.clone(), share);
            }
        }
        let FragmentKey {
            fragment_id,
            observable,
        } = fragment.key();
        per_fragment.push(FragmentCoefficients {
            fragment_id,
            observable,
            coefficients: coefficients.clone(),
        });
        last = coefficients;
    }

    debug!(
        "Built dispatch plan: {} groups, {} shots, split policy {}",
        plan.len(),
        plan.total_shots(),
        policy.name()
    );

    Ok(DispatchBuild {
        plan,
        coefficients: last,
        per_fragment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutshot_core::{Fragment, FragmentStats, Observable};
    use cutshot_policy::{EqualDivision, FairSplit, ShotAllocationPolicy};

    fn fragments() -> Vec<Fragment> {
        vec![
            Fragment::new("f1", Observable::parse("Z").unwrap(), FragmentStats::default()),
            Fragment::new("f2", Observable::parse("ZZ").unwrap(), FragmentStats::default()),
        ]
    }

    fn backends() -> Vec<BackendId> {
        vec![BackendId::new("mock", "A"), BackendId::new("mock", "B")]
    }

    #[test]
    fn test_equal_division_fair_split() {
        let frags = fragments();
        let allocation = EqualDivision.allocate(&frags, 1000).unwrap();
        assert_eq!(allocation.shots(), vec![500, 500]);

        let build = build_dispatch(&allocation, &backends(), &FairSplit).unwrap();
        for backend in backends() {
            let items = build.plan.get(&backend).unwrap();
            assert_eq!(items.len(), 2);
            assert!(items.iter().all(|item| item.shots == 250));
            assert_eq!(build.coefficients.get(&backend), Some(0.5));
        }
        assert_eq!(build.per_fragment.len(), 2);
        assert_eq!(build.plan.shots_for(&frags[0].key()), 500);
    }

    #[test]
    fn test_conservation_per_fragment() {
        let frags = fragments();
        let allocation = ShotAllocation::new(vec![(frags[0].clone(), 7), (frags[1].clone(), 1)]);
        let ids = vec![
            BackendId::new("p", "a"),
            BackendId::new("p", "b"),
            BackendId::new("p", "c"),
        ];
        let build = build_dispatch(&allocation, &ids, &FairSplit).unwrap();
        assert_eq!(build.plan.shots_for(&frags[0].key()), 7);
        assert_eq!(build.plan.shots_for(&frags[1].key()), 1);
        // "f2" got a single shot, so only the first backend carries it.
        assert_eq!(build.plan.get(&ids[2]).unwrap().len(), 1);
    }

    #[test]
    fn test_zero_shots_omitted() {
        let frags = fragments();
        let allocation = ShotAllocation::new(vec![(frags[0].clone(), 0)]);
        let build = build_dispatch(&allocation, &backends(), &FairSplit).unwrap();
        assert!(build.plan.is_empty());
        assert_eq!(build.per_fragment.len(), 1);
    }

    #[test]
    fn test_empty_allocation_rejected() {
        let err = build_dispatch(&ShotAllocation::default(), &backends(), &FairSplit);
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }
}
