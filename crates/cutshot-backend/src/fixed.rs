//! Replay adapter that turns known distributions into counts.

use std::collections::HashMap;

use cutshot_core::{Counts, DispatchItem, Distribution, Error, FragmentKey, Result, Shots};

use crate::adapter::{BackendAdapter, BitOrder, JobResult};

/// Adapter answering every job from a fixed distribution.
///
/// Counts are the distribution scaled to the requested shots with
/// largest-remainder rounding, so they always sum to the shot count.
/// Distributions are written in the adapter's declared bit order.
#[derive(Debug, Clone)]
pub struct FixedCountsBackend {
    bit_order: BitOrder,
    distributions: HashMap<FragmentKey, Distribution>,
    fallback: Option<Distribution>,
}

impl FixedCountsBackend {
    pub fn new(bit_order: BitOrder) -> Self {
        Self {
            bit_order,
            distributions: HashMap::new(),
            fallback: None,
        }
    }

    pub fn with_distribution(mut self, key: FragmentKey, distribution: Distribution) -> Self {
        self.distributions.insert(key, distribution);
        self
    }

    /// Distribution used for keys without their own entry.
    pub fn with_fallback(mut self, distribution: Distribution) -> Self {
        self.fallback = Some(distribution);
        self
    }
}

impl BackendAdapter for FixedCountsBackend {
    fn bit_order(&self) -> BitOrder {
        self.bit_order
    }

    fn run(&mut self, batch: &[DispatchItem]) -> Result<Vec<JobResult>> {
        batch
            .iter()
            .map(|item| {
                let key = item.fragment.key();
                let dist = self
                    .distributions
                    .get(&key)
                    .or(self.fallback.as_ref())
                    .ok_or_else(|| Error::Backend(format!("no replay distribution for {}", key)))?;
                Ok(JobResult::completed(item, scale(dist, item.shots)))
            })
            .collect()
    }
}

/// Scale a distribution to integer counts summing to `shots`.
fn scale(dist: &Distribution, shots: Shots) -> Counts {
    let total: f64 = dist.values().sum();
    if dist.is_empty() || total <= 0.0 {
        return Counts::new();
    }
    let mut floors: Vec<(&String, u64, f64)> = dist
        .iter()
        .map(|(state, p)| {
            let exact = p / total * shots as f64;
            (state, exact.floor() as u64, exact - exact.floor())
        })
        .collect();

    let assigned: u64 = floors.iter().map(|(_, n, _)| *n).sum();
    let mut order: Vec<usize> = (0..floors.len()).collect();
    order.sort_by(|a, b| floors[*b].2.total_cmp(&floors[*a].2));
    for idx in order.into_iter().cycle().take(shots.saturating_sub(assigned) as usize) {
        floors[idx].1 += 1;
    }

    floors
        .into_iter()
        .filter(|(_, n, _)| *n > 0)
        .map(|(state, n, _)| (state.clone(), n))
        .collect()
}
