//! Name → policy registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use cutshot_core::{Error, Feature, PipelineConfig, Result};
use tracing::debug;

use crate::allocation::*;
use crate::split::*;

/// Explicitly registered allocation and split policies, keyed by name.
#[derive(Clone, Default)]
pub struct PolicyRegistry {
    allocation: BTreeMap<String, Arc<dyn ShotAllocationPolicy>>,
    split: BTreeMap<String, Arc<dyn SplitPolicy>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every reference policy, using default parameters.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_allocation(Arc::new(EqualDivision));
        registry.register_allocation(Arc::new(Multiplier));
        for feature in [Feature::Qubits, Feature::TwoQubitGates] {
            registry.register_allocation(Arc::new(Proportional::new(feature)));
            registry.register_allocation(Arc::new(Exponential::new(feature)));
        }
        registry.register_allocation(Arc::new(ReserveAndDistribute::default()));
        registry.register_split(Arc::new(FairSplit));
        registry.register_split(Arc::new(WeightedSplit::default()));
        registry
    }

    /// Registry with reference policies parameterized from `config`.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut registry = Self::with_defaults();
        registry.register_allocation(Arc::new(ReserveAndDistribute::new(
            Feature::TwoQubitGates,
            config.reserve_fraction,
        )));
        registry.register_split(Arc::new(WeightedSplit::from_config(&config.split_weights)));
        registry
    }

    /// Register under the policy's own name, replacing any previous entry.
    pub fn register_allocation(&mut self, policy: Arc<dyn ShotAllocationPolicy>) {
        debug!("Registered allocation policy {}", policy.name());
        self.allocation.insert(policy.name().to_string(), policy);
    }

    pub fn register_split(&mut self, policy: Arc<dyn SplitPolicy>) {
        debug!("Registered split policy {}", policy.name());
        self.split.insert(policy.name().to_string(), policy);
    }

    pub fn allocation(&self, name: &str) -> Result<Arc<dyn ShotAllocationPolicy>> {
        self.allocation
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownPolicy(format!("allocation policy '{}'", name)))
    }

    pub fn split(&self, name: &str) -> Result<Arc<dyn SplitPolicy>> {
        self.split
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownPolicy(format!("split policy '{}'", name)))
    }

    pub fn allocation_names(&self) -> Vec<&str> {
        self.allocation.keys().map(String::as_str).collect()
    }

    pub fn split_names(&self) -> Vec<&str> {
        self.split.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutshot_core::{BackendId, BackendWeight};

    #[test]
    fn test_default_names() {
        let registry = PolicyRegistry::with_defaults();
        assert_eq!(
            registry.allocation_names(),
            vec![
                "2qgates_exp",
                "2qgates_proportional",
                "2qgates_proportional_pareto",
                "divider",
                "multiplier",
                "qubit_exp",
                "qubit_proportional",
            ]
        );
        assert_eq!(registry.split_names(), vec!["fair", "weighted"]);
    }

    #[test]
    fn test_unknown_policy() {
        let registry = PolicyRegistry::with_defaults();
        assert!(matches!(
            registry.allocation("nope"),
            Err(Error::UnknownPolicy(_))
        ));
        assert!(registry.split("nope").is_err());
    }

    #[test]
    fn test_from_config_uses_weights() {
        let mut config = PipelineConfig::new(
            100,
            vec![BackendId::new("p", "a"), BackendId::new("p", "b")],
        );
        config.split_weights = vec![BackendWeight {
            provider: "p".into(),
            backend: "a".into(),
            weight: 1.0,
        }];
        let registry = PolicyRegistry::from_config(&config);
        let policy = registry.split("weighted").unwrap();
        let (shares, _) = policy.split(&config.backends, 100).unwrap();
        assert_eq!(shares[0].1, 100);
        assert_eq!(shares[1].1, 0);
    }
}
