//! End-to-end pipeline driver.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use cutshot_backend::BackendRegistry;
use cutshot_core::{
    fragments_from_cut, CircuitIntrospector, Error, PipelineConfig, QasmIntrospector, Result,
};
use cutshot_policy::PolicyRegistry;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::cutting::{CircuitCutter, IdentityCutter};
use crate::dispatch::build_dispatch;
use crate::expectation::expectation_values;
use crate::orchestrator::Orchestrator;
use crate::types::*;

/// Drives one run: cut → allocate → dispatch → execute → merge → reduce →
/// sew, timing every phase.
pub struct Pipeline {
    config: PipelineConfig,
    policies: PolicyRegistry,
    backends: Arc<BackendRegistry>,
    cutter: Arc<dyn CircuitCutter>,
    introspector: Arc<dyn CircuitIntrospector>,
}

impl Pipeline {
    /// Validate `config` and build a pipeline with the reference policies,
    /// no cutting and the QASM introspector.
    pub fn new(config: PipelineConfig, backends: Arc<BackendRegistry>) -> Result<Self> {
        config.validate()?;
        let policies = PolicyRegistry::from_config(&config);
        Ok(Self {
            config,
            policies,
            backends,
            cutter: Arc::new(IdentityCutter),
            introspector: Arc::new(QasmIntrospector::new()),
        })
    }

    pub fn with_cutter(mut self, cutter: Arc<dyn CircuitCutter>) -> Self {
        self.cutter = cutter;
        self
    }

    pub fn with_introspector(mut self, introspector: Arc<dyn CircuitIntrospector>) -> Self {
        self.introspector = introspector;
        self
    }

    /// Replace the policy registry, e.g. to add custom policies.
    pub fn with_policies(mut self, policies: PolicyRegistry) -> Self {
        self.policies = policies;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn policies(&self) -> &PolicyRegistry {
        &self.policies
    }

    /// Estimate `observable` on `circuit`.
    ///
    /// Fatal errors abort the run with no report.
    pub async fn run(&self, circuit: &str, observable: &str) -> Result<PipelineReport> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("run", run_id = %run_id);
        self.run_inner(run_id, circuit, observable)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        run_id: String,
        circuit: &str,
        observable: &str,
    ) -> Result<PipelineReport> {
        let started_at = Utc::now().to_rfc3339();
        let total = Instant::now();
        let mut times = PhaseTimes::new();

        let allocation_policy = self.policies.allocation(&self.config.allocation_policy)?;
        let split_policy = self.policies.split(&self.config.split_policy)?;
        info!(
            "Starting run: {} shots, {} backends, allocation={}, split={}",
            self.config.shots,
            self.config.backends.len(),
            allocation_policy.name(),
            split_policy.name()
        );

        let t = Instant::now();
        let cut = self.cutter.cut(circuit, observable)?;
        let fragments = fragments_from_cut(&cut.fragments, self.introspector.as_ref())?;
        if fragments.is_empty() {
            return Err(Error::Cut(format!("{} produced no fragments", self.cutter.name())));
        }
        times.record(Phase::Cutting, t.elapsed());
        debug!("Cut into {} fragments", fragments.len());

        let t = Instant::now();
        let allocation = allocation_policy.allocate(&fragments, self.config.shots)?;
        times.record(Phase::Allocation, t.elapsed());

        let t = Instant::now();
        let dispatch = build_dispatch(&allocation, &self.config.backends, split_policy.as_ref())?;
        times.record(Phase::Dispatch, t.elapsed());

        let orchestrator = Orchestrator::new(self.backends.clone(), self.config.execution.clone())
            .with_run_id(run_id.clone());
        let execution = orchestrator.execute(&dispatch.plan).await?;
        times.merge(&execution.times);

        let t = Instant::now();
        let (probabilities, merge_coefficients) = split_policy.merge(&execution.counts)?;
        times.record(Phase::Merge, t.elapsed());

        let t = Instant::now();
        let values = expectation_values(&probabilities, &fragments)?;
        times.record(Phase::ExpectedValues, t.elapsed());

        let t = Instant::now();
        let result = self.cutter.sew(&values, &cut.sew_data)?;
        times.record(Phase::Sew, t.elapsed());
        times.record(Phase::Total, total.elapsed());

        let error = self.config.reference_value.map(|reference| reference - result);
        info!(
            result,
            attempts = execution.attempts,
            "Run complete in {:.3}s",
            total.elapsed().as_secs_f64()
        );

        let flags = self.config.report.normalized();
        let params = flags.params.then(|| RunParams {
            circuit: circuit.to_string(),
            observable: observable.to_string(),
            shots: self.config.shots,
            backends: self.config.backends.clone(),
            cut_strategy: self.cutter.name().to_string(),
            allocation_policy: allocation_policy.name().to_string(),
            split_policy: split_policy.name().to_string(),
            execution_mode: self.config.execution.mode,
            reference_value: self.config.reference_value,
        });
        let stats = flags.stats.then(|| RunStats {
            circuit_stats: self.introspector.describe(circuit).ok(),
            cut_info: cut.cut_info.clone(),
            fragments: allocation
                .iter()
                .map(|(fragment, shots)| FragmentReport {
                    fragment_id: fragment.id().to_string(),
                    observable: fragment.observable().clone(),
                    shots: *shots,
                    stats: fragment.stats().clone(),
                })
                .collect(),
            allocation: allocation.clone(),
            dispatch: dispatch.plan.clone(),
            counts: execution.counts.clone(),
            probabilities: probabilities.clone(),
            split_coefficients: dispatch.coefficients.clone(),
            fragment_split_coefficients: dispatch.per_fragment.clone(),
            merge_coefficients: merge_coefficients.clone(),
            expectation_values: values.clone(),
            attempts: execution.attempts,
        });

        Ok(PipelineReport {
            run_id,
            started_at,
            result,
            error,
            params,
            times: flags.times.then_some(times),
            stats,
        })
    }
}
