//! `plan` and `run` subcommands.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use cutshot_backend::BackendRegistry;
use cutshot_core::{fragments_from_cut, Distribution, PipelineConfig, QasmIntrospector};
use cutshot_policy::PolicyRegistry;
use cutshot_runtime::{build_dispatch, Pipeline};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

/// One entry of a fragments file.
#[derive(Debug, Deserialize)]
pub struct FragmentSpec {
    pub circuit: String,
    pub observables: Vec<String>,
}

/// Allocate and split the fragments of `fragments_path` without executing.
pub fn plan(config_path: &Path, fragments_path: &Path) -> anyhow::Result<Value> {
    let config = PipelineConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let data = std::fs::read_to_string(fragments_path)
        .with_context(|| format!("reading {}", fragments_path.display()))?;
    let specs: Vec<FragmentSpec> = serde_json::from_str(&data)?;
    let cut: Vec<(String, Vec<String>)> = specs
        .into_iter()
        .map(|s| (s.circuit, s.observables))
        .collect();

    let fragments = fragments_from_cut(&cut, &QasmIntrospector::new())?;
    let policies = PolicyRegistry::from_config(&config);
    let allocation = policies
        .allocation(&config.allocation_policy)?
        .allocate(&fragments, config.shots)?;
    let split = policies.split(&config.split_policy)?;
    let build = build_dispatch(&allocation, &config.backends, split.as_ref())?;

    info!(
        "Planned {} fragments onto {} backend groups ({} shots)",
        fragments.len(),
        build.plan.len(),
        build.plan.total_shots()
    );

    Ok(json!({
        "allocation": allocation,
        "dispatch": build.plan,
        "coefficients": build.coefficients,
        "fragment_coefficients": build.per_fragment,
    }))
}

/// Run the full pipeline on a QASM file against replay backends.
pub async fn run(
    config_path: &Path,
    circuit_path: &Path,
    observable: &str,
    replay_path: &Path,
) -> anyhow::Result<Value> {
    let config = PipelineConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let circuit = std::fs::read_to_string(circuit_path)
        .with_context(|| format!("reading {}", circuit_path.display()))?;
    let replay: Distribution = serde_json::from_str(
        &std::fs::read_to_string(replay_path)
            .with_context(|| format!("reading {}", replay_path.display()))?,
    )?;

    let backends: Arc<BackendRegistry> = Arc::new(crate::replay_backends(Some(replay)));
    let report = Pipeline::new(config, backends)?
        .run(&circuit, observable)
        .await?;
    Ok(serde_json::to_value(&report)?)
}
