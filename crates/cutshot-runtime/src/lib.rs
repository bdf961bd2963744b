//! Execution runtime for dispatch plans.
//!
//! `Pipeline` drives one run end to end: cut → allocate → dispatch →
//! execute → merge → reduce → sew. The `Orchestrator` owns the execution
//! phase, in sequential or fan-out/fan-in mode, and restarts whole
//! attempts when a backend reports a missing result.

pub mod counting;
pub mod cutting;
pub mod dispatch;
pub mod expectation;
pub mod mailbox;
pub mod orchestrator;
pub mod pipeline;
pub mod types;

pub use cutting::{CircuitCutter, CutOutput, IdentityCutter};
pub use dispatch::{build_dispatch, DispatchBuild};
pub use expectation::{eigenvalues, expectation_values, reduce};
pub use orchestrator::Orchestrator;
pub use pipeline::Pipeline;
pub use types::*;
