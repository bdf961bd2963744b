//! Backend adapters, the seam between the orchestrator and whatever
//! actually runs circuits.
//!
//! `BackendAdapter` executes a batch of (fragment, shots) on one backend.
//! A structurally absent result is reported with the `JobOutcome::Missing`
//! sentinel, never as an error, so the orchestrator can retry the attempt.
//! Adapters are created per execution unit from factories registered in a
//! `BackendRegistry`; an unregistered (provider, backend) pair is fatal.

pub mod adapter;
pub mod fixed;
pub mod registry;

pub use adapter::{BackendAdapter, BitOrder, JobOutcome, JobResult};
pub use fixed::FixedCountsBackend;
pub use registry::{AdapterFactory, BackendRegistry};
