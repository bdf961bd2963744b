//! Fragment model, dispatch types, Pauli observables and configuration.

pub mod config;
pub mod error;
pub mod fragment;
pub mod introspect;
pub mod observable;
pub mod types;

pub use config::{BackendWeight, ExecutionConfig, ExecutionMode, Handoff, PipelineConfig, ReportFlags};
pub use error::{Error, Result};
pub use fragment::{content_hash, fragments_from_cut, CircuitIntrospector, Feature, Fragment, FragmentStats};
pub use introspect::QasmIntrospector;
pub use observable::{Observable, Pauli};
pub use types::*;
