//! Pluggable shot policies.
//!
//! Allocation policies distribute the global shot budget across fragments.
//! Split policies distribute one fragment's budget across backends and
//! merge the resulting counts back into probability distributions, weighting
//! each backend by the same coefficients. Policies are looked up by name in a
//! [`PolicyRegistry`].

pub mod allocation;
pub mod merge;
pub mod registry;
pub mod split;

pub use allocation::{
    EqualDivision, Exponential, Multiplier, Proportional, ReserveAndDistribute,
    ShotAllocationPolicy,
};
pub use merge::weighted_merge;
pub use registry::PolicyRegistry;
pub use split::{FairSplit, SplitPolicy, WeightedSplit};
