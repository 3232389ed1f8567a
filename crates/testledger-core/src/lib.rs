//! Core of the testledger runner: framework adapters, health-based
//! exclusions, the test process executor, and the multi-node claim cycle.

pub mod adapter;
pub mod claim;
pub mod discovery;
pub mod error;
pub mod exclusion;
pub mod executor;
pub mod run;

pub use adapter::{Adapter, AdapterRegistry, Detection};
pub use claim::{ClaimSettings, ClaimState, CycleOutcome, NodeCycle};
pub use error::RunError;
pub use exclusion::{ExclusionPolicy, ExclusionSet, FlakyMode};
pub use executor::{ProcessExecutor, TestCommand, TestExecutor};
pub use run::{RunOptions, RunOutcome, RunPlan};
