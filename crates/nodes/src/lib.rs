//! `nodes` crate — node kinds, the `NodeExecutor` trait and the simulated
//! executors behind run previews.
//!
//! Every node kind is a variant of the closed [`NodeKind`] enum; the engine
//! crate dispatches execution through the [`NodeExecutor`] trait object.

pub mod builtin;
pub mod error;
pub mod kind;
pub mod mock;
pub mod path;
pub mod simulate;
pub mod traits;

pub use error::NodeError;
pub use kind::{NodeCategory, NodeKind, NodeType};
pub use simulate::{SimulatedExecutor, SimulationConfig};
pub use traits::{ExecutionContext, NodeExecutor, NodeOutcome};
