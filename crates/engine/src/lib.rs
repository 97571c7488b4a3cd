//! `engine` crate — graph model, edit-time validation, scheduling and the
//! run controller that previews an automation graph.

pub mod config;
pub mod controller;
pub mod cycle;
pub mod dag;
pub mod error;
pub mod models;
pub mod propagation;
pub mod sink;
pub mod state;
pub mod validate;

pub use config::{ControllerConfig, EngineConfig};
pub use controller::RunController;
pub use cycle::would_create_cycle;
pub use dag::{topological_order, validate_graph, Schedule};
pub use error::EngineError;
pub use models::{Edge, Graph, GraphSnapshot, Node, SharedGraph};
pub use sink::{ExecutionSink, InMemorySink};
pub use state::{LogEntry, NodeRunRecord, NodeStatus, RunState, RunStatus};
pub use validate::{validate_connection, ConnectionRejected};
