//! Group move engine services

pub mod graph_invariant;
pub mod group_orchestrator;
pub mod group_registry;
pub mod move_propagator;
pub mod tick_scheduler;

pub use graph_invariant::*;
pub use group_orchestrator::*;
pub use group_registry::*;
pub use move_propagator::*;
pub use tick_scheduler::*;
