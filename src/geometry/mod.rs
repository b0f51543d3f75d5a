//! Rectangle arithmetic and edge-adjacency graphs for docked window groups

pub mod adjacency;
pub mod rectangle;

pub use adjacency::*;
pub use rectangle::*;
