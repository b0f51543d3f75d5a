//! dockgroup - Geometry and graph-invariant engine for docked window groups
//!
//! When one window of a docked group is dragged or resized, dockgroup works out
//! where every other member has to go so shared edges stay aligned, and rejects
//! any move that would tear the group apart.

pub mod cli;
pub mod config;
pub mod geometry;
pub mod logging;
pub mod models;
pub mod services;

pub use geometry::*;
pub use models::*;
pub use services::*;

/// Result type alias for dockgroup operations
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to dockgroup operations
#[derive(thiserror::Error, Debug)]
pub enum DockGroupError {
    /// Propagation disagreed with the literal request for the leader. This is a
    /// logic defect, never a policy decision.
    #[error("Leader {window} would end at {proposed} instead of the requested {requested}")]
    LeaderMismatch {
        window: models::WindowRef,
        requested: geometry::Rectangle,
        proposed: geometry::Rectangle,
    },

    #[error("Window not found: {0}")]
    WindowNotFound(models::WindowRef),

    #[error("Group not found: {0}")]
    GroupNotFound(uuid::Uuid),

    #[error("Group {0} has an open move transaction")]
    TransactionOpen(uuid::Uuid),

    #[error("Invalid change type: {0}")]
    InvalidChangeType(u8),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
