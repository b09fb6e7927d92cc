//! Error types for the task engine.
//!
//! Commands report these and leave simulation state untouched. Data loading
//! surfaces [`GameError::DataParseError`] and [`GameError::MissingDropPoint`].

use thiserror::Error;

use crate::components::{EntityId, ResourceKind};
use crate::grid::TilePos;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Destination is outside the map or not free.
    #[error("Invalid target tile ({}, {})", .0.x, .0.y)]
    InvalidTarget(TilePos),

    /// The pathfinder exhausted its frontier.
    #[error("No path from ({}, {}) to ({}, {})", .from.x, .from.y, .to.x, .to.y)]
    NoPathFound {
        /// Start tile.
        from: TilePos,
        /// Goal tile.
        to: TilePos,
    },

    /// No resource of the requested kind exists anywhere.
    #[error("No {0:?} available")]
    ResourceUnavailable(ResourceKind),

    /// Insufficient resources.
    #[error("Insufficient {resource:?}: need {required}, have {available}")]
    InsufficientFunds {
        /// Resource type.
        resource: ResourceKind,
        /// Amount required.
        required: i64,
        /// Amount available.
        available: i64,
    },

    /// Target has zero hp or has already been removed.
    #[error("Entity {0} is already dead")]
    EntityAlreadyDead(EntityId),

    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The catalog has no building type that accepts resource returns.
    #[error("Catalog has no drop-point building type")]
    MissingDropPoint,

    /// Data file parsing error.
    #[error("Failed to parse data '{source_name}': {message}")]
    DataParseError {
        /// Name of the data source that failed to parse.
        source_name: String,
        /// Error message.
        message: String,
    },

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}
