// Level-load errors.
//
// Gameplay never produces Rust errors: an illegal move or a failed placement
// is a command `Failure`. The only fallible boundary is turning a
// `LevelConfig` into a `LevelModel`, where bad data (wrong plane lengths,
// tags nothing can render, entity types with no factory) is rejected up
// front instead of surfacing mid-attempt.
//
// See also: `level.rs` (`LevelModel::new`), `config.rs`.

use crate::types::Position;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("grid dimensions must be positive, got {width}x{height}")]
    EmptyGrid { width: i32, height: i32 },

    #[error("{plane} plane has {actual} cells, expected {expected}")]
    PlaneLengthMismatch {
        plane: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("unknown block type {block_type:?} at {position} on {plane} plane")]
    UnknownBlockType {
        plane: &'static str,
        position: Position,
        block_type: String,
    },

    #[error("no entity factory registered for {0:?}")]
    UnknownEntityType(String),

    #[error("{what} start position {position} is outside the grid")]
    StartOutOfBounds { what: &'static str, position: Position },

    #[error("malformed level JSON: {0}")]
    Json(#[from] serde_json::Error),
}
