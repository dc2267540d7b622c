//! Error types for cube storage.
//!
//! Every variant describes a broken caller contract rather than a transient
//! condition, so none of them are worth retrying.

use thiserror::Error;

use crate::coords::{ColumnPos, CubePos};

/// Storage-layer error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A storage block was installed into a cube that already holds one
    #[error("cube {pos} already has populated block storage")]
    AlreadyPopulated { pos: CubePos },

    /// Vertical index outside the configured world height
    #[error("vertical index {index} outside of world bounds {min}..{max}")]
    OutOfBoundsVerticalIndex { index: i32, min: i32, max: i32 },

    /// Non-creating access to a cube that is not resident
    #[error("no cube resident at {pos}")]
    MissingUnit { pos: CubePos },

    /// A primed cube was committed over an already loaded one
    #[error("cube {pos} is already loaded")]
    CubeAlreadyLoaded { pos: CubePos },

    /// Entity position does not belong to the column it was added to
    #[error("entity in column {actual} added to column {expected}")]
    EntityOutsideColumn {
        expected: ColumnPos,
        actual: ColumnPos,
    },

    /// Block position does not belong to the column it was used with
    #[error("block in column {actual} accessed through column {expected}")]
    BlockOutsideColumn {
        expected: ColumnPos,
        actual: ColumnPos,
    },

    /// Operation not available for this kind of column
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Invalid world configuration
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
