//! # Error Types
//!
//! Every fallible operation in the crate reports one of the enums below.
//!
//! * Range errors (`BitBufferError`, `PaletteError::PositionOutOfRange`,
//!   `ChunkError::LocalOutOfRange`) are
//!   programmer errors. The operation is aborted and nothing is retried.
//! * Invariant violations (`PaletteError::EmptyEntry`, `PaletteError::CapacityExceeded`,
//!   `ChunkError::NotGenerated`, `ChunkError::StateReentry`) fail the operation in
//!   progress and are logged at `error` by the owner of the chunk.
//! * Background failures (`TaskError`, `MeshError`) are caught at the scheduler
//!   boundary and only mark the job as "did not complete".
//!
//! Transient scheduling conditions (a neighbor that is not generated yet, a stale
//! job result) are not errors and never show up here.

use cgmath::Point3;

/// Failure of a raw bit read or write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BitBufferError {
    #[error("bit range {offset}..{offset}+{length} is outside a buffer of {capacity} bits")]
    OutOfRange {
        offset: usize,
        length: usize,
        capacity: usize,
    },
}

/// Failure inside a block palette.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaletteError {
    #[error("block position {position} is outside a palette of capacity {capacity}")]
    PositionOutOfRange { position: usize, capacity: usize },

    #[error(
        "block position {position} resolves to empty palette entry {index} \
         (index width {width} bits, {unique} unique entries)"
    )]
    EmptyEntry {
        position: usize,
        index: usize,
        width: usize,
        unique: usize,
    },

    #[error("palette cannot grow past {width} bits for a capacity of {capacity} blocks")]
    CapacityExceeded { width: usize, capacity: usize },

    #[error(transparent)]
    BitBuffer(#[from] BitBufferError),
}

/// Failure of a chunk operation or a mesh-state transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("chunk {position:?} has not been generated yet")]
    NotGenerated { position: [i32; 3] },

    #[error("chunk {position:?} is already in state {state}")]
    StateReentry { position: [i32; 3], state: &'static str },

    #[error("chunk {position:?} cannot move from {from} to {to}")]
    InvalidTransition {
        position: [i32; 3],
        from: &'static str,
        to: &'static str,
    },

    #[error("local block {local:?} is outside chunk {position:?} of side {side}")]
    LocalOutOfRange {
        position: [i32; 3],
        local: [usize; 3],
        side: usize,
    },

    #[error("chunk {position:?}: {source}")]
    Palette {
        position: [i32; 3],
        #[source]
        source: PaletteError,
    },

    #[error("generation of chunk {position:?} failed: {reason}")]
    Generation { position: [i32; 3], reason: String },
}

impl ChunkError {
    /// Wraps a palette failure with the coordinate of the owning chunk.
    pub fn palette(position: Point3<i32>, source: PaletteError) -> Self {
        ChunkError::Palette {
            position: position.into(),
            source,
        }
    }
}

/// Failure while loading or validating an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failure of a background mesh job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    #[error("mesh generation panicked: {0}")]
    Panicked(String),

    #[error("neighbor cache holds {actual} cells, expected {expected}")]
    CacheMismatch { expected: usize, actual: usize },
}

/// Failure reported by the worker pool for a task that produced no output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("task panicked on a worker thread: {0}")]
    Panicked(String),
}

/// Turns a panic payload into something printable.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
