#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel World
//!
//! The chunk core of a voxel engine: bit-packed block storage, the per-chunk mesh
//! state machine, streaming of chunk columns around a viewer, and off-thread mesh
//! generation. GPU upload and drawing are left to an implementation of
//! [`engine_state::rendering::ChunkRenderer`].
//!
//! ## Key Modules
//!
//! * `config` - Tuning options and chunk geometry
//! * `core` - Ownership primitives such as [`core::ThreadBound`]
//! * `engine_state` - The tick-driven facade, voxels, meshing and the worker pool
//! * `error` - Error types for every layer
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use cgmath::Point3;
//! use voxel_world::{
//!     config::EngineConfig,
//!     engine_state::{voxels::{block::registry::BlockRegistry, chunk::PerlinGenerator}, EngineState},
//! };
//!
//! voxel_world::init_logger();
//!
//! let registry = Arc::new(BlockRegistry::with_defaults());
//! let config = EngineConfig {
//!     chunk_side: 16,
//!     column_height: 2,
//!     load_radius: 1,
//!     unload_radius: 2,
//!     worker_threads: 1,
//!     ..EngineConfig::default()
//! };
//! let generator = Box::new(PerlinGenerator::with_registry(7, &registry));
//! let mut engine = EngineState::new(config, registry, generator).unwrap();
//!
//! for _ in 0..4 {
//!     engine.tick(Point3::new(0.0, 16.0, 0.0));
//! }
//! engine.finish_meshing();
//! ```
//!
//! ## Threading
//!
//! All world state lives on the thread that owns the [`EngineState`]. Mesh jobs
//! receive a copy of the blocks they read and only send buffers back.

pub mod config;
pub mod core;
pub mod engine_state;
pub mod error;

pub use config::{ChunkDimensions, EngineConfig};
pub use engine_state::{EngineState, TickReport};

/// Installs the `env_logger` backend, writing to stdout and filtered by `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logger() {
    let mut log_builder = env_logger::Builder::new();
    let initialized = log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .try_init()
        .is_ok();

    if initialized {
        log::info!("Logger initialized");
    }
}
