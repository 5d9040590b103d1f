//! Background tasks for the rendering system.

pub mod chunk_mesh_generation_task;

pub use chunk_mesh_generation_task::{ChunkMeshGenerationTask, ChunkMeshGenerationTaskResult};
