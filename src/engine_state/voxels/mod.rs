//! # Voxel Storage
//!
//! Everything that stores, addresses and streams blocks.
//!
//! ## Architecture
//!
//! * **Block**: block states, render types and the registry of known blocks
//! * **Palette**: bit-packed per-chunk storage built on [`bit_buffer::BitBuffer`]
//! * **Chunk**: a cube of blocks and the state machine deciding when it is meshed
//! * **Column**: a vertical stack of chunks, the unit of loading
//! * **Chunk manager**: keeps columns resident around the viewer and answers
//!   world-space block queries
//!
//! ## Data Flow
//!
//! 1. The chunk manager loads columns nearest-first along the [`spiral::LoadSpiral`]
//! 2. Each chunk is generated and, if it holds rendered blocks, waits for a mesh
//! 3. The mesh scheduler copies a [`neighbor_cache::NeighborCache`] and meshes off-thread
//! 4. Edits send the chunk and the neighbors sampling the edited block back to waiting

pub mod bit_buffer;
pub mod block;
pub mod chunk;
pub mod chunk_manager;
pub mod column;
pub mod neighbor_cache;
pub mod neighbor_table;
pub mod palette;
pub mod spiral;
