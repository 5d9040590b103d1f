//! # Chunk Column
//!
//! A vertical stack of chunks sharing one `(x, z)` column coordinate. Slot `i`
//! holds the chunk at chunk-grid height `i`.

use cgmath::{Point2, Point3};

use super::chunk::{Chunk, ChunkGenerator};
use crate::{config::ChunkDimensions, error::ChunkError};

pub struct ChunkColumn {
    position: Point2<i32>,
    chunks: Vec<Chunk>,
}

impl ChunkColumn {
    /// Creates a column of ungenerated chunks.
    pub fn new(position: Point2<i32>, height: usize, dims: ChunkDimensions) -> Self {
        let chunks = (0..height)
            .map(|slot| Chunk::new(Point3::new(position.x, slot as i32, position.y), dims))
            .collect();
        ChunkColumn { position, chunks }
    }

    /// Column coordinate; `y` holds the chunk-grid `z`.
    pub fn position(&self) -> Point2<i32> {
        self.position
    }

    pub fn height(&self) -> usize {
        self.chunks.len()
    }

    /// Chunk at chunk-grid height `y`, if the column reaches that high.
    pub fn chunk(&self, y: i32) -> Option<&Chunk> {
        usize::try_from(y).ok().and_then(|slot| self.chunks.get(slot))
    }

    pub fn chunk_mut(&mut self, y: i32) -> Option<&mut Chunk> {
        usize::try_from(y).ok().and_then(|slot| self.chunks.get_mut(slot))
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    pub fn chunks_mut(&mut self) -> impl Iterator<Item = &mut Chunk> {
        self.chunks.iter_mut()
    }

    /// Generates every chunk, bottom to top.
    ///
    /// Failures are logged and leave the failing chunk ungenerated; the rest of
    /// the column still loads. Returns the number of chunks that failed.
    pub fn generate(&mut self, generator: &dyn ChunkGenerator) -> usize {
        let mut failed = 0;
        for chunk in &mut self.chunks {
            if let Err(error) = chunk.generate_with(generator) {
                log::error!("{}", error);
                failed += 1;
            }
        }
        failed
    }

    /// Per-tick pass: collects chunks that want a mesh, and settles waiting
    /// chunks that have nothing left to draw.
    pub fn tick(&mut self, waiting: &mut Vec<Point3<i32>>) -> Result<(), ChunkError> {
        for chunk in &mut self.chunks {
            if chunk.settle_if_empty()? {
                continue;
            }
            if chunk.wants_mesh() {
                waiting.push(chunk.position());
            }
        }
        Ok(())
    }

    /// Empties the column for reuse at `position`.
    ///
    /// Returns the coordinates of chunks whose uploaded meshes must be released.
    pub fn reset_to(&mut self, position: Point2<i32>) -> Vec<Point3<i32>> {
        let released = self.release_meshes();
        self.position = position;
        for (slot, chunk) in self.chunks.iter_mut().enumerate() {
            chunk.reset(Point3::new(position.x, slot as i32, position.y));
        }
        released
    }

    /// Drops every chunk's mesh. Returns the coordinates that held uploaded meshes.
    pub fn release_meshes(&mut self) -> Vec<Point3<i32>> {
        self.chunks
            .iter_mut()
            .filter_map(|chunk| chunk.release_mesh().then(|| chunk.position()))
            .collect()
    }
}
