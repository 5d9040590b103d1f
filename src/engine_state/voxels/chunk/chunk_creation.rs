//! # Chunk Creation Module
//!
//! The "generate initial contents" callback a chunk calls when its column loads.
//! Generators write into a palette that has already been reset to air and only
//! see world-space coordinates, so they never depend on the chunk that owns the
//! palette.

use cgmath::Point3;
use noise::{NoiseFn, Perlin};

use crate::{
    config::ChunkDimensions,
    engine_state::voxels::{
        block::{registry::BlockRegistry, BlockState},
        palette::BlockPalette,
    },
    error::PaletteError,
};

/// Threshold above which Perlin noise is considered solid for terrain generation.
pub const PERLIN_POSITIVE_THRESHOLD: f64 = 0.2;
/// Threshold below which Perlin noise is considered solid for terrain generation.
pub const PERLIN_NEGATIVE_THRESHOLD: f64 = -0.2;
/// Scaling factor applied to world coordinates when sampling Perlin noise.
pub const PERLIN_SCALE_FACTOR: f64 = 0.02;

/// Fills a freshly reset palette with a chunk's initial blocks.
///
/// Implementations are shared across every chunk and must be deterministic in
/// `origin`: reloading a chunk has to reproduce the same contents.
pub trait ChunkGenerator: Send + Sync {
    /// # Arguments
    /// * `origin` - World-space position of the chunk's local `(0, 0, 0)`
    /// * `dims` - Geometry of the chunk
    /// * `palette` - Storage to write into, all air on entry
    fn generate(
        &self,
        origin: Point3<i32>,
        dims: ChunkDimensions,
        palette: &mut BlockPalette,
    ) -> Result<(), PaletteError>;
}

/// Leaves every chunk empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyGenerator;

impl ChunkGenerator for EmptyGenerator {
    fn generate(&self, _: Point3<i32>, _: ChunkDimensions, _: &mut BlockPalette) -> Result<(), PaletteError> {
        Ok(())
    }
}

/// Horizontal layers stacked from the bottom of the world.
#[derive(Debug, Clone)]
pub struct FlatGenerator {
    /// `(top, state)` pairs sorted by `top`; a block at world height `y` takes the
    /// state of the first layer with `y < top`. Everything above is air.
    layers: Vec<(i32, BlockState)>,
}

impl FlatGenerator {
    pub fn new(mut layers: Vec<(i32, BlockState)>) -> Self {
        layers.sort_by_key(|(top, _)| *top);
        FlatGenerator { layers }
    }

    /// Stone up to y = 4, dirt up to 7 and one layer of grass.
    pub fn grassland(registry: &BlockRegistry) -> Self {
        let layers = [("stone", 4), ("dirt", 7), ("grass", 8)]
            .into_iter()
            .filter_map(|(name, top)| registry.state(name).map(|state| (top, state)))
            .collect();
        FlatGenerator::new(layers)
    }

    fn state_at(&self, y: i32) -> BlockState {
        self.layers
            .iter()
            .find(|(top, _)| y < *top)
            .map_or(BlockState::AIR, |(_, state)| *state)
    }
}

impl ChunkGenerator for FlatGenerator {
    fn generate(
        &self,
        origin: Point3<i32>,
        dims: ChunkDimensions,
        palette: &mut BlockPalette,
    ) -> Result<(), PaletteError> {
        let side = dims.side();
        let bottom = self.state_at(origin.y);
        let top = self.state_at(origin.y + side as i32 - 1);
        if bottom == top {
            palette.fill(bottom);
            return Ok(());
        }

        for y in 0..side {
            let state = self.state_at(origin.y + y as i32);
            if state == BlockState::AIR {
                continue;
            }
            for z in 0..side {
                for x in 0..side {
                    palette.set_block(dims.index(x, y, z), state)?;
                }
            }
        }
        Ok(())
    }
}

/// Caves and overhangs from thresholded 3-D Perlin noise.
///
/// A block is solid where the noise leaves `[negative, positive]`. Solid blocks
/// with air directly above them become `surface`, the rest `fill`.
#[derive(Debug, Clone)]
pub struct PerlinGenerator {
    perlin: Perlin,
    scale: f64,
    surface: BlockState,
    fill: BlockState,
}

impl PerlinGenerator {
    pub fn new(seed: u32, surface: BlockState, fill: BlockState) -> Self {
        PerlinGenerator {
            perlin: Perlin::new(seed),
            scale: PERLIN_SCALE_FACTOR,
            surface,
            fill,
        }
    }

    /// Grass over stone.
    pub fn with_registry(seed: u32, registry: &BlockRegistry) -> Self {
        PerlinGenerator::new(
            seed,
            registry.state("grass").unwrap_or(BlockState::AIR),
            registry.state("stone").unwrap_or(BlockState::AIR),
        )
    }

    #[must_use]
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    fn is_solid(&self, x: i32, y: i32, z: i32) -> bool {
        let sample = self.perlin.get([
            x as f64 * self.scale,
            y as f64 * self.scale,
            z as f64 * self.scale,
        ]);
        !(PERLIN_NEGATIVE_THRESHOLD..=PERLIN_POSITIVE_THRESHOLD).contains(&sample)
    }
}

impl ChunkGenerator for PerlinGenerator {
    fn generate(
        &self,
        origin: Point3<i32>,
        dims: ChunkDimensions,
        palette: &mut BlockPalette,
    ) -> Result<(), PaletteError> {
        let side = dims.side();
        for z in 0..side {
            for x in 0..side {
                let (wx, wz) = (origin.x + x as i32, origin.z + z as i32);
                let mut above_solid = self.is_solid(wx, origin.y + side as i32, wz);
                for y in (0..side).rev() {
                    let solid = self.is_solid(wx, origin.y + y as i32, wz);
                    if solid {
                        let state = if above_solid { self.fill } else { self.surface };
                        palette.set_block(dims.index(x, y, z), state)?;
                    }
                    above_solid = solid;
                }
            }
        }
        Ok(())
    }
}

/// Sparse random fill, seeded per chunk so reloads are reproducible.
#[derive(Debug, Clone)]
pub struct ScatterGenerator {
    seed: u64,
    density: f64,
    state: BlockState,
}

impl ScatterGenerator {
    /// `density` is the probability of each block being `state`, clamped to `[0, 1]`.
    pub fn new(seed: u64, density: f64, state: BlockState) -> Self {
        ScatterGenerator {
            seed,
            density: density.clamp(0.0, 1.0),
            state,
        }
    }

    fn chunk_seed(&self, origin: Point3<i32>) -> u64 {
        let mut seed = self.seed;
        for coordinate in [origin.x, origin.y, origin.z] {
            seed = seed
                .rotate_left(21)
                .wrapping_mul(0x9E37_79B9_7F4A_7C15)
                ^ coordinate as u32 as u64;
        }
        seed
    }
}

impl ChunkGenerator for ScatterGenerator {
    fn generate(
        &self,
        origin: Point3<i32>,
        dims: ChunkDimensions,
        palette: &mut BlockPalette,
    ) -> Result<(), PaletteError> {
        let mut rng = fastrand::Rng::with_seed(self.chunk_seed(origin));
        for index in 0..dims.volume() {
            if rng.f64() < self.density {
                palette.set_block(index, self.state)?;
            }
        }
        Ok(())
    }
}
