//! # Engine Configuration
//!
//! All recognized tuning options live in [`EngineConfig`]. A config can be built in
//! code (`EngineConfig::default()` plus struct update syntax) or read from JSON.
//! Missing JSON fields fall back to their defaults.
//!
//! ```json
//! { "chunk_side": 16, "load_radius": 6, "unload_radius": 8, "worker_threads": 2 }
//! ```

use std::path::Path;

use cgmath::Point3;
use serde::{Deserialize, Serialize};

use crate::{engine_state::voxels::spiral::LoadSpiral, error::ConfigError};

/// Largest chunk side the palette index math is tuned for.
pub const MAX_CHUNK_SIDE: usize = 256;

/// Tuning options for the chunk core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Side length of a cubic chunk in blocks. Must be a power of two.
    pub chunk_side: usize,
    /// Number of chunks stacked in one column.
    pub column_height: usize,
    /// Columns within this radius (in columns) of the viewer are loaded.
    pub load_radius: u32,
    /// Columns beyond this radius are unloaded. Must be greater than `load_radius`.
    pub unload_radius: u32,
    /// Mesh requests dequeued per tick.
    pub mesh_jobs_per_tick: usize,
    /// Background mesh workers. Zero meshes synchronously on the calling thread.
    pub worker_threads: usize,
    /// Columns loaded per tick, taken nearest-first from the load spiral.
    pub column_loads_per_tick: usize,
    /// Unloaded columns kept around for reuse.
    pub column_pool_size: usize,
    /// Ticks between palette trim passes. Zero disables trimming.
    pub trim_interval_ticks: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            chunk_side: 32,
            column_height: 8,
            load_radius: 8,
            unload_radius: 10,
            mesh_jobs_per_tick: 8,
            worker_threads: 4,
            column_loads_per_tick: 4,
            column_pool_size: 16,
            trim_interval_ticks: 600,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Checks the cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.chunk_side.is_power_of_two() || self.chunk_side < 2 {
            return Err(ConfigError::Invalid(format!(
                "chunk_side must be a power of two >= 2, got {}",
                self.chunk_side
            )));
        }
        if self.chunk_side > MAX_CHUNK_SIDE {
            return Err(ConfigError::Invalid(format!(
                "chunk_side must not exceed {MAX_CHUNK_SIDE}, got {}",
                self.chunk_side
            )));
        }
        if self.column_height == 0 {
            return Err(ConfigError::Invalid("column_height must be at least 1".into()));
        }
        if self.unload_radius > LoadSpiral::MAX_RADIUS {
            return Err(ConfigError::Invalid(format!(
                "unload_radius must not exceed {}, got {}",
                LoadSpiral::MAX_RADIUS,
                self.unload_radius
            )));
        }
        if self.unload_radius <= self.load_radius {
            return Err(ConfigError::Invalid(format!(
                "unload_radius ({}) must be greater than load_radius ({})",
                self.unload_radius, self.load_radius
            )));
        }
        if self.mesh_jobs_per_tick == 0 {
            return Err(ConfigError::Invalid("mesh_jobs_per_tick must be at least 1".into()));
        }
        if self.column_loads_per_tick == 0 {
            return Err(ConfigError::Invalid(
                "column_loads_per_tick must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Chunk geometry derived from `chunk_side`.
    pub fn dimensions(&self) -> ChunkDimensions {
        ChunkDimensions::new(self.chunk_side)
    }
}

/// Shift-and-mask helpers for a power-of-two chunk side.
///
/// Block positions inside a chunk are flattened x-fastest, then z, then y:
/// `index = x | z << shift | y << 2 * shift`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDimensions {
    side: usize,
    shift: u32,
}

impl ChunkDimensions {
    /// # Panics
    /// Panics if `side` is not a power of two. Configs are validated before this is
    /// reached, so a panic here means the caller skipped validation.
    pub fn new(side: usize) -> Self {
        assert!(side.is_power_of_two(), "chunk side {side} is not a power of two");
        ChunkDimensions {
            side,
            shift: side.trailing_zeros(),
        }
    }

    #[inline]
    pub fn side(&self) -> usize {
        self.side
    }

    #[inline]
    pub fn shift(&self) -> u32 {
        self.shift
    }

    #[inline]
    pub fn volume(&self) -> usize {
        self.side * self.side * self.side
    }

    #[inline]
    fn mask(&self) -> usize {
        self.side - 1
    }

    /// Flattens a local block position.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x | (z << self.shift) | (y << (2 * self.shift))
    }

    /// Inverse of [`ChunkDimensions::index`].
    #[inline]
    pub fn position(&self, index: usize) -> Point3<usize> {
        Point3::new(
            index & self.mask(),
            (index >> (2 * self.shift)) & self.mask(),
            (index >> self.shift) & self.mask(),
        )
    }

    /// Chunk-grid coordinate containing a world block coordinate.
    #[inline]
    pub fn chunk_of(&self, world: i32) -> i32 {
        world >> self.shift
    }

    /// Offset of a world block coordinate inside its chunk.
    #[inline]
    pub fn local_of(&self, world: i32) -> usize {
        (world & self.mask() as i32) as usize
    }

    /// World-space origin of a chunk-grid coordinate.
    #[inline]
    pub fn origin_of(&self, chunk: Point3<i32>) -> Point3<i32> {
        Point3::new(
            chunk.x << self.shift,
            chunk.y << self.shift,
            chunk.z << self.shift,
        )
    }

    /// Chunk-grid coordinate containing a world block position.
    #[inline]
    pub fn chunk_containing(&self, world: Point3<i32>) -> Point3<i32> {
        Point3::new(
            self.chunk_of(world.x),
            self.chunk_of(world.y),
            self.chunk_of(world.z),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn json_overrides_only_named_fields() {
        let config =
            EngineConfig::from_json_str(r#"{ "chunk_side": 16, "worker_threads": 0 }"#).unwrap();
        assert_eq!(config.chunk_side, 16);
        assert_eq!(config.worker_threads, 0);
        assert_eq!(config.column_height, EngineConfig::default().column_height);
    }

    #[test]
    fn rejects_non_power_of_two_side() {
        let err = EngineConfig::from_json_str(r#"{ "chunk_side": 24 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unload_radius_not_above_load_radius() {
        let config = EngineConfig {
            load_radius: 6,
            unload_radius: 6,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_radii_the_load_spiral_cannot_hold() {
        let config = EngineConfig {
            load_radius: LoadSpiral::MAX_RADIUS,
            unload_radius: LoadSpiral::MAX_RADIUS + 1,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let json = r#"{ "load_radius": 70000, "unload_radius": 70001 }"#;
        assert!(EngineConfig::from_json_str(json).is_err());
    }

    #[test]
    fn index_and_position_are_inverse() {
        let dims = ChunkDimensions::new(16);
        for index in [0, 1, 15, 16, 255, 256, 4095] {
            let p = dims.position(index);
            assert_eq!(dims.index(p.x, p.y, p.z), index);
        }
    }

    #[test]
    fn negative_world_coordinates_floor() {
        let dims = ChunkDimensions::new(32);
        assert_eq!(dims.chunk_of(-1), -1);
        assert_eq!(dims.local_of(-1), 31);
        assert_eq!(dims.chunk_of(32), 1);
        assert_eq!(dims.local_of(32), 0);
    }
}
