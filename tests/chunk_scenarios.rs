use cgmath::{Point3, Vector3};
use voxel_world::{
    config::{ChunkDimensions, EngineConfig},
    engine_state::voxels::{
        block::{block_side::BlockSide, BlockState, RenderType},
        chunk::{Chunk, EmptyGenerator, FlatGenerator, MeshState},
        chunk_manager::ChunkManager,
    },
};

fn stone() -> BlockState {
    BlockState::new(1, RenderType::Opaque)
}

fn side_mask(toward: Vector3<i32>) -> u8 {
    let mut mask = 0;
    for (axis, component) in [toward.x, toward.y, toward.z].into_iter().enumerate() {
        if component != 0 {
            mask |= 1 << BlockSide::from_axis(axis, component > 0) as u8;
        }
    }
    mask
}

#[test]
fn stone_chunk_with_hundred_air_blocks() {
    let dims = ChunkDimensions::new(32);
    assert_eq!(dims.volume(), 32768);
    let mut chunk = Chunk::new(Point3::new(0, 0, 0), dims);
    chunk
        .generate_with(&FlatGenerator::new(vec![(64, stone())]))
        .unwrap();

    // 317 is odd, so these 100 indices are distinct.
    let carved: Vec<usize> = (0..100).map(|i| (i * 317) % dims.volume()).collect();
    for index in &carved {
        chunk.set_block(dims.position(*index), BlockState::AIR).unwrap();
    }

    let palette = chunk.palette();
    assert_eq!(palette.unique_entries(), 2);
    assert_eq!(palette.count_of(&stone()), 32668);
    assert_eq!(palette.count_of(&BlockState::AIR), 100);
    assert_eq!(palette.total_references(), dims.volume());
    assert_eq!(chunk.rendered_block_count(), 32668);

    let untouched = (0..dims.volume()).find(|index| !carved.contains(index)).unwrap();
    assert_eq!(chunk.get_block(dims.position(untouched)).unwrap(), stone());
    for index in &carved {
        assert_eq!(chunk.get_block(dims.position(*index)).unwrap(), BlockState::AIR);
    }
}

fn empty_world() -> ChunkManager {
    let config = EngineConfig {
        chunk_side: 8,
        column_height: 1,
        load_radius: 1,
        unload_radius: 2,
        column_loads_per_tick: 16,
        worker_threads: 0,
        ..EngineConfig::default()
    };
    let mut manager = ChunkManager::new(config, Box::new(EmptyGenerator)).unwrap();
    manager.update(Point3::new(4.0, 4.0, 4.0));
    manager
}

#[test]
fn face_edit_marks_uninitialized_neighbor() {
    let mut manager = empty_world();
    let b = Point3::new(1, 0, 0);
    assert_eq!(manager.chunk(b).unwrap().mesh_state(), MeshState::Uninitialized);
    assert_eq!(manager.chunk(b).unwrap().dirty_neighbor_mask(), 0);

    // x = 7 is chunk A's face bordering chunk B.
    manager.set_block(Point3::new(7, 3, 3), stone()).unwrap();

    let chunk_b = manager.chunk(b).unwrap();
    assert_eq!(chunk_b.mesh_state(), MeshState::WaitingForNeighbors);
    assert_eq!(chunk_b.dirty_neighbor_mask(), side_mask(Vector3::new(-1, 0, 0)));
    assert_eq!(
        manager.chunk(Point3::new(0, 0, 0)).unwrap().mesh_state(),
        MeshState::WaitingForNeighbors
    );
    // Chunks that do not sample the edited block stay untouched.
    assert_eq!(
        manager.chunk(Point3::new(0, 0, 1)).unwrap().mesh_state(),
        MeshState::Uninitialized
    );
}

#[test]
fn face_edit_sends_ready_neighbor_back_to_waiting() {
    let mut manager = empty_world();
    let b = Point3::new(1, 0, 0);
    manager.set_block(Point3::new(12, 3, 3), stone()).unwrap();

    let chunk_b = manager.chunk_mut(b).unwrap();
    let job = chunk_b.try_begin_meshing(true).unwrap().unwrap();
    assert!(chunk_b
        .complete_mesh(job, voxel_world::engine_state::rendering::MeshBuffers::new())
        .unwrap());
    assert_eq!(chunk_b.mesh_state(), MeshState::Ready);
    assert_eq!(chunk_b.dirty_neighbor_mask(), 0);

    manager.set_block(Point3::new(7, 3, 3), stone()).unwrap();
    let chunk_b = manager.chunk(b).unwrap();
    assert_eq!(chunk_b.mesh_state(), MeshState::WaitingForNeighbors);
    assert_ne!(chunk_b.dirty_neighbor_mask() & side_mask(Vector3::new(-1, 0, 0)), 0);
    // The previous mesh stays drawable until the new one arrives.
    assert!(chunk_b.is_mesh_ready());
}

#[test]
fn interior_edit_leaves_neighbors_alone() {
    let mut manager = empty_world();
    manager.set_block(Point3::new(3, 3, 3), stone()).unwrap();
    for direction in [Vector3::new(1, 0, 0), Vector3::new(-1, 0, 0), Vector3::new(0, 0, 1)] {
        let neighbor = manager.chunk(Point3::new(0, 0, 0) + direction).unwrap();
        assert_eq!(neighbor.mesh_state(), MeshState::Uninitialized);
        assert_eq!(neighbor.dirty_neighbor_mask(), 0);
    }
}

#[test]
fn corner_edit_reaches_diagonal_neighbor() {
    let mut manager = empty_world();
    // Local (7, 3, 7) touches +x, +z and the (1, 0, 1) diagonal, which is not resident.
    manager.set_block(Point3::new(7, 3, 7), stone()).unwrap();
    let east = manager.chunk(Point3::new(1, 0, 0)).unwrap();
    let south = manager.chunk(Point3::new(0, 0, 1)).unwrap();
    assert_eq!(east.mesh_state(), MeshState::WaitingForNeighbors);
    assert_eq!(south.mesh_state(), MeshState::WaitingForNeighbors);
    assert!(manager.chunk(Point3::new(1, 0, 1)).is_none());
}
