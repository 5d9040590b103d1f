use std::fmt;

/// Where a chunk is in its mesh lifecycle.
///
/// ```text
/// Uninitialized -> WaitingForNeighbors -> Meshing -> Ready
///       ^                  ^   |            |         |
///       |                  +---+------------+---------+  (edit or neighbor change)
///       +-------------------------------------------------  (no rendered blocks left)
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum MeshState {
    /// No mesh and nothing to mesh.
    #[default]
    Uninitialized,
    /// Contents changed; waits for every resident neighbor to be generated.
    WaitingForNeighbors,
    /// A mesh job is in flight.
    Meshing,
    /// The last dispatched job completed and its mesh is current.
    Ready,
}

impl MeshState {
    pub fn name(self) -> &'static str {
        match self {
            MeshState::Uninitialized => "Uninitialized",
            MeshState::WaitingForNeighbors => "WaitingForNeighbors",
            MeshState::Meshing => "Meshing",
            MeshState::Ready => "Ready",
        }
    }

    /// Whether `self -> to` is an edge of the state machine.
    ///
    /// Self-edges are not listed here; re-entry is handled by the caller.
    pub fn can_transition_to(self, to: MeshState) -> bool {
        use MeshState::*;
        matches!(
            (self, to),
            (_, Uninitialized)
                | (Uninitialized, WaitingForNeighbors)
                | (WaitingForNeighbors, Meshing)
                | (Meshing, Ready)
                | (Meshing, WaitingForNeighbors)
                | (Ready, WaitingForNeighbors)
        )
    }
}

impl fmt::Display for MeshState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
