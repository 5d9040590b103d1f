//! # Core Module
//!
//! Ownership primitives shared by the rest of the crate.
//!
//! ## Key Components
//! - `ThreadBound`: zero-sized marker that makes its owner `!Send` and `!Sync`
//!
//! ## Usage
//! ```rust
//! use voxel_world::core::ThreadBound;
//!
//! struct MainThreadOnly {
//!     value: u32,
//!     _thread: ThreadBound,
//! }
//!
//! let owned = MainThreadOnly { value: 1, _thread: ThreadBound::new() };
//! assert_eq!(owned.value, 1);
//! ```

pub mod thread_bound;

pub use thread_bound::ThreadBound;
