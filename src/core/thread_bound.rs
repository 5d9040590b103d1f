use std::{fmt, marker::PhantomData, rc::Rc};

/// Zero-sized marker that pins its owner to the thread it was created on.
///
/// `ThreadBound` holds a `PhantomData<Rc<()>>`, which makes it neither `Send` nor
/// `Sync`. Embedding it in a struct removes both auto traits from that struct, so
/// moving the owner to another thread, or sharing it with one, is rejected by the
/// compiler instead of being caught by a runtime assertion.
///
/// World state (chunks, palettes, columns and the manager that owns them) carries
/// this marker. Only snapshotted neighbor caches and finished mesh buffers cross
/// the worker boundary.
///
/// # Examples
///
/// A thread-bound value cannot be sent to a worker:
///
/// ```compile_fail
/// use voxel_world::core::ThreadBound;
///
/// struct OwnedByMain {
///     _thread: ThreadBound,
/// }
///
/// let value = OwnedByMain { _thread: ThreadBound::new() };
/// std::thread::spawn(move || drop(value));
/// ```
///
/// Using it on the owning thread is unrestricted:
///
/// ```
/// use voxel_world::core::ThreadBound;
///
/// let marker = ThreadBound::new();
/// let copy = marker;
/// assert_eq!(std::mem::size_of_val(&copy), 0);
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadBound {
    _not_send: PhantomData<Rc<()>>,
}

impl ThreadBound {
    pub const fn new() -> Self {
        ThreadBound {
            _not_send: PhantomData,
        }
    }
}

impl fmt::Debug for ThreadBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ThreadBound")
    }
}
