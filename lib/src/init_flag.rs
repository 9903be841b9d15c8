//! Atomic flags for one-shot initialization and re-entrancy guards.
//!
//! ```ignore
//! static HEAP_INIT: InitFlag = InitFlag::new();
//!
//! pub fn init() -> Result<(), HeapError> {
//!     if !HEAP_INIT.init_once() {
//!         return Err(HeapError::AlreadyInitialized);
//!     }
//!     // ...
//! }
//! ```

use core::sync::atomic::{AtomicBool, Ordering};

/// "Has X been done?" Monotonic apart from `reset`.
#[repr(transparent)]
pub struct InitFlag {
    flag: AtomicBool,
}

impl InitFlag {
    #[inline]
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    /// Returns `true` only for the call that flipped the flag.
    #[inline]
    pub fn init_once(&self) -> bool {
        !self.flag.swap(true, Ordering::SeqCst)
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// For logging guards and other paths that need no ordering.
    #[inline]
    pub fn is_set_relaxed(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Publish a staged initialization.
    #[inline]
    pub fn mark_set(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[inline]
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl Default for InitFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// "Is X happening right now?" Used to catch recursion in fatal paths.
#[repr(transparent)]
pub struct StateFlag {
    flag: AtomicBool,
}

impl StateFlag {
    #[inline]
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    /// Returns `true` if this call entered the state.
    #[inline]
    pub fn enter(&self) -> bool {
        !self.flag.swap(true, Ordering::SeqCst)
    }

    #[inline]
    pub fn leave(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

impl Default for StateFlag {
    fn default() -> Self {
        Self::new()
    }
}
