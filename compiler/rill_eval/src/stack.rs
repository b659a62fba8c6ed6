//! Native stack protection for deep evaluation.
//!
//! The depth counter bounds how deep a script may nest; this keeps the
//! native stack from overflowing before that bound is reached.

/// Run `f`, growing the stack first if less than the red zone is left.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    /// Minimum stack space to keep available (128 KiB).
    const RED_ZONE: usize = 128 * 1024;

    /// Stack space to allocate when growing (2 MiB).
    const STACK_PER_RECURSION: usize = 2 * 1024 * 1024;

    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
