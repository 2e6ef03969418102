//! Host stack growth for the recursive walk.
//!
//! Script recursion is bounded by [`EvaluatorConfig::max_depth`](super::EvaluatorConfig), but
//! each script call nests several evaluator frames, so the host stack can run out first on
//! small threads. The evaluator entry points wrap themselves in [`ensure_sufficient_stack`],
//! which grows the stack on demand instead.

/// Remaining stack below which a new segment is allocated.
const RED_ZONE: usize = 256 * 1024;

/// Size of each newly allocated segment.
const STACK_PER_RECURSION: usize = 2 * 1024 * 1024;

#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub(super) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub(super) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_host_recursion_grows_the_stack() {
        fn descend(n: u64) -> u64 {
            ensure_sufficient_stack(|| if n == 0 { 0 } else { descend(n - 1) + 1 })
        }

        assert_eq!(descend(100_000), 100_000);
    }
}
