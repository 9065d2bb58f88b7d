//! Shared test fixtures for `ignis-*` integration tests: an in-memory
//! `App` module, a discard log writer, and a JSON encoder stub, so
//! individual crates and the `ignis` umbrella crate's scenario tests
//! don't each hand-roll the same test doubles.

mod demo_app;
mod listen_app;
mod log_fixtures;

pub use demo_app::{register_demo_app, DemoApp, DemoAppCounters};
pub use listen_app::{register_demo_listen_app, DemoListenApp, DemoListenAppCounters, LISTENER_POOL_MODULE_ID};
pub use log_fixtures::{register_test_log_modules, TEST_DISCARD_WRITER, TEST_JSON_ENCODER};

/// A root [`ignis_loader::Context`] with no parent and no logger
/// overrides, for tests that need to call `Context::load_by_id` directly
/// without going through a `Supervisor`.
pub fn new_test_context() -> (ignis_loader::Context, ignis_loader::CancelGuard) {
    ignis_loader::new_context(None)
}

/// Produces a unique, valid `ModuleId` string for a test, so tests
/// sharing the process-global module registry don't collide on
/// `register_demo_app`/custom registrations. `tag` should describe the
/// test; the suffix is a per-process monotonic counter, not randomness.
pub fn unique_module_id(tag: &str) -> String {
    use std::sync::atomic::{AtomicUsize, Ordering};
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("ignis-test-support.{tag}.{n}")
}
