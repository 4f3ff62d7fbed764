//! Common utilities for renderer integration tests.
//!
//! Tests run against the dummy backend, which records every backend call
//! into a command log the assertions inspect.

use std::sync::Arc;

use glint_graphics::backend::dummy::{DummyBackend, DummyCommand};
use glint_graphics::{GlobalContext, MeshFlags, ThreadLocalContext};

/// Frame memory per test thread context.
pub const TEST_FRAME_MEMORY: usize = 4 << 20;

/// A full renderer wired to a dummy backend.
pub struct TestContext {
    pub backend: Arc<DummyBackend>,
    pub global: GlobalContext,
    pub local: ThreadLocalContext,
}

impl TestContext {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let backend = Arc::new(DummyBackend::new());
        let global = GlobalContext::new(backend.clone()).expect("context creation");
        // Setup traffic (built-in programs, uniforms) is not interesting
        // to the tests.
        backend.clear_commands();

        Self {
            backend,
            global,
            local: ThreadLocalContext::new(TEST_FRAME_MEMORY),
        }
    }

    /// Record a unit triangle into mesh `id`.
    pub fn record_triangle(&mut self, id: u16, flags: MeshFlags) {
        self.local.begin_mesh(&self.global, id, flags);
        self.local.vertex(0.0, 0.0, 0.0);
        self.local.vertex(1.0, 0.0, 0.0);
        self.local.vertex(0.0, 1.0, 0.0);
        self.local.end_mesh(&mut self.global).expect("mesh bake");
    }

    /// Advance one whole frame (thread then global).
    pub fn next_frame(&mut self) -> u64 {
        self.local.end_frame();
        self.global.frame()
    }

    pub fn commands(&self) -> Vec<DummyCommand> {
        self.backend.commands()
    }

    #[allow(dead_code)]
    pub fn submit_count(&self) -> usize {
        self.commands()
            .iter()
            .filter(|c| matches!(c, DummyCommand::Submit { .. }))
            .count()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
