//! # Glint Graphics
//!
//! Frame-scoped resource and submission engine for the Glint
//! immediate-mode renderer.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GlobalContext`] / [`ThreadLocalContext`] - shared and per-thread
//!   rendering state with explicit, caller-synchronized sharing
//! - [`mesh`] - immediate-mode recording baked into transient or static
//!   GPU meshes, with optional geometry optimization
//! - [`texture`] - texture lifecycle with asynchronous read-back
//! - [`pass`] - dirty-tracked render pass configuration
//! - [`backend`] - the GPU abstraction, including a command-logging dummy
//!   backend for testing
//!
//! ## Example
//!
//! ```ignore
//! use glint_graphics::{GlobalContext, ThreadLocalContext, MeshFlags};
//!
//! let mut global = GlobalContext::new(backend)?;
//! let mut ctx = ThreadLocalContext::new(4 << 20);
//!
//! ctx.begin_mesh(&global, 0, MeshFlags::MESH_TRANSIENT | MeshFlags::PRIMITIVE_TRIANGLES);
//! ctx.vertex(0.0, 0.0, 0.0);
//! ctx.vertex(1.0, 0.0, 0.0);
//! ctx.vertex(0.0, 1.0, 0.0);
//! ctx.end_mesh(&mut global)?;
//! ctx.submit_mesh(&global, 0);
//!
//! ctx.end_frame();
//! global.frame();
//! ```

pub mod backend;
pub mod context;
pub mod draw;
pub mod error;
pub mod flags;
pub mod layout;
pub mod mesh;
pub mod pass;
pub mod program;
pub mod texture;
pub mod vertex;

// Re-export main types for convenience
pub use backend::dummy::DummyBackend;
pub use backend::GpuBackend;
pub use context::{GlobalContext, ThreadLocalContext};
pub use draw::DrawState;
pub use error::GraphicsError;
pub use flags::{MeshFlags, StateFlags, TextureFlags};
pub use mesh::Mesh;
pub use texture::ReadbackTicket;

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// This should be called before using any graphics functionality.
pub fn init() {
    glint_core::init();
    log::info!("Glint Graphics v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_dummy_backend_name() {
        let backend = DummyBackend::new();
        assert_eq!(backend.name(), "Dummy Backend");
    }
}
