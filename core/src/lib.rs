//! # Glint Core
//!
//! Core crate for the Glint immediate-mode renderer: frame memory
//! allocators, math type aliases, and the per-thread matrix stack.

pub mod arena;
pub mod math;
pub mod stack;

/// Core library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the core library version. Call once at startup.
pub fn init() {
    log::info!("Glint Core v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
