//! Per-thread matrix stack.
//!
//! Works like the classic fixed-function model/view stack: a single stack
//! per thread, `push` duplicates the current top, `pop` restores the one
//! below it, and helpers multiply the top in place.

use crate::math::Mat4;

/// Maximum stack depth, excluding the top.
pub const MAX_MATRIX_STACK_DEPTH: usize = 16;

/// Fixed-depth matrix stack with top-of-stack semantics.
///
/// Overflow and underflow are caller bugs and abort.
#[derive(Debug, Clone)]
pub struct MatrixStack {
    top: Mat4,
    size: usize,
    matrices: [Mat4; MAX_MATRIX_STACK_DEPTH],
}

impl MatrixStack {
    /// Create a stack with an identity top and no pushed entries.
    pub fn new() -> Self {
        Self {
            top: Mat4::identity(),
            size: 0,
            matrices: [Mat4::identity(); MAX_MATRIX_STACK_DEPTH],
        }
    }

    /// The current top matrix.
    pub fn top(&self) -> &Mat4 {
        &self.top
    }

    /// Number of pushed entries below the top.
    pub fn depth(&self) -> usize {
        self.size
    }

    /// Push the stack down by one, duplicating the current top.
    pub fn push(&mut self) {
        assert!(self.size < MAX_MATRIX_STACK_DEPTH, "matrix stack overflow");
        self.matrices[self.size] = self.top;
        self.size += 1;
    }

    /// Pop the stack, replacing the top with the matrix below it.
    pub fn pop(&mut self) {
        assert!(self.size > 0, "matrix stack underflow");
        self.size -= 1;
        self.top = self.matrices[self.size];
    }

    /// Replace the top with the identity matrix.
    pub fn load_identity(&mut self) {
        self.top = Mat4::identity();
    }

    /// Multiply the top in place: `top = matrix * top`.
    pub fn multiply(&mut self, matrix: &Mat4) {
        self.top = matrix * self.top;
    }
}

impl Default for MatrixStack {
    fn default() -> Self {
        Self::new()
    }
}
