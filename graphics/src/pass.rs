//! Render pass state and dirty tracking.
//!
//! Each pass maps to one backend view. Pass configuration is sticky across
//! frames; setters only mark the affected piece dirty, and
//! [`Pass::update`] flushes exactly the dirty pieces to the backend once
//! per frame. Backbuffer resizes force re-application of the viewport (for
//! backbuffer-relative viewports) and of the framebuffer binding.

use bitflags::bitflags;
use glint_core::math::Mat4;

use crate::backend::{BackbufferRatio, ClearFlags, ClearState, FramebufferHandle, GpuBackend};
use crate::flags::{is_size_symbolic, MAX_PASSES, SIZE_EQUAL};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct DirtyFlags: u8 {
        const CLEAR       = 0x01;
        const TOUCH       = 0x02;
        const TRANSFORM   = 0x04;
        const RECT        = 0x08;
        const FRAMEBUFFER = 0x10;
    }
}

/// One render pass.
#[derive(Debug, Clone)]
pub struct Pass {
    view_matrix: Mat4,
    proj_matrix: Mat4,
    viewport_x: u16,
    viewport_y: u16,
    viewport_width: u16,
    viewport_height: u16,
    framebuffer: Option<FramebufferHandle>,
    clear: ClearState,
    dirty: DirtyFlags,
}

impl Pass {
    fn new() -> Self {
        Self {
            view_matrix: Mat4::identity(),
            proj_matrix: Mat4::identity(),
            viewport_x: 0,
            viewport_y: 0,
            viewport_width: SIZE_EQUAL,
            viewport_height: SIZE_EQUAL,
            framebuffer: None,
            // Passes clear nothing until configured; the dirty bit still
            // flushes the empty clear state once.
            clear: ClearState {
                flags: ClearFlags::empty(),
                rgba: 0x000000ff,
                depth: 1.0,
                stencil: 0,
            },
            dirty: DirtyFlags::CLEAR,
        }
    }

    /// Mark the pass active for this frame even if nothing is drawn.
    pub fn touch(&mut self) {
        self.dirty |= DirtyFlags::TOUCH;
    }

    pub fn set_view(&mut self, matrix: Mat4) {
        self.view_matrix = matrix;
        self.dirty |= DirtyFlags::TRANSFORM;
    }

    pub fn set_projection(&mut self, matrix: Mat4) {
        self.proj_matrix = matrix;
        self.dirty |= DirtyFlags::TRANSFORM;
    }

    /// Enable color clearing with an `0xRRGGBBAA` value.
    pub fn set_clear_color(&mut self, rgba: u32) {
        self.clear.flags |= ClearFlags::COLOR;
        self.clear.rgba = rgba;
        self.dirty |= DirtyFlags::CLEAR;
    }

    /// Enable depth clearing.
    pub fn set_clear_depth(&mut self, depth: f32) {
        self.clear.flags |= ClearFlags::DEPTH;
        self.clear.depth = depth;
        self.dirty |= DirtyFlags::CLEAR;
    }

    /// Disable all clearing.
    pub fn no_clear(&mut self) {
        self.clear.flags = ClearFlags::empty();
        self.dirty |= DirtyFlags::CLEAR;
    }

    /// Set the viewport. Width and height are pixels or symbolic ratio
    /// constants; a symbolic size must be the same in both dimensions.
    pub fn set_viewport(&mut self, x: u16, y: u16, width: u16, height: u16) {
        if is_size_symbolic(width) || is_size_symbolic(height) {
            assert_eq!(width, height, "symbolic viewport size must be uniform");
        }
        self.viewport_x = x;
        self.viewport_y = y;
        self.viewport_width = width;
        self.viewport_height = height;
        self.dirty |= DirtyFlags::RECT;
    }

    pub fn set_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.framebuffer = framebuffer;
        self.dirty |= DirtyFlags::FRAMEBUFFER;
    }

    /// Flush dirty state for backend view `view`, then clear all dirty
    /// bits. A resize re-applies backbuffer-relative viewports and the
    /// framebuffer binding even when they were not touched this frame.
    pub fn update(&mut self, view: u16, resized: bool, backend: &dyn GpuBackend) {
        if self.dirty.contains(DirtyFlags::TOUCH) {
            backend.touch(view);
        }

        if self.dirty.contains(DirtyFlags::CLEAR) {
            backend.set_view_clear(view, &self.clear);
        }

        if self.dirty.contains(DirtyFlags::TRANSFORM) {
            backend.set_view_transform(view, &self.view_matrix, &self.proj_matrix);
        }

        if self.dirty.contains(DirtyFlags::RECT)
            || (resized && is_size_symbolic(self.viewport_width))
        {
            match BackbufferRatio::from_size(self.viewport_width) {
                Some(ratio) => {
                    backend.set_view_rect_ratio(view, self.viewport_x, self.viewport_y, ratio)
                }
                None => backend.set_view_rect(
                    view,
                    self.viewport_x,
                    self.viewport_y,
                    self.viewport_width,
                    self.viewport_height,
                ),
            }
        }

        if self.dirty.contains(DirtyFlags::FRAMEBUFFER) || resized {
            backend.set_view_framebuffer(view, self.framebuffer);
        }

        self.dirty = DirtyFlags::empty();
    }
}

/// All render passes, flushed together once per frame.
#[derive(Debug)]
pub struct PassCache {
    passes: Vec<Pass>,
    backbuffer_size_changed: bool,
}

impl PassCache {
    pub fn new() -> Self {
        Self {
            passes: vec![Pass::new(); MAX_PASSES],
            // Forces the initial viewport and framebuffer application.
            backbuffer_size_changed: true,
        }
    }

    pub fn get_mut(&mut self, id: u16) -> &mut Pass {
        &mut self.passes[usize::from(id)]
    }

    /// Record that the backbuffer changed size since the last update.
    pub fn mark_resized(&mut self) {
        self.backbuffer_size_changed = true;
    }

    /// Flush every pass's dirty state to the backend.
    pub fn update(&mut self, backend: &dyn GpuBackend) {
        let resized = self.backbuffer_size_changed;
        for (view, pass) in self.passes.iter_mut().enumerate() {
            pass.update(view as u16, resized, backend);
        }
        self.backbuffer_size_changed = false;
    }
}

impl Default for PassCache {
    fn default() -> Self {
        Self::new()
    }
}
