//! GPU backend abstraction layer.
//!
//! This module provides a trait-based abstraction over the submission API
//! the renderer targets. The model is view-based: frame state (clear,
//! transforms, viewport, framebuffer) is configured per view, draw calls
//! are recorded through an [`Encoder`], and [`GpuBackend::frame`] advances
//! the frame counter and kicks submission.
//!
//! # Available Backends
//!
//! - `dummy` (default): records every call into an inspectable command log,
//!   used for testing and development

pub mod dummy;

use std::sync::Arc;

use bitflags::bitflags;
use glint_core::math::Mat4;

use crate::error::GraphicsError;

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub u32);
    };
}

define_handle!(
    /// Handle to a static GPU vertex buffer.
    VertexBufferHandle
);
define_handle!(
    /// Handle to a static GPU index buffer.
    IndexBufferHandle
);
define_handle!(
    /// Handle to a frame-scoped transient vertex buffer.
    TransientBufferHandle
);
define_handle!(
    /// Handle to a GPU texture.
    TextureHandle
);
define_handle!(
    /// Handle to a framebuffer (render target attachment set).
    FramebufferHandle
);
define_handle!(
    /// Handle to a compiled shader program.
    ProgramHandle
);
define_handle!(
    /// Handle to a shader uniform.
    UniformHandle
);

bitflags! {
    /// Backend render state word, assembled at submission time from the
    /// public draw state flags and the mesh topology.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RenderState: u64 {
        const WRITE_RGB          = 1 << 0;
        const WRITE_A            = 1 << 1;
        const WRITE_Z            = 1 << 2;

        const DEPTH_TEST_LESS    = 1 << 3;
        const DEPTH_TEST_LEQUAL  = 1 << 4;
        const DEPTH_TEST_GREATER = 1 << 5;
        const DEPTH_TEST_GEQUAL  = 1 << 6;

        const CULL_CW            = 1 << 7;
        const CULL_CCW           = 1 << 8;

        const BLEND_ADD          = 1 << 9;
        const BLEND_ALPHA        = 1 << 10;
        const BLEND_MAX          = 1 << 11;
        const BLEND_MIN          = 1 << 12;

        const MSAA               = 1 << 13;

        const PT_LINES           = 1 << 14;
    }
}

bitflags! {
    /// Backend sampler state for a texture binding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SamplerFlags: u32 {
        const POINT  = 1 << 0;
        const MIRROR = 1 << 1;
        const CLAMP  = 1 << 2;
    }
}

/// Texture pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8,
    R8,
    Depth24Stencil8,
    Depth32Float,
}

impl TextureFormat {
    /// Bytes per pixel for CPU-side data uploads.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgba8 => 4,
            Self::R8 => 1,
            Self::Depth24Stencil8 => 4,
            Self::Depth32Float => 4,
        }
    }
}

/// Backbuffer-relative size ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackbufferRatio {
    Double,
    Equal,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
}

impl BackbufferRatio {
    /// Decode a symbolic size constant. Returns `None` for absolute sizes.
    pub fn from_size(size: u16) -> Option<Self> {
        match size {
            crate::flags::SIZE_DOUBLE => Some(Self::Double),
            crate::flags::SIZE_EQUAL => Some(Self::Equal),
            crate::flags::SIZE_HALF => Some(Self::Half),
            crate::flags::SIZE_QUARTER => Some(Self::Quarter),
            crate::flags::SIZE_EIGHTH => Some(Self::Eighth),
            crate::flags::SIZE_SIXTEENTH => Some(Self::Sixteenth),
            _ => None,
        }
    }

    /// Apply the ratio to a backbuffer dimension.
    pub fn apply(self, size: u16) -> u16 {
        match self {
            Self::Double => size.saturating_mul(2),
            Self::Equal => size,
            Self::Half => size / 2,
            Self::Quarter => size / 4,
            Self::Eighth => size / 8,
            Self::Sixteenth => size / 16,
        }
    }
}

/// Texture extent: either absolute pixels or a backbuffer ratio. Ratio
/// textures are recreated by the backend when the backbuffer resizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSize {
    Absolute { width: u16, height: u16 },
    Ratio(BackbufferRatio),
}

/// Texture creation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    pub format: TextureFormat,
    pub size: TextureSize,
    pub sampler: SamplerFlags,
    pub render_target: bool,
    pub read_back: bool,
    pub write_only: bool,
    pub blit_dst: bool,
}

bitflags! {
    /// Which channels a view clear touches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u16 {
        const COLOR   = 1 << 0;
        const DEPTH   = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Per-view clear configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearState {
    pub flags: ClearFlags,
    pub rgba: u32,
    pub depth: f32,
    pub stencil: u8,
}

/// Uniform data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Sampler,
    Vec4,
    Mat4,
}

/// Result of a transient vertex allocation. `allocated` may be less than
/// the requested count when the frame budget runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransientBuffer {
    pub handle: TransientBufferHandle,
    pub allocated: u32,
}

/// GPU backend trait for abstracting the submission API.
///
/// Resource creation and view configuration may be called from any thread;
/// draw recording happens through per-thread [`Encoder`]s.
pub trait GpuBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Advance to the next frame, submitting all recorded work. Returns
    /// the index of the frame that was just submitted.
    fn frame(&self) -> u64;

    /// The current frame index.
    fn current_frame(&self) -> u64;

    /// Current backbuffer size in pixels.
    fn backbuffer_size(&self) -> (u16, u16);

    /// Create a static vertex buffer. `stride` is the vertex size in bytes.
    fn create_vertex_buffer(
        &self,
        data: &[u8],
        stride: u16,
    ) -> Result<VertexBufferHandle, GraphicsError>;

    fn destroy_vertex_buffer(&self, handle: VertexBufferHandle);

    /// Create a static 16-bit index buffer.
    fn create_index_buffer(&self, indices: &[u16]) -> Result<IndexBufferHandle, GraphicsError>;

    fn destroy_index_buffer(&self, handle: IndexBufferHandle);

    /// Allocate transient vertices for this frame. The returned buffer may
    /// hold fewer vertices than requested.
    fn alloc_transient_vertices(&self, count: u32, stride: u16) -> TransientBuffer;

    /// Copy vertex data into a transient allocation.
    fn write_transient(&self, buffer: TransientBufferHandle, data: &[u8]);

    /// Create a texture, optionally with initial pixel data.
    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> Result<TextureHandle, GraphicsError>;

    fn destroy_texture(&self, handle: TextureHandle);

    /// Record a full blit of `src` into `dst` on the given view.
    fn blit(&self, view: u16, dst: TextureHandle, src: TextureHandle);

    /// Start an asynchronous texture read. Returns the frame index at which
    /// the contents become retrievable.
    fn read_texture(&self, handle: TextureHandle) -> u64;

    /// Copy previously read texture contents into `dest`. Returns false if
    /// the read has not completed yet.
    fn retrieve_texture(&self, handle: TextureHandle, dest: &mut [u8]) -> bool;

    /// Create a shader program from named vertex and fragment shaders.
    fn create_program(
        &self,
        vertex_shader: &str,
        fragment_shader: &str,
    ) -> Result<ProgramHandle, GraphicsError>;

    fn destroy_program(&self, handle: ProgramHandle);

    /// Create a named uniform.
    fn create_uniform(&self, name: &str, kind: UniformKind) -> Result<UniformHandle, GraphicsError>;

    fn destroy_uniform(&self, handle: UniformHandle);

    /// Mark a view as active even if nothing is drawn into it.
    fn touch(&self, view: u16);

    fn set_view_clear(&self, view: u16, clear: &ClearState);

    fn set_view_transform(&self, view: u16, view_matrix: &Mat4, proj_matrix: &Mat4);

    fn set_view_rect(&self, view: u16, x: u16, y: u16, width: u16, height: u16);

    fn set_view_rect_ratio(&self, view: u16, x: u16, y: u16, ratio: BackbufferRatio);

    fn set_view_framebuffer(&self, view: u16, framebuffer: Option<FramebufferHandle>);

    /// Begin recording draw calls on the calling thread.
    fn create_encoder(&self) -> Box<dyn Encoder + '_>;
}

/// Per-thread draw call recorder. Bindings accumulate until [`submit`],
/// which consumes them.
///
/// [`submit`]: Encoder::submit
pub trait Encoder {
    fn set_state(&mut self, state: RenderState);

    fn set_transform(&mut self, transform: &Mat4);

    fn set_vertex_buffer(&mut self, buffer: VertexBufferHandle);

    fn set_transient_vertex_buffer(&mut self, buffer: TransientBufferHandle);

    /// Bind an index buffer range. `count == u32::MAX` binds all indices.
    fn set_index_buffer(&mut self, buffer: IndexBufferHandle, start: u32, count: u32);

    fn set_scissor(&mut self, x: u16, y: u16, width: u16, height: u16);

    fn set_texture(
        &mut self,
        stage: u8,
        sampler: UniformHandle,
        texture: TextureHandle,
        flags: SamplerFlags,
    );

    fn submit(&mut self, view: u16, program: ProgramHandle);
}

/// Creates the appropriate backend. Only the dummy backend is built in;
/// callers with a real device wire their own [`GpuBackend`] implementation.
pub fn create_backend() -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    log::info!("Using dummy backend");
    Ok(Arc::new(dummy::DummyBackend::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_from_symbolic_size() {
        assert_eq!(
            BackbufferRatio::from_size(crate::flags::SIZE_HALF),
            Some(BackbufferRatio::Half)
        );
        assert_eq!(BackbufferRatio::from_size(512), None);
    }

    #[test]
    fn test_ratio_apply() {
        assert_eq!(BackbufferRatio::Double.apply(800), 1600);
        assert_eq!(BackbufferRatio::Quarter.apply(800), 200);
        assert_eq!(BackbufferRatio::Equal.apply(800), 800);
    }

    #[test]
    fn test_format_bytes_per_pixel() {
        assert_eq!(TextureFormat::Rgba8.bytes_per_pixel(), 4);
        assert_eq!(TextureFormat::R8.bytes_per_pixel(), 1);
    }
}
