//! Global and per-thread rendering contexts.
//!
//! [`GlobalContext`] owns the backend and every shared cache (meshes,
//! textures, passes, built-in programs). [`ThreadLocalContext`] owns what
//! a recording thread needs exclusively: its frame arena, matrix stack,
//! draw state and the in-flight mesh recording. Neither type locks
//! anything; cross-thread coordination is the caller's job, and the
//! explicit `&mut` parameters make the sharing discipline visible at every
//! call site.

use std::sync::Arc;

use glint_core::arena::FrameArena;
use glint_core::math::Mat4;
use glint_core::stack::MatrixStack;

use crate::backend::{GpuBackend, ProgramHandle};
use crate::draw::{self, DrawState};
use crate::error::GraphicsError;
use crate::flags::{
    MeshFlags, StateFlags, TextureFlags, DEFAULT_TRANSIENT_BUDGET, MAX_MESHES, MAX_PASSES,
    MAX_TEXTURES,
};
use crate::layout::VertexLayoutCache;
use crate::mesh::{self, MeshCache};
use crate::pass::PassCache;
use crate::program::{DefaultProgramCache, DefaultUniformCache};
use crate::texture::{ReadbackTicket, TextureCache};
use crate::vertex::VertexRecorder;

/// Shared rendering state: the backend plus every resource cache.
pub struct GlobalContext {
    backend: Arc<dyn GpuBackend>,
    layouts: VertexLayoutCache,
    meshes: MeshCache,
    textures: TextureCache,
    passes: PassCache,
    default_programs: DefaultProgramCache,
    default_uniforms: DefaultUniformCache,
    backbuffer: (u16, u16),
}

impl GlobalContext {
    pub fn new(backend: Arc<dyn GpuBackend>) -> Result<Self, GraphicsError> {
        let default_programs = DefaultProgramCache::new(backend.as_ref())?;
        let default_uniforms = DefaultUniformCache::new(backend.as_ref())?;
        let backbuffer = backend.backbuffer_size();
        log::info!(
            "renderer initialized on {} backend, backbuffer {}x{}",
            backend.name(),
            backbuffer.0,
            backbuffer.1
        );

        Ok(Self {
            backend,
            layouts: VertexLayoutCache::new(),
            meshes: MeshCache::new(),
            textures: TextureCache::new(),
            passes: PassCache::new(),
            default_programs,
            default_uniforms,
            backbuffer,
        })
    }

    pub fn backend(&self) -> &dyn GpuBackend {
        self.backend.as_ref()
    }

    /// Finish the frame: flush pass state, expire transient meshes and
    /// advance the backend. Returns the submitted frame's index.
    ///
    /// Call after every recording thread has finished its
    /// [`ThreadLocalContext::end_frame`].
    pub fn frame(&mut self) -> u64 {
        let size = self.backend.backbuffer_size();
        if size != self.backbuffer {
            log::info!("backbuffer resized to {}x{}", size.0, size.1);
            self.backbuffer = size;
            self.passes.mark_resized();
        }

        self.passes.update(self.backend.as_ref());
        self.meshes.invalidate_transient();
        self.backend.frame()
    }

    /// Create or replace a texture. See [`TextureCache::create`].
    pub fn create_texture(
        &mut self,
        id: u16,
        width: u16,
        height: u16,
        stride: u16,
        data: Option<&[u8]>,
        flags: TextureFlags,
    ) -> Result<(), GraphicsError> {
        assert!(usize::from(id) < MAX_TEXTURES, "texture id out of range");
        self.textures
            .create(id, width, height, stride, data, flags, self.backend.as_ref())
    }

    pub fn destroy_texture(&mut self, id: u16) {
        self.textures.destroy(id, self.backend.as_ref());
    }

    /// Schedule an asynchronous read of a texture's contents.
    pub fn read_texture(&mut self, id: u16) -> Result<ReadbackTicket, GraphicsError> {
        self.textures.schedule_read(id, self.backend.as_ref())
    }

    /// Whether a scheduled read has completed.
    pub fn is_texture_readable(&self, id: u16) -> bool {
        self.textures.is_readable(id, self.backend.as_ref())
    }

    /// Copy read texture contents into `dest`. Returns false while the
    /// read is still in flight.
    pub fn retrieve_texture(&self, id: u16, dest: &mut [u8]) -> bool {
        self.textures.resolve(id, dest, self.backend.as_ref())
    }

    /// Create a custom shader program for use with
    /// [`ThreadLocalContext::set_program`].
    pub fn create_program(
        &self,
        vertex_shader: &str,
        fragment_shader: &str,
    ) -> Result<ProgramHandle, GraphicsError> {
        self.backend.create_program(vertex_shader, fragment_shader)
    }

    pub fn destroy_program(&self, program: ProgramHandle) {
        self.backend.destroy_program(program);
    }

    /// Release every GPU resource. Call once, after the last frame.
    pub fn cleanup(&mut self) {
        self.meshes.cleanup(self.backend.as_ref());
        self.textures.cleanup(self.backend.as_ref());
        self.default_programs.cleanup(self.backend.as_ref());
        self.default_uniforms.cleanup(self.backend.as_ref());
    }
}

struct ActiveRecorder {
    id: u16,
    flags: MeshFlags,
    recorder: VertexRecorder,
}

/// Per-thread rendering state.
///
/// The matrix stack is public; everything else is driven through the
/// recording and submission methods.
pub struct ThreadLocalContext {
    frame_arena: FrameArena,
    pub matrix_stack: MatrixStack,
    draw: DrawState,
    recorder: Option<ActiveRecorder>,
    active_pass: u16,
    transient_budget: usize,
}

impl ThreadLocalContext {
    /// Create a thread context with `frame_memory` bytes of recording
    /// space per frame.
    pub fn new(frame_memory: usize) -> Self {
        Self {
            frame_arena: FrameArena::new(frame_memory),
            matrix_stack: MatrixStack::new(),
            draw: DrawState::default(),
            recorder: None,
            active_pass: 0,
            transient_budget: DEFAULT_TRANSIENT_BUDGET as usize,
        }
    }

    /// Cap the frame memory a single transient mesh recording may take.
    pub fn set_transient_budget(&mut self, bytes: usize) {
        self.transient_budget = bytes;
    }

    /// Begin recording mesh `id`. Panics when a recording is already in
    /// progress.
    pub fn begin_mesh(&mut self, global: &GlobalContext, id: u16, flags: MeshFlags) {
        assert!(
            self.recorder.is_none(),
            "mesh recording already in progress"
        );
        assert!(usize::from(id) < MAX_MESHES, "mesh id out of range");
        assert!(
            flags.is_static() != flags.is_transient(),
            "mesh must be either static or transient"
        );

        // Transient recordings get a budgeted slice of the frame arena;
        // static recordings may fill the remainder. Rounding down keeps
        // the allocation inside the arena regardless of cursor alignment.
        let remaining = self.frame_arena.remaining().saturating_sub(3) / 4 * 4;
        let size = if flags.is_transient() {
            remaining.min(self.transient_budget)
        } else {
            remaining
        };
        let Some(region) = self.frame_arena.allocate(size, 4) else {
            panic!("frame arena exhausted at mesh recording start");
        };

        let layout = *global.layouts.for_flags(flags);
        self.recorder = Some(ActiveRecorder {
            id,
            flags,
            recorder: VertexRecorder::new(region, layout, flags),
        });
    }

    fn active_mut(&mut self) -> &mut ActiveRecorder {
        match self.recorder.as_mut() {
            Some(active) => active,
            None => panic!("no mesh recording in progress"),
        }
    }

    /// Set the vertex color attribute, `0xRRGGBBAA`.
    pub fn color(&mut self, rgba: u32) {
        self.active_mut().recorder.state_mut().set_color(rgba);
    }

    pub fn normal(&mut self, x: f32, y: f32, z: f32) {
        self.active_mut().recorder.state_mut().set_normal(x, y, z);
    }

    pub fn texcoord(&mut self, u: f32, v: f32) {
        self.active_mut().recorder.state_mut().set_texcoord(u, v);
    }

    /// Record one vertex at the given position. Unless the mesh was begun
    /// with [`MeshFlags::NO_VERTEX_TRANSFORM`], the position is transformed
    /// by the current matrix stack top at record time.
    pub fn vertex(&mut self, x: f32, y: f32, z: f32) {
        let top = *self.matrix_stack.top();
        let Some(active) = self.recorder.as_mut() else {
            panic!("no mesh recording in progress");
        };

        let [x, y, z] = if active.flags.contains(MeshFlags::NO_VERTEX_TRANSFORM) {
            [x, y, z]
        } else {
            let p = glint_core::math::transform_point(&top, glint_core::math::Vec3::new(x, y, z));
            [p.x, p.y, p.z]
        };

        active.recorder.state_mut().set_position(x, y, z);
        active.recorder.push(&mut self.frame_arena);
    }

    /// Finish the recording and bake it into the mesh cache.
    pub fn end_mesh(&mut self, global: &mut GlobalContext) -> Result<(), GraphicsError> {
        let Some(active) = self.recorder.take() else {
            panic!("no mesh recording in progress");
        };

        let baked = mesh::bake(
            &active.recorder,
            active.flags,
            &self.frame_arena,
            global.backend.as_ref(),
        )?;
        global.meshes.add(active.id, baked, global.backend.as_ref());
        Ok(())
    }

    /// Select the pass that subsequent pass configuration and submissions
    /// target.
    pub fn select_pass(&mut self, id: u16) {
        assert!(usize::from(id) < MAX_PASSES, "pass id out of range");
        self.active_pass = id;
    }

    pub fn touch_pass(&mut self, global: &mut GlobalContext) {
        global.passes.get_mut(self.active_pass).touch();
    }

    pub fn set_pass_clear_color(&mut self, global: &mut GlobalContext, rgba: u32) {
        global.passes.get_mut(self.active_pass).set_clear_color(rgba);
    }

    pub fn set_pass_clear_depth(&mut self, global: &mut GlobalContext, depth: f32) {
        global.passes.get_mut(self.active_pass).set_clear_depth(depth);
    }

    pub fn set_pass_no_clear(&mut self, global: &mut GlobalContext) {
        global.passes.get_mut(self.active_pass).no_clear();
    }

    pub fn set_pass_viewport(
        &mut self,
        global: &mut GlobalContext,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
    ) {
        global
            .passes
            .get_mut(self.active_pass)
            .set_viewport(x, y, width, height);
    }

    pub fn set_pass_framebuffer(
        &mut self,
        global: &mut GlobalContext,
        framebuffer: Option<crate::backend::FramebufferHandle>,
    ) {
        global
            .passes
            .get_mut(self.active_pass)
            .set_framebuffer(framebuffer);
    }

    /// Copy the matrix stack top into the active pass's view matrix.
    pub fn set_pass_view(&mut self, global: &mut GlobalContext) {
        global
            .passes
            .get_mut(self.active_pass)
            .set_view(*self.matrix_stack.top());
    }

    /// Copy the matrix stack top into the active pass's projection matrix.
    pub fn set_pass_projection(&mut self, global: &mut GlobalContext) {
        global
            .passes
            .get_mut(self.active_pass)
            .set_projection(*self.matrix_stack.top());
    }

    /// Replace the draw state flags for the next submission.
    pub fn set_state(&mut self, flags: StateFlags) {
        self.draw.flags = flags;
    }

    /// Restrict the next submission to an element range; `count` of
    /// `u32::MAX` draws to the end.
    pub fn set_range(&mut self, start: u32, count: u32) {
        self.draw.start = start;
        self.draw.count = count;
    }

    pub fn set_scissor(&mut self, x: u16, y: u16, width: u16, height: u16) {
        self.draw.scissor = Some((x, y, width, height));
    }

    /// Bind a texture to stage zero for the next submission.
    pub fn set_texture(&mut self, global: &GlobalContext, id: u16) {
        let Some(texture) = global.textures.get(id) else {
            panic!("binding empty texture slot {id}");
        };
        self.draw.texture = Some((texture.handle, texture.sampler));
    }

    /// Use a custom program for the next submission instead of the
    /// built-in one.
    pub fn set_program(&mut self, program: ProgramHandle) {
        self.draw.program = Some(program);
    }

    /// Submit mesh `id` to the active pass with the accumulated draw
    /// state. The model transform is the matrix stack top at submit time;
    /// the draw state resets afterwards.
    pub fn submit_mesh(&mut self, global: &GlobalContext, id: u16) {
        self.draw.transform = *self.matrix_stack.top();

        let mut encoder = global.backend.create_encoder();
        draw::submit(
            global.meshes.get(id),
            &mut self.draw,
            self.active_pass,
            &global.default_programs,
            &global.default_uniforms,
            encoder.as_mut(),
        );
    }

    /// Finish this thread's frame, recycling its frame memory. Panics if a
    /// mesh recording is still open.
    pub fn end_frame(&mut self) {
        assert!(
            self.recorder.is_none(),
            "frame ended during mesh recording"
        );
        self.frame_arena.swap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;

    fn contexts() -> (Arc<DummyBackend>, GlobalContext, ThreadLocalContext) {
        let backend = Arc::new(DummyBackend::new());
        let global = GlobalContext::new(backend.clone()).unwrap();
        let local = ThreadLocalContext::new(1 << 20);
        (backend, global, local)
    }

    #[test]
    #[should_panic(expected = "mesh recording already in progress")]
    fn test_nested_recording_panics() {
        let (_backend, global, mut local) = contexts();
        let flags = MeshFlags::MESH_TRANSIENT | MeshFlags::PRIMITIVE_TRIANGLES;
        local.begin_mesh(&global, 0, flags);
        local.begin_mesh(&global, 1, flags);
    }

    #[test]
    #[should_panic(expected = "no mesh recording in progress")]
    fn test_vertex_outside_recording_panics() {
        let (_backend, _global, mut local) = contexts();
        local.vertex(0.0, 0.0, 0.0);
    }

    #[test]
    #[should_panic(expected = "either static or transient")]
    fn test_missing_lifetime_flag_panics() {
        let (_backend, global, mut local) = contexts();
        local.begin_mesh(&global, 0, MeshFlags::PRIMITIVE_TRIANGLES);
    }

    #[test]
    #[should_panic(expected = "frame ended during mesh recording")]
    fn test_end_frame_with_open_recording_panics() {
        let (_backend, global, mut local) = contexts();
        local.begin_mesh(
            &global,
            0,
            MeshFlags::MESH_TRANSIENT | MeshFlags::PRIMITIVE_TRIANGLES,
        );
        local.end_frame();
    }

    #[test]
    fn test_vertices_are_transformed_by_stack_top() {
        let (backend, mut global, mut local) = contexts();

        local
            .matrix_stack
            .multiply(&glint_core::math::translation(10.0, 0.0, 0.0));
        local.begin_mesh(
            &global,
            0,
            MeshFlags::MESH_STATIC | MeshFlags::PRIMITIVE_TRIANGLES,
        );
        local.vertex(0.0, 0.0, 0.0);
        local.vertex(1.0, 0.0, 0.0);
        local.vertex(0.0, 1.0, 0.0);
        local.end_mesh(&mut global).unwrap();

        let crate::mesh::Mesh::Static { vertices, .. } = *global.meshes.get(0) else {
            panic!("expected a static mesh");
        };
        let bytes = backend.vertex_buffer_data(vertices).unwrap();
        let mut first = [0.0f32; 3];
        bytemuck::bytes_of_mut(&mut first).copy_from_slice(&bytes[0..12]);
        assert_eq!(first, [10.0, 0.0, 0.0]);
    }

    #[test]
    fn test_no_vertex_transform_flag_skips_stack() {
        let (_backend, mut global, mut local) = contexts();

        local
            .matrix_stack
            .multiply(&glint_core::math::translation(10.0, 0.0, 0.0));
        local.begin_mesh(
            &global,
            0,
            MeshFlags::MESH_TRANSIENT
                | MeshFlags::PRIMITIVE_TRIANGLES
                | MeshFlags::NO_VERTEX_TRANSFORM,
        );
        local.vertex(1.0, 2.0, 3.0);
        local.vertex(0.0, 0.0, 0.0);
        local.vertex(0.0, 1.0, 0.0);
        local.end_mesh(&mut global).unwrap();

        assert!(global.meshes.get(0).is_valid());
    }
}
