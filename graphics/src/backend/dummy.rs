//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations but records every
//! call into an inspectable command log, so tests can assert on the exact
//! sequence of submissions without GPU hardware. Static buffer payloads
//! and transient writes are retained for content assertions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use glint_core::math::Mat4;

use crate::error::GraphicsError;
use crate::flags::DEFAULT_TRANSIENT_BUDGET;

use super::{
    BackbufferRatio, ClearState, Encoder, FramebufferHandle, GpuBackend, IndexBufferHandle,
    ProgramHandle, RenderState, SamplerFlags, TextureDescriptor, TextureHandle, TransientBuffer,
    TransientBufferHandle, UniformHandle, UniformKind, VertexBufferHandle,
};

/// Frames between a read request and its data becoming retrievable,
/// mimicking a deferred renderer's read-back latency.
const READ_BACK_LATENCY: u64 = 2;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum DummyCommand {
    Frame { index: u64 },
    CreateVertexBuffer { handle: u32, len: usize, stride: u16 },
    DestroyVertexBuffer { handle: u32 },
    CreateIndexBuffer { handle: u32, count: usize },
    DestroyIndexBuffer { handle: u32 },
    AllocTransient { handle: u32, requested: u32, allocated: u32, stride: u16 },
    WriteTransient { handle: u32, len: usize },
    CreateTexture { handle: u32, descriptor: TextureDescriptor, has_data: bool },
    DestroyTexture { handle: u32 },
    Blit { view: u16, dst: u32, src: u32 },
    ReadTexture { handle: u32, ready_frame: u64 },
    CreateProgram { handle: u32, vertex_shader: String, fragment_shader: String },
    DestroyProgram { handle: u32 },
    CreateUniform { handle: u32, name: String, kind: UniformKind },
    DestroyUniform { handle: u32 },
    Touch { view: u16 },
    SetViewClear { view: u16, clear: ClearState },
    SetViewTransform { view: u16, view_matrix: Mat4, proj_matrix: Mat4 },
    SetViewRect { view: u16, x: u16, y: u16, width: u16, height: u16 },
    SetViewRectRatio { view: u16, x: u16, y: u16, ratio: BackbufferRatio },
    SetViewFramebuffer { view: u16, framebuffer: Option<u32> },
    SetState { state: RenderState },
    SetTransform { transform: Mat4 },
    SetVertexBuffer { handle: u32 },
    SetTransientVertexBuffer { handle: u32 },
    SetIndexBuffer { handle: u32, start: u32, count: u32 },
    SetScissor { x: u16, y: u16, width: u16, height: u16 },
    SetTexture { stage: u8, sampler: u32, texture: u32, flags: SamplerFlags },
    Submit { view: u16, program: u32 },
}

/// Dummy GPU backend.
pub struct DummyBackend {
    commands: Mutex<Vec<DummyCommand>>,
    next_handle: AtomicU32,
    frame: AtomicU64,
    backbuffer: Mutex<(u16, u16)>,
    transient_budget: AtomicU32,
    transient_used: AtomicU32,
    vertex_buffers: Mutex<HashMap<u32, Vec<u8>>>,
    index_buffers: Mutex<HashMap<u32, Vec<u16>>>,
    transient_buffers: Mutex<HashMap<u32, Vec<u8>>>,
    pending_reads: Mutex<HashMap<u32, u64>>,
}

impl DummyBackend {
    /// Create a new dummy backend with a 800x600 backbuffer.
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            next_handle: AtomicU32::new(1),
            frame: AtomicU64::new(0),
            backbuffer: Mutex::new((800, 600)),
            transient_budget: AtomicU32::new(DEFAULT_TRANSIENT_BUDGET),
            transient_used: AtomicU32::new(0),
            vertex_buffers: Mutex::new(HashMap::new()),
            index_buffers: Mutex::new(HashMap::new()),
            transient_buffers: Mutex::new(HashMap::new()),
            pending_reads: Mutex::new(HashMap::new()),
        }
    }

    fn next_handle(&self) -> u32 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    fn record(&self, command: DummyCommand) {
        log::trace!("DummyBackend: {command:?}");
        self.commands.lock().unwrap().push(command);
    }

    /// Snapshot of all recorded commands.
    pub fn commands(&self) -> Vec<DummyCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// Drop all recorded commands.
    pub fn clear_commands(&self) {
        self.commands.lock().unwrap().clear();
    }

    /// Change the backbuffer size, simulating a window resize.
    pub fn resize_backbuffer(&self, width: u16, height: u16) {
        *self.backbuffer.lock().unwrap() = (width, height);
    }

    /// Limit the per-frame transient vertex budget in bytes. Used by tests
    /// to exercise under-allocation.
    pub fn set_transient_budget(&self, bytes: u32) {
        self.transient_budget.store(bytes, Ordering::Relaxed);
    }

    /// Contents of a static vertex buffer, if it exists.
    pub fn vertex_buffer_data(&self, handle: VertexBufferHandle) -> Option<Vec<u8>> {
        self.vertex_buffers.lock().unwrap().get(&handle.0).cloned()
    }

    /// Contents of a static index buffer, if it exists.
    pub fn index_buffer_data(&self, handle: IndexBufferHandle) -> Option<Vec<u16>> {
        self.index_buffers.lock().unwrap().get(&handle.0).cloned()
    }

    /// Contents written into a transient allocation, if any.
    pub fn transient_buffer_data(&self, handle: TransientBufferHandle) -> Option<Vec<u8>> {
        self.transient_buffers.lock().unwrap().get(&handle.0).cloned()
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn frame(&self) -> u64 {
        let index = self.frame.fetch_add(1, Ordering::AcqRel);
        self.transient_used.store(0, Ordering::Relaxed);
        self.transient_buffers.lock().unwrap().clear();
        self.record(DummyCommand::Frame { index });
        index
    }

    fn current_frame(&self) -> u64 {
        self.frame.load(Ordering::Acquire)
    }

    fn backbuffer_size(&self) -> (u16, u16) {
        *self.backbuffer.lock().unwrap()
    }

    fn create_vertex_buffer(
        &self,
        data: &[u8],
        stride: u16,
    ) -> Result<VertexBufferHandle, GraphicsError> {
        let handle = self.next_handle();
        self.vertex_buffers.lock().unwrap().insert(handle, data.to_vec());
        self.record(DummyCommand::CreateVertexBuffer {
            handle,
            len: data.len(),
            stride,
        });
        Ok(VertexBufferHandle(handle))
    }

    fn destroy_vertex_buffer(&self, handle: VertexBufferHandle) {
        self.vertex_buffers.lock().unwrap().remove(&handle.0);
        self.record(DummyCommand::DestroyVertexBuffer { handle: handle.0 });
    }

    fn create_index_buffer(&self, indices: &[u16]) -> Result<IndexBufferHandle, GraphicsError> {
        let handle = self.next_handle();
        self.index_buffers.lock().unwrap().insert(handle, indices.to_vec());
        self.record(DummyCommand::CreateIndexBuffer {
            handle,
            count: indices.len(),
        });
        Ok(IndexBufferHandle(handle))
    }

    fn destroy_index_buffer(&self, handle: IndexBufferHandle) {
        self.index_buffers.lock().unwrap().remove(&handle.0);
        self.record(DummyCommand::DestroyIndexBuffer { handle: handle.0 });
    }

    fn alloc_transient_vertices(&self, count: u32, stride: u16) -> TransientBuffer {
        let budget = self.transient_budget.load(Ordering::Relaxed);
        let used = self.transient_used.load(Ordering::Relaxed);
        let remaining = budget.saturating_sub(used);
        let available = if stride == 0 { count } else { remaining / u32::from(stride) };
        let allocated = count.min(available);
        self.transient_used
            .fetch_add(allocated * u32::from(stride), Ordering::Relaxed);

        let handle = self.next_handle();
        self.record(DummyCommand::AllocTransient {
            handle,
            requested: count,
            allocated,
            stride,
        });
        TransientBuffer {
            handle: TransientBufferHandle(handle),
            allocated,
        }
    }

    fn write_transient(&self, buffer: TransientBufferHandle, data: &[u8]) {
        self.transient_buffers
            .lock()
            .unwrap()
            .insert(buffer.0, data.to_vec());
        self.record(DummyCommand::WriteTransient {
            handle: buffer.0,
            len: data.len(),
        });
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> Result<TextureHandle, GraphicsError> {
        let handle = self.next_handle();
        self.record(DummyCommand::CreateTexture {
            handle,
            descriptor: *descriptor,
            has_data: data.is_some(),
        });
        Ok(TextureHandle(handle))
    }

    fn destroy_texture(&self, handle: TextureHandle) {
        self.pending_reads.lock().unwrap().remove(&handle.0);
        self.record(DummyCommand::DestroyTexture { handle: handle.0 });
    }

    fn blit(&self, view: u16, dst: TextureHandle, src: TextureHandle) {
        self.record(DummyCommand::Blit {
            view,
            dst: dst.0,
            src: src.0,
        });
    }

    fn read_texture(&self, handle: TextureHandle) -> u64 {
        let ready_frame = self.current_frame() + READ_BACK_LATENCY;
        self.pending_reads.lock().unwrap().insert(handle.0, ready_frame);
        self.record(DummyCommand::ReadTexture {
            handle: handle.0,
            ready_frame,
        });
        ready_frame
    }

    fn retrieve_texture(&self, handle: TextureHandle, dest: &mut [u8]) -> bool {
        let ready = self.pending_reads.lock().unwrap().get(&handle.0).copied();
        match ready {
            Some(frame) if self.current_frame() >= frame => {
                dest.fill(0);
                true
            }
            _ => false,
        }
    }

    fn create_program(
        &self,
        vertex_shader: &str,
        fragment_shader: &str,
    ) -> Result<ProgramHandle, GraphicsError> {
        let handle = self.next_handle();
        self.record(DummyCommand::CreateProgram {
            handle,
            vertex_shader: vertex_shader.to_string(),
            fragment_shader: fragment_shader.to_string(),
        });
        Ok(ProgramHandle(handle))
    }

    fn destroy_program(&self, handle: ProgramHandle) {
        self.record(DummyCommand::DestroyProgram { handle: handle.0 });
    }

    fn create_uniform(&self, name: &str, kind: UniformKind) -> Result<UniformHandle, GraphicsError> {
        let handle = self.next_handle();
        self.record(DummyCommand::CreateUniform {
            handle,
            name: name.to_string(),
            kind,
        });
        Ok(UniformHandle(handle))
    }

    fn destroy_uniform(&self, handle: UniformHandle) {
        self.record(DummyCommand::DestroyUniform { handle: handle.0 });
    }

    fn touch(&self, view: u16) {
        self.record(DummyCommand::Touch { view });
    }

    fn set_view_clear(&self, view: u16, clear: &ClearState) {
        self.record(DummyCommand::SetViewClear {
            view,
            clear: *clear,
        });
    }

    fn set_view_transform(&self, view: u16, view_matrix: &Mat4, proj_matrix: &Mat4) {
        self.record(DummyCommand::SetViewTransform {
            view,
            view_matrix: *view_matrix,
            proj_matrix: *proj_matrix,
        });
    }

    fn set_view_rect(&self, view: u16, x: u16, y: u16, width: u16, height: u16) {
        self.record(DummyCommand::SetViewRect {
            view,
            x,
            y,
            width,
            height,
        });
    }

    fn set_view_rect_ratio(&self, view: u16, x: u16, y: u16, ratio: BackbufferRatio) {
        self.record(DummyCommand::SetViewRectRatio { view, x, y, ratio });
    }

    fn set_view_framebuffer(&self, view: u16, framebuffer: Option<FramebufferHandle>) {
        self.record(DummyCommand::SetViewFramebuffer {
            view,
            framebuffer: framebuffer.map(|f| f.0),
        });
    }

    fn create_encoder(&self) -> Box<dyn Encoder + '_> {
        Box::new(DummyEncoder { backend: self })
    }
}

/// Encoder that forwards every call into the backend command log.
struct DummyEncoder<'a> {
    backend: &'a DummyBackend,
}

impl Encoder for DummyEncoder<'_> {
    fn set_state(&mut self, state: RenderState) {
        self.backend.record(DummyCommand::SetState { state });
    }

    fn set_transform(&mut self, transform: &Mat4) {
        self.backend.record(DummyCommand::SetTransform {
            transform: *transform,
        });
    }

    fn set_vertex_buffer(&mut self, buffer: VertexBufferHandle) {
        self.backend
            .record(DummyCommand::SetVertexBuffer { handle: buffer.0 });
    }

    fn set_transient_vertex_buffer(&mut self, buffer: TransientBufferHandle) {
        self.backend
            .record(DummyCommand::SetTransientVertexBuffer { handle: buffer.0 });
    }

    fn set_index_buffer(&mut self, buffer: IndexBufferHandle, start: u32, count: u32) {
        self.backend.record(DummyCommand::SetIndexBuffer {
            handle: buffer.0,
            start,
            count,
        });
    }

    fn set_scissor(&mut self, x: u16, y: u16, width: u16, height: u16) {
        self.backend.record(DummyCommand::SetScissor {
            x,
            y,
            width,
            height,
        });
    }

    fn set_texture(
        &mut self,
        stage: u8,
        sampler: UniformHandle,
        texture: TextureHandle,
        flags: SamplerFlags,
    ) {
        self.backend.record(DummyCommand::SetTexture {
            stage,
            sampler: sampler.0,
            texture: texture.0,
            flags,
        });
    }

    fn submit(&mut self, view: u16, program: ProgramHandle) {
        self.backend.record(DummyCommand::Submit {
            view,
            program: program.0,
        });
    }
}
