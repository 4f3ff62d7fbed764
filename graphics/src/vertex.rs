//! Immediate-mode vertex recording.
//!
//! A [`VertexRecorder`] accumulates vertices into a frame-arena pool. The
//! caller sets attribute state (color, normal, texcoord) at any time; each
//! [`push`](VertexRecorder::push) snapshots the current state into one
//! vertex record. Quad meshes are recorded as triangles: every fourth
//! pushed vertex expands the preceding three into two fan triangles, so
//! four inputs produce six stored vertices.

use glint_core::arena::{FrameArena, Pool, Span};

use crate::flags::MeshFlags;
use crate::layout::VertexLayout;

/// Current attribute state, snapshotted on every push.
///
/// Attributes are kept pre-packed in their wire format: color as RGBA8
/// bytes, normal as unorm8 components, texcoord as two snorm16 components.
#[derive(Debug, Clone, Copy)]
pub struct VertexState {
    position: [f32; 3],
    color: [u8; 4],
    normal: [u8; 4],
    texcoord: [u8; 4],
}

impl VertexState {
    pub fn new() -> Self {
        Self {
            position: [0.0; 3],
            color: [0xff; 4],
            normal: [0, 0, 0xff, 0],
            texcoord: [0; 4],
        }
    }

    pub fn set_position(&mut self, x: f32, y: f32, z: f32) {
        self.position = [x, y, z];
    }

    /// Set the color from a `0xRRGGBBAA` word.
    pub fn set_color(&mut self, rgba: u32) {
        self.color = rgba.to_be_bytes();
    }

    /// Set the normal; components are expected in [-1, 1].
    pub fn set_normal(&mut self, x: f32, y: f32, z: f32) {
        let pack = |n: f32| (n.clamp(-1.0, 1.0) * 0.5 + 0.5).mul_add(255.0, 0.5) as u8;
        self.normal = [pack(x), pack(y), pack(z), 0];
    }

    /// Set the texture coordinates; components are expected in [-1, 1].
    pub fn set_texcoord(&mut self, u: f32, v: f32) {
        let pack = |t: f32| (t.clamp(-1.0, 1.0) * 32767.0).round() as i16;
        let u = pack(u).to_le_bytes();
        let v = pack(v).to_le_bytes();
        self.texcoord = [u[0], u[1], v[0], v[1]];
    }

    pub fn position(&self) -> [f32; 3] {
        self.position
    }

    /// Write one vertex record. Only the fields the layout carries are
    /// written; the rest of the state is ignored.
    fn write(&self, layout: &VertexLayout, out: &mut [u8]) {
        out[0..12].copy_from_slice(bytemuck::cast_slice(&self.position));

        if let Some(offset) = layout.color_offset() {
            let offset = usize::from(offset);
            out[offset..offset + 4].copy_from_slice(&self.color);
        }
        if let Some(offset) = layout.normal_offset() {
            let offset = usize::from(offset);
            out[offset..offset + 4].copy_from_slice(&self.normal);
        }
        if let Some(offset) = layout.texcoord_offset() {
            let offset = usize::from(offset);
            out[offset..offset + 4].copy_from_slice(&self.texcoord);
        }
    }
}

impl Default for VertexState {
    fn default() -> Self {
        Self::new()
    }
}

/// Records vertices for one mesh into a frame-arena region.
#[derive(Debug)]
pub struct VertexRecorder {
    pool: Pool,
    layout: VertexLayout,
    state: VertexState,
    vertex_count: u32,
    invocation_count: u32,
    emulate_quads: bool,
}

impl VertexRecorder {
    /// Start recording into `region` with the layout implied by `flags`.
    pub fn new(region: Span, layout: VertexLayout, flags: MeshFlags) -> Self {
        Self {
            pool: Pool::new(region, usize::from(layout.stride()), 4),
            layout,
            state: VertexState::new(),
            vertex_count: 0,
            invocation_count: 0,
            emulate_quads: flags.is_quads(),
        }
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    /// Mutable access to the attribute state fed into the next push.
    pub fn state_mut(&mut self) -> &mut VertexState {
        &mut self.state
    }

    /// Number of vertex records stored (after quad expansion).
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Number of times [`push`](Self::push) was called.
    pub fn invocation_count(&self) -> u32 {
        self.invocation_count
    }

    /// Snapshot the current state into the next vertex record.
    ///
    /// Panics when the recording region is exhausted; the region is sized
    /// from the frame budget up front, so running out is a caller bug.
    pub fn push(&mut self, arena: &mut FrameArena) {
        let size = self.pool.item_size();

        // Fourth quad vertex: duplicate the first and third recorded
        // vertices of this quad so the fan comes out as two triangles
        // (0,1,2) and (0,2,3).
        if self.emulate_quads && (self.invocation_count & 3) == 3 {
            let Some(_) = self.pool.allocate(2) else {
                panic!("vertex recording region exhausted");
            };

            let used = self.pool.used_region();
            let end = used.len();
            let bytes = arena.bytes_mut(used);
            bytes.copy_within(end - 5 * size..end - 4 * size, end - 2 * size);
            bytes.copy_within(end - 3 * size..end - 2 * size, end - size);

            self.vertex_count += 2;
        }

        let Some(span) = self.pool.allocate(1) else {
            panic!("vertex recording region exhausted");
        };
        self.state.write(&self.layout, arena.bytes_mut(span));

        self.vertex_count += 1;
        self.invocation_count += 1;
    }

    /// The recorded vertex bytes.
    pub fn buffer<'a>(&self, arena: &'a FrameArena) -> &'a [u8] {
        arena.bytes(self.pool.used_region())
    }
}
