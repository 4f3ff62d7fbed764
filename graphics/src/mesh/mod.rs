//! Mesh baking and the mesh cache.
//!
//! Recorded vertex streams are baked into one of two GPU representations.
//! Transient meshes live in frame-scoped backend memory and expire at the
//! frame boundary; static meshes get welded into an indexed form,
//! optionally optimized, and uploaded into persistent buffers.

pub mod optimize;

use glint_core::arena::FrameArena;

use crate::backend::{GpuBackend, IndexBufferHandle, TransientBufferHandle, VertexBufferHandle};
use crate::error::GraphicsError;
use crate::flags::{MeshFlags, MAX_MESHES};
use crate::vertex::VertexRecorder;

/// A baked mesh slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mesh {
    /// Empty slot, or a transient mesh whose frame has passed.
    Invalid,
    /// Frame-scoped vertex-only mesh.
    Transient {
        buffer: TransientBufferHandle,
        element_count: u32,
        flags: MeshFlags,
    },
    /// Persistent indexed mesh.
    Static {
        vertices: VertexBufferHandle,
        indices: IndexBufferHandle,
        element_count: u32,
        flags: MeshFlags,
    },
}

impl Mesh {
    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Invalid)
    }

    /// Number of elements submitted for this mesh: indices for static
    /// meshes, vertices for transient ones.
    pub fn element_count(&self) -> u32 {
        match self {
            Self::Invalid => 0,
            Self::Transient { element_count, .. } | Self::Static { element_count, .. } => {
                *element_count
            }
        }
    }

    pub fn flags(&self) -> Option<MeshFlags> {
        match self {
            Self::Invalid => None,
            Self::Transient { flags, .. } | Self::Static { flags, .. } => Some(*flags),
        }
    }

    /// Release any persistent GPU resources.
    pub fn destroy(&self, backend: &dyn GpuBackend) {
        if let Self::Static {
            vertices, indices, ..
        } = self
        {
            backend.destroy_vertex_buffer(*vertices);
            backend.destroy_index_buffer(*indices);
        }
    }
}

/// Bake a finished recording into a mesh.
///
/// Static baking welds byte-identical vertices into an indexed mesh and,
/// when [`MeshFlags::OPTIMIZE_GEOMETRY`] is set on a non-line mesh, runs
/// the cache, overdraw and fetch optimizers before uploading. Indices are
/// 16-bit, so the recording must stay under 65536 vertices; exceeding that
/// is a caller bug and panics before any GPU resource is created.
///
/// A transient bake that does not get its full vertex allocation from the
/// backend's frame budget logs a warning and produces [`Mesh::Invalid`].
pub fn bake(
    recorder: &VertexRecorder,
    flags: MeshFlags,
    arena: &FrameArena,
    backend: &dyn GpuBackend,
) -> Result<Mesh, GraphicsError> {
    let vertex_count = recorder.vertex_count();
    if vertex_count == 0 {
        log::warn!("baking mesh with no vertices");
        return Ok(Mesh::Invalid);
    }
    assert!(
        vertex_count < 65536,
        "mesh has {vertex_count} vertices, exceeding the 16-bit index range"
    );

    let stride = recorder.layout().stride();
    let bytes = recorder.buffer(arena);

    if flags.is_transient() {
        let transient = backend.alloc_transient_vertices(vertex_count, stride);
        if transient.allocated != vertex_count {
            log::warn!(
                "transient geometry budget exhausted ({} of {} vertices), dropping mesh",
                transient.allocated,
                vertex_count
            );
            return Ok(Mesh::Invalid);
        }
        backend.write_transient(transient.handle, bytes);

        return Ok(Mesh::Transient {
            buffer: transient.handle,
            element_count: vertex_count,
            flags,
        });
    }

    let stride = usize::from(stride);
    let (unique_count, remap) = optimize::generate_vertex_remap(bytes, stride);

    // The recording is a flat stream, so the remap table is its index
    // buffer.
    let mut vertices = optimize::remap_vertex_buffer(bytes, stride, unique_count, &remap);
    let mut indices = remap;

    if flags.contains(MeshFlags::OPTIMIZE_GEOMETRY) && !flags.is_lines() {
        indices = optimize::optimize_vertex_cache(&indices, unique_count);
        indices = optimize::optimize_overdraw(&indices, &vertices, stride);
        (vertices, indices) = optimize::optimize_vertex_fetch(&vertices, stride, &indices);
    }

    let indices: Vec<u16> = indices.iter().map(|&i| i as u16).collect();

    let vertex_buffer = backend.create_vertex_buffer(&vertices, stride as u16)?;
    let index_buffer = backend.create_index_buffer(&indices)?;

    Ok(Mesh::Static {
        vertices: vertex_buffer,
        indices: index_buffer,
        element_count: indices.len() as u32,
        flags,
    })
}

/// Fixed-capacity table of baked meshes, indexed by user-chosen id.
#[derive(Debug)]
pub struct MeshCache {
    slots: Vec<Mesh>,
}

impl MeshCache {
    pub fn new() -> Self {
        Self {
            slots: vec![Mesh::Invalid; MAX_MESHES],
        }
    }

    pub fn get(&self, id: u16) -> &Mesh {
        &self.slots[usize::from(id)]
    }

    /// Install a mesh in a slot, destroying whatever occupied it.
    pub fn add(&mut self, id: u16, mesh: Mesh, backend: &dyn GpuBackend) {
        let slot = &mut self.slots[usize::from(id)];
        slot.destroy(backend);
        *slot = mesh;
    }

    /// Drop all transient meshes. Their backend allocations expire with
    /// the frame, so the slots must not survive into the next one.
    pub fn invalidate_transient(&mut self) {
        for slot in &mut self.slots {
            if matches!(slot, Mesh::Transient { .. }) {
                *slot = Mesh::Invalid;
            }
        }
    }

    /// Destroy every mesh. Called on shutdown.
    pub fn cleanup(&mut self, backend: &dyn GpuBackend) {
        for slot in &mut self.slots {
            slot.destroy(backend);
            *slot = Mesh::Invalid;
        }
    }
}

impl Default for MeshCache {
    fn default() -> Self {
        Self::new()
    }
}
