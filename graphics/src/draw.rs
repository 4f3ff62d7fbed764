//! Draw state accumulation and mesh submission.
//!
//! Draw state (flags, transform, texture, element range, scissor,
//! program) accumulates through setters and applies to exactly one
//! submission; submitting resets it to defaults, so state never leaks
//! between draws.

use glint_core::math::Mat4;

use crate::backend::{Encoder, ProgramHandle, RenderState, SamplerFlags, TextureHandle};
use crate::flags::{
    MeshFlags, StateFlags, STATE_BLEND_MASK, STATE_BLEND_SHIFT, STATE_CULL_MASK, STATE_CULL_SHIFT,
    STATE_DEPTH_TEST_MASK, STATE_DEPTH_TEST_SHIFT,
};
use crate::layout::VertexAttribs;
use crate::mesh::Mesh;
use crate::program::{DefaultProgramCache, DefaultUniformCache};

/// State applied to the next submission.
#[derive(Debug, Clone)]
pub struct DrawState {
    /// First element to draw.
    pub start: u32,
    /// Number of elements to draw; `u32::MAX` draws all.
    pub count: u32,
    pub flags: StateFlags,
    pub transform: Mat4,
    pub texture: Option<(TextureHandle, SamplerFlags)>,
    pub program: Option<ProgramHandle>,
    pub scissor: Option<(u16, u16, u16, u16)>,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            start: 0,
            count: u32::MAX,
            flags: StateFlags::DEFAULT,
            transform: Mat4::identity(),
            texture: None,
            program: None,
            scissor: None,
        }
    }
}

const BLEND_TABLE: [RenderState; 8] = [
    RenderState::empty(),
    RenderState::BLEND_ADD,
    RenderState::BLEND_ALPHA,
    RenderState::BLEND_MAX,
    RenderState::BLEND_MIN,
    RenderState::empty(),
    RenderState::empty(),
    RenderState::empty(),
];

const CULL_TABLE: [RenderState; 4] = [
    RenderState::empty(),
    RenderState::CULL_CCW,
    RenderState::CULL_CW,
    RenderState::empty(),
];

const DEPTH_TEST_TABLE: [RenderState; 8] = [
    RenderState::empty(),
    RenderState::DEPTH_TEST_GEQUAL,
    RenderState::DEPTH_TEST_GREATER,
    RenderState::DEPTH_TEST_LEQUAL,
    RenderState::DEPTH_TEST_LESS,
    RenderState::empty(),
    RenderState::empty(),
    RenderState::empty(),
];

/// Translate public draw state flags and mesh topology into the backend
/// render state word.
pub fn render_state(flags: StateFlags, mesh_flags: MeshFlags) -> RenderState {
    let bits = flags.bits();
    let mut state = BLEND_TABLE[((bits & STATE_BLEND_MASK) >> STATE_BLEND_SHIFT) as usize]
        | CULL_TABLE[((bits & STATE_CULL_MASK) >> STATE_CULL_SHIFT) as usize]
        | DEPTH_TEST_TABLE[((bits & STATE_DEPTH_TEST_MASK) >> STATE_DEPTH_TEST_SHIFT) as usize];

    if flags.contains(StateFlags::MSAA) {
        state |= RenderState::MSAA;
    }
    if flags.contains(StateFlags::WRITE_A) {
        state |= RenderState::WRITE_A;
    }
    if flags.contains(StateFlags::WRITE_RGB) {
        state |= RenderState::WRITE_RGB;
    }
    if flags.contains(StateFlags::WRITE_Z) {
        state |= RenderState::WRITE_Z;
    }
    if mesh_flags.is_lines() {
        state |= RenderState::PT_LINES;
    }

    state
}

/// Submit a mesh with the accumulated draw state, then reset the state.
///
/// The mesh must be valid; an explicit program, or a built-in one for the
/// mesh's attributes, must exist. Both are caller bugs otherwise and
/// panic. The element range applies to indexed (static) meshes; transient
/// meshes always draw whole.
pub fn submit(
    mesh: &Mesh,
    state: &mut DrawState,
    view: u16,
    default_programs: &DefaultProgramCache,
    default_uniforms: &DefaultUniformCache,
    encoder: &mut dyn Encoder,
) {
    let mesh_flags = match mesh {
        Mesh::Invalid => panic!("submitting an invalid mesh"),
        Mesh::Transient { buffer, flags, .. } => {
            encoder.set_transient_vertex_buffer(*buffer);
            *flags
        }
        Mesh::Static {
            vertices,
            indices,
            element_count,
            flags,
        } => {
            encoder.set_vertex_buffer(*vertices);
            let count = if state.count == u32::MAX {
                let Some(count) = element_count.checked_sub(state.start) else {
                    panic!(
                        "range start {} beyond mesh element count {element_count}",
                        state.start
                    );
                };
                count
            } else {
                state.count
            };
            encoder.set_index_buffer(*indices, state.start, count);
            *flags
        }
    };

    let program = state
        .program
        .or_else(|| default_programs.get(VertexAttribs::from_flags(mesh_flags)));
    let Some(program) = program else {
        panic!("no program for submitted mesh attributes");
    };

    if let Some((x, y, width, height)) = state.scissor {
        encoder.set_scissor(x, y, width, height);
    }
    if let Some((texture, sampler)) = state.texture {
        encoder.set_texture(0, default_uniforms.color_sampler(), texture, sampler);
    }

    encoder.set_transform(&state.transform);
    encoder.set_state(render_state(state.flags, mesh_flags));
    encoder.submit(view, program);

    *state = DrawState::default();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::{DummyBackend, DummyCommand};
    use crate::backend::{GpuBackend, IndexBufferHandle, VertexBufferHandle};

    fn static_mesh(flags: MeshFlags) -> Mesh {
        Mesh::Static {
            vertices: VertexBufferHandle(100),
            indices: IndexBufferHandle(101),
            element_count: 36,
            flags,
        }
    }

    #[test]
    fn test_default_state_word() {
        let state = render_state(StateFlags::DEFAULT, MeshFlags::PRIMITIVE_TRIANGLES);
        assert_eq!(
            state,
            RenderState::CULL_CW
                | RenderState::DEPTH_TEST_LESS
                | RenderState::MSAA
                | RenderState::WRITE_A
                | RenderState::WRITE_RGB
                | RenderState::WRITE_Z
        );
    }

    #[test]
    fn test_state_word_field_translation() {
        let state = render_state(
            StateFlags::BLEND_ALPHA | StateFlags::CULL_CCW | StateFlags::DEPTH_TEST_LEQUAL,
            MeshFlags::PRIMITIVE_TRIANGLES,
        );
        assert_eq!(
            state,
            RenderState::BLEND_ALPHA | RenderState::CULL_CCW | RenderState::DEPTH_TEST_LEQUAL
        );

        let state = render_state(StateFlags::BLEND_MIN, MeshFlags::PRIMITIVE_TRIANGLES);
        assert_eq!(state, RenderState::BLEND_MIN);
    }

    #[test]
    fn test_line_meshes_set_topology_bit() {
        let state = render_state(StateFlags::DEFAULT, MeshFlags::PRIMITIVE_LINES);
        assert!(state.contains(RenderState::PT_LINES));
    }

    #[test]
    fn test_submit_binds_and_resets() {
        let backend = DummyBackend::new();
        let programs = DefaultProgramCache::new(&backend).unwrap();
        let uniforms = DefaultUniformCache::new(&backend).unwrap();
        backend.clear_commands();

        let mesh = static_mesh(MeshFlags::MESH_STATIC | MeshFlags::PRIMITIVE_TRIANGLES);
        let mut state = DrawState {
            start: 6,
            count: 12,
            texture: Some((TextureHandle(7), SamplerFlags::CLAMP)),
            ..DrawState::default()
        };

        let mut encoder = backend.create_encoder();
        submit(&mesh, &mut state, 3, &programs, &uniforms, encoder.as_mut());
        drop(encoder);

        let commands = backend.commands();
        assert!(commands.contains(&DummyCommand::SetVertexBuffer { handle: 100 }));
        assert!(commands.contains(&DummyCommand::SetIndexBuffer {
            handle: 101,
            start: 6,
            count: 12,
        }));
        assert!(matches!(
            commands.last(),
            Some(DummyCommand::Submit { view: 3, .. })
        ));

        // Accumulated state is consumed by the submission.
        assert_eq!(state.start, 0);
        assert_eq!(state.count, u32::MAX);
        assert!(state.texture.is_none());
    }

    #[test]
    fn test_full_range_binds_all_elements() {
        let backend = DummyBackend::new();
        let programs = DefaultProgramCache::new(&backend).unwrap();
        let uniforms = DefaultUniformCache::new(&backend).unwrap();
        backend.clear_commands();

        let mesh = static_mesh(MeshFlags::MESH_STATIC | MeshFlags::PRIMITIVE_TRIANGLES);
        let mut state = DrawState::default();

        let mut encoder = backend.create_encoder();
        submit(&mesh, &mut state, 0, &programs, &uniforms, encoder.as_mut());
        drop(encoder);

        assert!(backend.commands().contains(&DummyCommand::SetIndexBuffer {
            handle: 101,
            start: 0,
            count: 36,
        }));
    }

    #[test]
    #[should_panic(expected = "beyond mesh element count")]
    fn test_range_start_beyond_mesh_panics() {
        let backend = DummyBackend::new();
        let programs = DefaultProgramCache::new(&backend).unwrap();
        let uniforms = DefaultUniformCache::new(&backend).unwrap();

        let mesh = static_mesh(MeshFlags::MESH_STATIC | MeshFlags::PRIMITIVE_TRIANGLES);
        let mut state = DrawState {
            start: 100,
            ..DrawState::default()
        };

        let mut encoder = backend.create_encoder();
        submit(&mesh, &mut state, 0, &programs, &uniforms, encoder.as_mut());
    }

    #[test]
    #[should_panic(expected = "submitting an invalid mesh")]
    fn test_invalid_mesh_panics() {
        let backend = DummyBackend::new();
        let programs = DefaultProgramCache::new(&backend).unwrap();
        let uniforms = DefaultUniformCache::new(&backend).unwrap();

        let mut encoder = backend.create_encoder();
        submit(
            &Mesh::Invalid,
            &mut DrawState::default(),
            0,
            &programs,
            &uniforms,
            encoder.as_mut(),
        );
    }

    #[test]
    #[should_panic(expected = "no program for submitted mesh attributes")]
    fn test_missing_program_panics() {
        let backend = DummyBackend::new();
        let programs = DefaultProgramCache::new(&backend).unwrap();
        let uniforms = DefaultUniformCache::new(&backend).unwrap();

        // Normal plus texcoord has no built-in program.
        let mesh = static_mesh(
            MeshFlags::MESH_STATIC
                | MeshFlags::PRIMITIVE_TRIANGLES
                | MeshFlags::VERTEX_NORMAL
                | MeshFlags::VERTEX_TEXCOORD,
        );
        let mut encoder = backend.create_encoder();
        submit(
            &mesh,
            &mut DrawState::default(),
            0,
            &programs,
            &uniforms,
            encoder.as_mut(),
        );
    }
}
