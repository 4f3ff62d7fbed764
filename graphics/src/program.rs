//! Built-in shader programs and uniforms.
//!
//! Submissions that do not name a program fall back to a built-in one
//! matched to the mesh's vertex attributes. Not every attribute
//! combination has a built-in; submitting such a mesh without an explicit
//! program is a caller bug.

use crate::backend::{GpuBackend, ProgramHandle, UniformHandle, UniformKind};
use crate::error::GraphicsError;
use crate::layout::VertexAttribs;

/// Attribute code and shader base name for each built-in program.
const DEFAULT_PROGRAMS: [(usize, &str); 6] = [
    (0b000, "position"),
    (0b001, "position_color"),
    (0b011, "position_color_normal"),
    (0b101, "position_color_texcoord"),
    (0b010, "position_normal"),
    (0b100, "position_texcoord"),
];

/// Built-in programs, indexed by vertex attribute code.
#[derive(Debug)]
pub struct DefaultProgramCache {
    programs: [Option<ProgramHandle>; VertexAttribs::COUNT],
}

impl DefaultProgramCache {
    pub fn new(backend: &dyn GpuBackend) -> Result<Self, GraphicsError> {
        let mut programs = [None; VertexAttribs::COUNT];
        for (code, name) in DEFAULT_PROGRAMS {
            let program =
                backend.create_program(&format!("{name}_vs"), &format!("{name}_fs"))?;
            programs[code] = Some(program);
        }
        Ok(Self { programs })
    }

    /// The built-in program for an attribute combination, if one exists.
    pub fn get(&self, attribs: VertexAttribs) -> Option<ProgramHandle> {
        self.programs[attribs.index()]
    }

    pub fn cleanup(&mut self, backend: &dyn GpuBackend) {
        for program in &mut self.programs {
            if let Some(program) = program.take() {
                backend.destroy_program(program);
            }
        }
    }
}

/// Built-in uniforms shared by the default programs.
#[derive(Debug)]
pub struct DefaultUniformCache {
    color_sampler: UniformHandle,
}

impl DefaultUniformCache {
    pub fn new(backend: &dyn GpuBackend) -> Result<Self, GraphicsError> {
        Ok(Self {
            color_sampler: backend.create_uniform("s_tex_color_rgba", UniformKind::Sampler)?,
        })
    }

    /// Sampler uniform for the color texture at stage zero.
    pub fn color_sampler(&self) -> UniformHandle {
        self.color_sampler
    }

    pub fn cleanup(&mut self, backend: &dyn GpuBackend) {
        backend.destroy_uniform(self.color_sampler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;
    use crate::flags::MeshFlags;

    #[test]
    fn test_builtin_coverage() {
        let backend = DummyBackend::new();
        let cache = DefaultProgramCache::new(&backend).unwrap();

        assert!(cache.get(VertexAttribs::from_flags(MeshFlags::empty())).is_some());
        assert!(cache
            .get(VertexAttribs::from_flags(
                MeshFlags::VERTEX_COLOR | MeshFlags::VERTEX_TEXCOORD
            ))
            .is_some());

        // Normal plus texcoord has no built-in.
        assert!(cache
            .get(VertexAttribs::from_flags(
                MeshFlags::VERTEX_NORMAL | MeshFlags::VERTEX_TEXCOORD
            ))
            .is_none());
        assert!(cache
            .get(VertexAttribs::from_flags(
                MeshFlags::VERTEX_COLOR | MeshFlags::VERTEX_NORMAL | MeshFlags::VERTEX_TEXCOORD
            ))
            .is_none());
    }

    #[test]
    fn test_distinct_programs_per_combination() {
        let backend = DummyBackend::new();
        let cache = DefaultProgramCache::new(&backend).unwrap();

        let a = cache.get(VertexAttribs::from_flags(MeshFlags::empty())).unwrap();
        let b = cache
            .get(VertexAttribs::from_flags(MeshFlags::VERTEX_COLOR))
            .unwrap();
        assert_ne!(a, b);
    }
}
