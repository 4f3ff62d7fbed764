//! Public flag words and limits.
//!
//! All user-facing configuration is packed into small bitflag words so call
//! sites stay terse. The numeric values are part of the public API and are
//! stable across releases.

use bitflags::bitflags;
use static_assertions::const_assert_eq;

/// Maximum number of live meshes.
pub const MAX_MESHES: usize = 4096;

/// Maximum number of render passes.
pub const MAX_PASSES: usize = 48;

/// Maximum number of live textures.
pub const MAX_TEXTURES: usize = 1024;

/// Default per-thread transient geometry budget in bytes.
pub const DEFAULT_TRANSIENT_BUDGET: u32 = 32 << 20;

bitflags! {
    /// Mesh creation flags: lifetime, primitive topology, recorded vertex
    /// attributes, and recording options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MeshFlags: u32 {
        const MESH_STATIC         = 0x0001;
        const MESH_TRANSIENT      = 0x0002;

        const PRIMITIVE_TRIANGLES = 0x0008;
        const PRIMITIVE_QUADS     = 0x0010;
        const PRIMITIVE_LINES     = 0x0020;

        const VERTEX_COLOR        = 0x0040;
        const VERTEX_NORMAL       = 0x0080;
        const VERTEX_TEXCOORD     = 0x0100;

        const NO_VERTEX_TRANSFORM = 0x0800;
        const OPTIMIZE_GEOMETRY   = 0x1000;
    }
}

/// Shift that brings the vertex attribute bits down to a 3-bit code.
pub const VERTEX_ATTRIB_SHIFT: u32 = 6;

/// Mask selecting the vertex attribute bits of [`MeshFlags`].
pub const VERTEX_ATTRIB_MASK: u32 = MeshFlags::VERTEX_COLOR.bits()
    | MeshFlags::VERTEX_NORMAL.bits()
    | MeshFlags::VERTEX_TEXCOORD.bits();

const_assert_eq!(VERTEX_ATTRIB_MASK >> VERTEX_ATTRIB_SHIFT, 0b111);

impl MeshFlags {
    /// The 3-bit vertex attribute code, used to index layout and default
    /// program tables.
    pub fn attribs(self) -> usize {
        ((self.bits() & VERTEX_ATTRIB_MASK) >> VERTEX_ATTRIB_SHIFT) as usize
    }

    pub fn is_static(self) -> bool {
        self.contains(Self::MESH_STATIC)
    }

    pub fn is_transient(self) -> bool {
        self.contains(Self::MESH_TRANSIENT)
    }

    pub fn is_quads(self) -> bool {
        self.contains(Self::PRIMITIVE_QUADS)
    }

    pub fn is_lines(self) -> bool {
        self.contains(Self::PRIMITIVE_LINES)
    }
}

bitflags! {
    /// Texture creation flags: sampler behavior, pixel format, and usage.
    ///
    /// The format occupies a 2-bit field at bit 3, so `R8`, `D24S8` and
    /// `D32F` are field values rather than independent bits; absence of all
    /// three means RGBA8.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureFlags: u32 {
        const NEAREST    = 0x0001;
        const MIRROR     = 0x0002;
        const CLAMP      = 0x0004;

        const R8         = 0x0008;
        const D24S8      = 0x0010;
        const D32F       = 0x0018;

        const TARGET     = 0x0040;
        const READ_BACK  = 0x0080;
        const WRITE_ONLY = 0x0100;
        const BLIT_DST   = 0x0200;
    }
}

/// Mask selecting the texture format field of [`TextureFlags`].
pub const TEXTURE_FORMAT_MASK: u32 =
    TextureFlags::R8.bits() | TextureFlags::D24S8.bits() | TextureFlags::D32F.bits();

/// Symbolic texture and viewport sizes, interpreted as ratios of the
/// backbuffer. A symbolic width or height compares `>= SIZE_EQUAL` except
/// for `SIZE_DOUBLE`, which is tested explicitly.
pub const SIZE_DOUBLE: u16 = 0xffff;
pub const SIZE_EQUAL: u16 = 0xfffa;
pub const SIZE_HALF: u16 = 0xfffb;
pub const SIZE_QUARTER: u16 = 0xfffc;
pub const SIZE_EIGHTH: u16 = 0xfffd;
pub const SIZE_SIXTEENTH: u16 = 0xfffe;

/// True when `size` is one of the symbolic backbuffer-relative sizes.
pub fn is_size_symbolic(size: u16) -> bool {
    size >= SIZE_EQUAL
}

bitflags! {
    /// Draw state flags: blend mode, face culling, depth test, and write
    /// masks. Blend, cull and depth test are small enum fields packed into
    /// bit ranges; the remaining bits are independent.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StateFlags: u32 {
        const BLEND_ADD          = 0x0001;
        const BLEND_ALPHA        = 0x0002;
        const BLEND_MAX          = 0x0003;
        const BLEND_MIN          = 0x0004;

        const CULL_CCW           = 0x0010;
        const CULL_CW            = 0x0020;

        const DEPTH_TEST_GEQUAL  = 0x0040;
        const DEPTH_TEST_GREATER = 0x0080;
        const DEPTH_TEST_LEQUAL  = 0x00c0;
        const DEPTH_TEST_LESS    = 0x0100;

        const MSAA               = 0x0200;
        const WRITE_A            = 0x0400;
        const WRITE_RGB          = 0x0800;
        const WRITE_Z            = 0x1000;

        const DEFAULT = Self::CULL_CW.bits()
            | Self::DEPTH_TEST_LESS.bits()
            | Self::MSAA.bits()
            | Self::WRITE_A.bits()
            | Self::WRITE_RGB.bits()
            | Self::WRITE_Z.bits();
    }
}

/// Shift and width of the blend field of [`StateFlags`].
pub const STATE_BLEND_SHIFT: u32 = 0;
pub const STATE_BLEND_MASK: u32 = 0x0007;

/// Shift and width of the cull field of [`StateFlags`].
pub const STATE_CULL_SHIFT: u32 = 4;
pub const STATE_CULL_MASK: u32 = 0x0030;

/// Shift and width of the depth test field of [`StateFlags`].
pub const STATE_DEPTH_TEST_SHIFT: u32 = 6;
pub const STATE_DEPTH_TEST_MASK: u32 = 0x01c0;

const_assert_eq!(STATE_DEPTH_TEST_MASK >> STATE_DEPTH_TEST_SHIFT, 0b111);
