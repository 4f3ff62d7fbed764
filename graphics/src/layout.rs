//! Vertex layouts derived from mesh flags.
//!
//! A mesh's vertex format is fully determined by its three attribute flag
//! bits, so there are exactly eight possible layouts. All of them share a
//! stable field order: position first, then color, normal and texcoord in
//! that order for whichever attributes are present. The eight layouts are
//! computed once and cached.

use crate::flags::MeshFlags;

/// Compact attribute set, the 3-bit code from [`MeshFlags::attribs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribs(u8);

impl VertexAttribs {
    pub const COUNT: usize = 8;

    pub fn from_flags(flags: MeshFlags) -> Self {
        Self(flags.attribs() as u8)
    }

    pub fn from_code(code: usize) -> Self {
        debug_assert!(code < Self::COUNT);
        Self(code as u8)
    }

    /// Index into the layout and default program tables.
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    pub fn has_color(self) -> bool {
        self.0 & 0b001 != 0
    }

    pub fn has_normal(self) -> bool {
        self.0 & 0b010 != 0
    }

    pub fn has_texcoord(self) -> bool {
        self.0 & 0b100 != 0
    }
}

/// Size in bytes of the position field (three f32).
pub const POSITION_SIZE: u16 = 12;

/// Size in bytes of each optional packed attribute.
pub const PACKED_ATTRIB_SIZE: u16 = 4;

/// Byte layout of a single vertex.
///
/// Position is always at offset zero. Optional attributes are packed into
/// four bytes each: color as RGBA8, normal as three unorm8 components, and
/// texcoord as two snorm16 components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
    attribs: VertexAttribs,
    stride: u16,
    color_offset: Option<u16>,
    normal_offset: Option<u16>,
    texcoord_offset: Option<u16>,
}

impl VertexLayout {
    pub fn new(attribs: VertexAttribs) -> Self {
        let mut offset = POSITION_SIZE;
        let mut take = |present: bool| {
            if present {
                let field = offset;
                offset += PACKED_ATTRIB_SIZE;
                Some(field)
            } else {
                None
            }
        };

        let color_offset = take(attribs.has_color());
        let normal_offset = take(attribs.has_normal());
        let texcoord_offset = take(attribs.has_texcoord());

        Self {
            attribs,
            stride: offset,
            color_offset,
            normal_offset,
            texcoord_offset,
        }
    }

    pub fn attribs(&self) -> VertexAttribs {
        self.attribs
    }

    /// Vertex size in bytes.
    pub fn stride(&self) -> u16 {
        self.stride
    }

    pub fn color_offset(&self) -> Option<u16> {
        self.color_offset
    }

    pub fn normal_offset(&self) -> Option<u16> {
        self.normal_offset
    }

    pub fn texcoord_offset(&self) -> Option<u16> {
        self.texcoord_offset
    }
}

/// The eight precomputed vertex layouts, indexed by attribute code.
#[derive(Debug)]
pub struct VertexLayoutCache {
    layouts: [VertexLayout; VertexAttribs::COUNT],
}

impl VertexLayoutCache {
    pub fn new() -> Self {
        let layouts =
            std::array::from_fn(|code| VertexLayout::new(VertexAttribs::from_code(code)));
        Self { layouts }
    }

    pub fn get(&self, attribs: VertexAttribs) -> &VertexLayout {
        &self.layouts[attribs.index()]
    }

    pub fn for_flags(&self, flags: MeshFlags) -> &VertexLayout {
        self.get(VertexAttribs::from_flags(flags))
    }
}

impl Default for VertexLayoutCache {
    fn default() -> Self {
        Self::new()
    }
}
