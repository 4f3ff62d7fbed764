//! Texture lifecycle and asynchronous read-back.
//!
//! Textures are created from a flag word that packs sampler behavior,
//! pixel format and usage. Sizes are either absolute pixels or symbolic
//! backbuffer ratios; ratio textures track window resizes inside the
//! backend and therefore reject initial pixel data.
//!
//! Read-back is asynchronous: scheduling a read returns a ticket carrying
//! the frame at which the data becomes retrievable, and the caller polls
//! for completion. Render targets cannot be read directly, so a blit
//! companion texture is created lazily and the read goes through it.

use crate::backend::{
    BackbufferRatio, GpuBackend, SamplerFlags, TextureDescriptor, TextureFormat, TextureHandle,
    TextureSize,
};
use crate::error::GraphicsError;
use crate::flags::{is_size_symbolic, TextureFlags, MAX_PASSES, MAX_TEXTURES, TEXTURE_FORMAT_MASK};

/// View reserved for read-back blits, kept out of the way of user passes.
pub const BLIT_PASS: u16 = (MAX_PASSES - 1) as u16;

/// A live texture slot.
#[derive(Debug, Clone, Copy)]
pub struct Texture {
    pub handle: TextureHandle,
    pub format: TextureFormat,
    pub size: TextureSize,
    pub sampler: SamplerFlags,
    pub flags: TextureFlags,
    /// Lazily created companion a render target is blitted into before
    /// reading.
    blit: Option<TextureHandle>,
    /// Frame at which the last scheduled read completes.
    read_frame: u64,
}

/// Receipt for a scheduled texture read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadbackTicket {
    pub id: u16,
    /// Frame index at which the contents become retrievable.
    pub frame: u64,
}

fn decode_format(flags: TextureFlags) -> TextureFormat {
    match flags.bits() & TEXTURE_FORMAT_MASK {
        x if x == TextureFlags::R8.bits() => TextureFormat::R8,
        x if x == TextureFlags::D24S8.bits() => TextureFormat::Depth24Stencil8,
        x if x == TextureFlags::D32F.bits() => TextureFormat::Depth32Float,
        _ => TextureFormat::Rgba8,
    }
}

fn decode_sampler(flags: TextureFlags) -> SamplerFlags {
    let mut sampler = SamplerFlags::empty();
    if flags.contains(TextureFlags::NEAREST) {
        sampler |= SamplerFlags::POINT;
    }
    if flags.contains(TextureFlags::MIRROR) {
        sampler |= SamplerFlags::MIRROR;
    }
    if flags.contains(TextureFlags::CLAMP) {
        sampler |= SamplerFlags::CLAMP;
    }
    sampler
}

/// Fixed-capacity table of textures, indexed by user-chosen id.
#[derive(Debug)]
pub struct TextureCache {
    slots: Vec<Option<Texture>>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self {
            slots: vec![None; MAX_TEXTURES],
        }
    }

    pub fn get(&self, id: u16) -> Option<&Texture> {
        self.slots[usize::from(id)].as_ref()
    }

    /// Create a texture in a slot, destroying whatever occupied it.
    ///
    /// `width` and `height` are pixels or symbolic ratio constants; a
    /// symbolic size must be the same in both dimensions. `stride` is the
    /// source row pitch in bytes, zero meaning tightly packed; data with a
    /// wider pitch is repacked row by row before upload.
    pub fn create(
        &mut self,
        id: u16,
        width: u16,
        height: u16,
        stride: u16,
        data: Option<&[u8]>,
        flags: TextureFlags,
        backend: &dyn GpuBackend,
    ) -> Result<(), GraphicsError> {
        let format = decode_format(flags);
        let sampler = decode_sampler(flags);

        let size = if is_size_symbolic(width) {
            assert_eq!(width, height, "symbolic texture size must be uniform");
            // from_size covers every symbolic constant the assert lets
            // through.
            let Some(ratio) = BackbufferRatio::from_size(width) else {
                return Err(GraphicsError::InvalidParameter(format!(
                    "unknown symbolic texture size {width:#x}"
                )));
            };
            TextureSize::Ratio(ratio)
        } else {
            TextureSize::Absolute { width, height }
        };

        let mut data = data;
        if matches!(size, TextureSize::Ratio(_)) && data.is_some() {
            log::warn!("ignoring pixel data for backbuffer-relative texture {id}");
            data = None;
        }

        // Repack rows when the source pitch differs from the tight pitch.
        let tight_pitch = usize::from(width) * format.bytes_per_pixel() as usize;
        let repacked: Option<Vec<u8>>;
        let upload: Option<&[u8]> = match data {
            Some(bytes) if stride != 0 && usize::from(stride) != tight_pitch => {
                let mut packed = Vec::with_capacity(tight_pitch * usize::from(height));
                for row in 0..usize::from(height) {
                    let start = row * usize::from(stride);
                    packed.extend_from_slice(&bytes[start..start + tight_pitch]);
                }
                repacked = Some(packed);
                repacked.as_deref()
            }
            other => other,
        };

        let descriptor = TextureDescriptor {
            format,
            size,
            sampler,
            render_target: flags.contains(TextureFlags::TARGET),
            read_back: flags.contains(TextureFlags::READ_BACK),
            write_only: flags.contains(TextureFlags::WRITE_ONLY),
            blit_dst: flags.contains(TextureFlags::BLIT_DST),
        };
        let handle = backend.create_texture(&descriptor, upload)?;

        self.destroy(id, backend);
        self.slots[usize::from(id)] = Some(Texture {
            handle,
            format,
            size,
            sampler,
            flags,
            blit: None,
            read_frame: u64::MAX,
        });
        Ok(())
    }

    /// Destroy the texture in a slot, including its blit companion.
    pub fn destroy(&mut self, id: u16, backend: &dyn GpuBackend) {
        if let Some(texture) = self.slots[usize::from(id)].take() {
            if let Some(blit) = texture.blit {
                backend.destroy_texture(blit);
            }
            backend.destroy_texture(texture.handle);
        }
    }

    /// Schedule an asynchronous read of a texture's contents.
    ///
    /// The texture must have been created with
    /// [`TextureFlags::READ_BACK`]. Render targets are blitted into a
    /// companion texture first; the companion is created on the first read
    /// and reused afterwards.
    pub fn schedule_read(
        &mut self,
        id: u16,
        backend: &dyn GpuBackend,
    ) -> Result<ReadbackTicket, GraphicsError> {
        let slot = usize::from(id);
        let Some(texture) = self.slots[slot].as_mut() else {
            return Err(GraphicsError::InvalidParameter(format!(
                "reading from empty texture slot {id}"
            )));
        };
        assert!(
            texture.flags.contains(TextureFlags::READ_BACK),
            "texture {id} was not created with read-back"
        );

        let source = if texture.flags.contains(TextureFlags::TARGET) {
            let blit = match texture.blit {
                Some(blit) => blit,
                None => {
                    let descriptor = TextureDescriptor {
                        format: texture.format,
                        size: texture.size,
                        sampler: SamplerFlags::POINT | SamplerFlags::CLAMP,
                        render_target: false,
                        read_back: true,
                        write_only: false,
                        blit_dst: true,
                    };
                    let blit = backend.create_texture(&descriptor, None)?;
                    texture.blit = Some(blit);
                    blit
                }
            };
            backend.blit(BLIT_PASS, blit, texture.handle);
            blit
        } else {
            texture.handle
        };

        texture.read_frame = backend.read_texture(source);
        Ok(ReadbackTicket {
            id,
            frame: texture.read_frame,
        })
    }

    /// Whether a previously scheduled read has completed.
    pub fn is_readable(&self, id: u16, backend: &dyn GpuBackend) -> bool {
        self.get(id)
            .is_some_and(|t| backend.current_frame() >= t.read_frame)
    }

    /// Copy read texture contents into `dest`. Returns false while the
    /// read is still in flight.
    pub fn resolve(&self, id: u16, dest: &mut [u8], backend: &dyn GpuBackend) -> bool {
        let Some(texture) = self.get(id) else {
            return false;
        };
        let source = texture.blit.unwrap_or(texture.handle);
        backend.retrieve_texture(source, dest)
    }

    /// Destroy every texture. Called on shutdown.
    pub fn cleanup(&mut self, backend: &dyn GpuBackend) {
        for id in 0..MAX_TEXTURES as u16 {
            self.destroy(id, backend);
        }
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new()
    }
}
