//! Frame memory allocators.
//!
//! This module provides the linear allocators backing per-frame transient
//! data: [`Arena`] (a bump allocator over an owned byte buffer),
//! [`FrameArena`] (a double-buffered arena whose halves swap at frame
//! boundaries), and [`Pool`] (a fixed-item-size view over an arena span).
//!
//! Allocations are handed out as [`Span`]s, offset/length records into the
//! arena's storage, rather than raw references. This keeps the borrow
//! checker out of the way of interleaved allocation and writing: a caller
//! allocates spans up front and resolves them to slices via
//! [`Arena::bytes`] / [`Arena::bytes_mut`] only while actually reading or
//! writing.
//!
//! None of the allocators zero memory on [`restart`](Arena::restart);
//! callers must not assume zero-initialized content.

/// Maximum scalar alignment, used when an allocation passes alignment zero.
pub const MAX_SCALAR_ALIGNMENT: usize = 16;

/// An offset/length record into an arena's storage.
///
/// Spans are plain values; they stay valid across further allocations and
/// only become meaningless once the owning arena restarts or swaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    offset: usize,
    len: usize,
}

impl Span {
    /// An empty span, denoting allocation failure.
    pub const EMPTY: Span = Span { offset: 0, len: 0 };

    /// Byte offset into the arena's storage.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the span is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The sub-span of `len` bytes starting `at` bytes into this span.
    pub fn slice(&self, at: usize, len: usize) -> Span {
        assert!(at + len <= self.len, "sub-span out of range");
        Span {
            offset: self.offset + at,
            len,
        }
    }
}

fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}

fn resolve_alignment(alignment: usize) -> usize {
    let alignment = if alignment == 0 {
        MAX_SCALAR_ALIGNMENT
    } else {
        alignment
    };
    assert!(
        alignment.is_power_of_two(),
        "alignment {alignment} not a power of two"
    );
    alignment
}

/// Linear bump allocator over an owned byte buffer.
///
/// The cursor only grows between [`restart`](Self::restart) calls. Every
/// allocation is either fully inside the buffer or fails (`None`), never
/// partial.
#[derive(Debug)]
pub struct Arena {
    memory: Box<[u8]>,
    offset: usize,
}

impl Arena {
    /// Create an arena owning `capacity` bytes of zeroed storage.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "empty arena buffer");
        Self {
            memory: vec![0; capacity].into_boxed_slice(),
            offset: 0,
        }
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.memory.len()
    }

    /// Bytes still available from the current cursor (ignoring alignment
    /// padding a future allocation may need).
    pub fn remaining(&self) -> usize {
        self.memory.len() - self.offset
    }

    /// Rewind the cursor to zero. Memory contents are left as-is.
    pub fn restart(&mut self) {
        self.offset = 0;
    }

    /// Allocate `size` bytes at the given alignment.
    ///
    /// Alignment zero defaults to [`MAX_SCALAR_ALIGNMENT`]; otherwise it
    /// must be a power of two. Returns `None` when the request does not
    /// fit, leaving prior allocations untouched.
    pub fn allocate(&mut self, size: usize, alignment: usize) -> Option<Span> {
        let alignment = resolve_alignment(alignment);
        let head = align_up(self.offset, alignment);

        if head + size <= self.memory.len() {
            self.offset = head + size;
            Some(Span { offset: head, len: size })
        } else {
            None
        }
    }

    /// Resolve a span to a shared slice.
    pub fn bytes(&self, span: Span) -> &[u8] {
        &self.memory[span.offset..span.offset + span.len]
    }

    /// Resolve a span to a mutable slice.
    pub fn bytes_mut(&mut self, span: Span) -> &mut [u8] {
        &mut self.memory[span.offset..span.offset + span.len]
    }
}

/// Double-buffered frame arena.
///
/// Owns twice the per-frame capacity; one half is live for the current
/// frame while the other retains the previous frame's data until the
/// backend has finished consuming it. [`swap`](Self::swap) flips the live
/// half at the frame boundary and restarts the cursor.
#[derive(Debug)]
pub struct FrameArena {
    memory: Box<[u8]>,
    half_len: usize,
    back_half: bool,
    offset: usize,
}

impl FrameArena {
    /// Create a frame arena with `frame_capacity` bytes per half.
    pub fn new(frame_capacity: usize) -> Self {
        assert!(frame_capacity > 0, "empty arena buffer");
        Self {
            memory: vec![0; frame_capacity * 2].into_boxed_slice(),
            half_len: frame_capacity,
            back_half: false,
            offset: 0,
        }
    }

    /// Per-frame capacity in bytes (one half).
    pub fn frame_capacity(&self) -> usize {
        self.half_len
    }

    /// Bytes still available in the live half.
    pub fn remaining(&self) -> usize {
        self.half_len - self.offset
    }

    /// Rewind the live half's cursor without switching halves.
    pub fn restart(&mut self) {
        self.offset = 0;
    }

    /// Flip to the other half and restart. Call once per frame boundary,
    /// after the backend has been handed the frame.
    pub fn swap(&mut self) {
        self.back_half = !self.back_half;
        self.offset = 0;
    }

    fn base(&self) -> usize {
        if self.back_half {
            self.half_len
        } else {
            0
        }
    }

    /// Allocate `size` bytes from the live half. Same contract as
    /// [`Arena::allocate`]; spans stay resolvable until the next `swap` of
    /// the same half (i.e. for two frames).
    pub fn allocate(&mut self, size: usize, alignment: usize) -> Option<Span> {
        let alignment = resolve_alignment(alignment);
        let head = align_up(self.base() + self.offset, alignment) - self.base();

        if head + size <= self.half_len {
            self.offset = head + size;
            Some(Span {
                offset: self.base() + head,
                len: size,
            })
        } else {
            None
        }
    }

    /// Resolve a span to a shared slice.
    pub fn bytes(&self, span: Span) -> &[u8] {
        &self.memory[span.offset..span.offset + span.len]
    }

    /// Resolve a span to a mutable slice.
    pub fn bytes_mut(&mut self, span: Span) -> &mut [u8] {
        &mut self.memory[span.offset..span.offset + span.len]
    }
}

/// Fixed-item-size linear allocator over a parent arena span.
///
/// A `Pool` does not own bytes; it subdivides a [`Span`] previously
/// allocated from an arena into contiguous fixed-size items. Used for
/// vertex streams, where every record has the layout's stride.
#[derive(Debug)]
pub struct Pool {
    region: Span,
    item_size: usize,
    used: usize,
}

impl Pool {
    /// Create a pool over `region` with the given item size and alignment.
    ///
    /// The region's start is aligned up to `item_alignment` (shrinking the
    /// usable range); item size must be non-zero and alignment a power of
    /// two.
    pub fn new(region: Span, item_size: usize, item_alignment: usize) -> Self {
        assert!(!region.is_empty(), "empty pool buffer");
        assert!(item_size > 0, "zero item size");
        assert!(
            item_alignment.is_power_of_two(),
            "item alignment {item_alignment} not a power of two"
        );

        let aligned = align_up(region.offset(), item_alignment);
        let region = if aligned < region.offset() + region.len() {
            Span {
                offset: aligned,
                len: region.len() - (aligned - region.offset()),
            }
        } else {
            Span::EMPTY
        };

        Self {
            region,
            item_size,
            used: 0,
        }
    }

    /// Item size in bytes.
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Number of items allocated so far.
    pub fn item_count(&self) -> usize {
        self.used / self.item_size
    }

    /// The whole (aligned) region this pool manages.
    pub fn region(&self) -> Span {
        self.region
    }

    /// The used prefix of the region.
    pub fn used_region(&self) -> Span {
        self.region.slice(0, self.used)
    }

    /// Rewind the pool without touching memory.
    pub fn restart(&mut self) {
        self.used = 0;
    }

    /// Reserve `count` contiguous items. Returns `None` when the region is
    /// exhausted.
    pub fn allocate(&mut self, count: usize) -> Option<Span> {
        let size = count * self.item_size;

        if self.used + size <= self.region.len() {
            let span = self.region.slice(self.used, size);
            self.used += size;
            Some(span)
        } else {
            None
        }
    }
}
