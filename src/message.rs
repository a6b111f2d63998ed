// Copyright (c) 2013-2015 Sandstorm Development Group, Inc. and contributors
// Licensed under the MIT License:
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

//! Untyped container for a Cap'n Proto value: the segments, the safety
//! budgets, and the capability table.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::{Ref, RefCell, RefMut};

use crate::arena::{Arena, MAX_SEGMENT_BYTES};
use crate::capability::ClientHook;
use crate::layout::PointerList;
use crate::read_limiter::ReadLimiter;
use crate::segment::Segment;
use crate::units::{
    Address, ByteCount64, CapabilityIndex, SegmentId, Size, WordCount32, BYTES_PER_WORD,
};
use crate::{Error, ErrorKind, Result};

/// Options controlling how data is read.
#[derive(Clone, Copy, Debug)]
pub struct ReaderOptions {
    /// Limits how many total bytes of data are allowed to be traversed.
    /// Traversal is counted every time a struct or list view is decoded from
    /// a pointer, so revisiting the same object through different pointers
    /// deducts from the budget each time.
    ///
    /// This limit exists for security reasons. An attacker could construct a
    /// message in which multiple pointers point at the same location; such a
    /// message, small on the wire, would appear much larger when actually
    /// traversed, possibly exhausting server resources.
    ///
    /// `None` means no limit.
    pub traversal_limit_in_bytes: Option<ByteCount64>,

    /// Limits how long a chain of pointer dereferences may grow during a
    /// single traversal, e.g. structs containing other structs.
    ///
    /// Like the traversal limit, this limit exists for security reasons:
    /// recursive code walking a very deeply nested message could otherwise
    /// overflow the stack.
    pub depth_limit: u32,
}

pub const DEFAULT_READER_OPTIONS: ReaderOptions = ReaderOptions {
    traversal_limit_in_bytes: Some(64 * 1024 * 1024),
    depth_limit: 64,
};

impl Default for ReaderOptions {
    fn default() -> ReaderOptions {
        DEFAULT_READER_OPTIONS
    }
}

impl ReaderOptions {
    pub fn new() -> ReaderOptions {
        DEFAULT_READER_OPTIONS
    }

    pub fn depth_limit(&mut self, value: u32) -> &mut ReaderOptions {
        self.depth_limit = value;
        self
    }

    pub fn traversal_limit_in_bytes(&mut self, value: Option<ByteCount64>) -> &mut ReaderOptions {
        self.traversal_limit_in_bytes = value;
        self
    }
}

/// An object that decides how big each new segment of a message should be.
pub trait Allocator {
    /// Picks the capacity in words of a new segment that must be able to
    /// hold at least `minimum_size` words. The returned capacity must be at
    /// least `minimum_size`.
    fn allocate_segment(&mut self, minimum_size: WordCount32) -> WordCount32;
}

#[derive(Clone, Copy, Debug)]
pub enum AllocationStrategy {
    /// Causes the allocator to allocate segments of a fixed size.
    FixedSize,

    /// Causes each new segment to be at least as large as all allocated
    /// segments combined, keeping the total segment count logarithmic.
    GrowHeuristically,
}

pub const SUGGESTED_FIRST_SEGMENT_WORDS: WordCount32 = 1024;
pub const SUGGESTED_ALLOCATION_STRATEGY: AllocationStrategy = AllocationStrategy::GrowHeuristically;

/// An allocator that sizes segments for heap-backed growth.
#[derive(Clone, Copy, Debug)]
pub struct HeapAllocator {
    next_size: WordCount32,
    allocation_strategy: AllocationStrategy,
}

impl HeapAllocator {
    pub fn new() -> HeapAllocator {
        HeapAllocator {
            next_size: SUGGESTED_FIRST_SEGMENT_WORDS,
            allocation_strategy: SUGGESTED_ALLOCATION_STRATEGY,
        }
    }

    pub fn first_segment_words(mut self, value: WordCount32) -> HeapAllocator {
        self.next_size = value;
        self
    }

    pub fn allocation_strategy(mut self, value: AllocationStrategy) -> HeapAllocator {
        self.allocation_strategy = value;
        self
    }
}

impl Default for HeapAllocator {
    fn default() -> HeapAllocator {
        HeapAllocator::new()
    }
}

impl Allocator for HeapAllocator {
    fn allocate_segment(&mut self, minimum_size: WordCount32) -> WordCount32 {
        let size = core::cmp::max(minimum_size, self.next_size);
        if let AllocationStrategy::GrowHeuristically = self.allocation_strategy {
            self.next_size = self.next_size.saturating_add(size);
        }
        size
    }
}

/// A collection of segments holding one Cap'n Proto value, together with the
/// read-traversal budget, the depth limit, and the capability table.
///
/// A message is owned by a single logical owner at a time; the interior
/// mutability here exists so that the cheap `Copy` views handed out by the
/// reader can share one byte arena and one budget, not to support concurrent
/// mutation.
pub struct Message {
    arena: RefCell<Arena>,
    allocator: RefCell<Box<dyn Allocator>>,
    read_limiter: ReadLimiter,
    depth_limit: u32,
    cap_table: RefCell<Vec<Option<Box<dyn ClientHook>>>>,
}

impl core::fmt::Debug for Message {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Message").finish_non_exhaustive()
    }
}

impl Message {
    /// Creates a message for building, with one word allocated at the start
    /// of the first segment to hold the root pointer.
    pub fn new<A>(allocator: A) -> Message
    where
        A: Allocator + 'static,
    {
        let mut allocator: Box<dyn Allocator> = Box::new(allocator);
        let mut arena = Arena::new();
        let capacity = allocator.allocate_segment(1);
        let id = arena.add_segment(capacity);
        arena
            .allocate_in(id, crate::units::WORD_SIZE)
            .expect("fresh segment holds the root word");
        Message {
            arena: RefCell::new(arena),
            allocator: RefCell::new(allocator),
            read_limiter: ReadLimiter::new(DEFAULT_READER_OPTIONS.traversal_limit_in_bytes),
            depth_limit: DEFAULT_READER_OPTIONS.depth_limit,
            cap_table: RefCell::new(Vec::new()),
        }
    }

    /// Adopts externally produced segments, e.g. bytes received from the
    /// wire. Segment lengths must be multiples of the word size.
    pub fn from_segments(segments: Vec<Vec<u8>>, options: ReaderOptions) -> Result<Message> {
        let mut arena = Arena::new();
        for data in segments {
            if data.len() as u64 % u64::from(BYTES_PER_WORD) != 0 {
                return Err(Error::from_kind(ErrorKind::UnalignedSegment));
            }
            if data.len() as u64 > MAX_SEGMENT_BYTES {
                return Err(Error::from_kind(ErrorKind::Overflow));
            }
            arena.adopt_segment(data);
        }
        Ok(Message {
            arena: RefCell::new(arena),
            allocator: RefCell::new(Box::new(HeapAllocator::new())),
            read_limiter: ReadLimiter::new(options.traversal_limit_in_bytes),
            depth_limit: options.depth_limit,
            cap_table: RefCell::new(Vec::new()),
        })
    }

    /// Returns a handle to the segment with the given id.
    pub fn segment(&self, id: SegmentId) -> Result<Segment<'_>> {
        if (id as usize) < self.arena.borrow().len() {
            Ok(Segment::new(self, id))
        } else {
            Err(Error::from_kind(ErrorKind::BadLandingPad))
        }
    }

    pub fn segment_count(&self) -> u32 {
        self.arena.borrow().len() as u32
    }

    /// The maximum pointer-dereference chain length per traversal.
    pub fn depth_limit(&self) -> u32 {
        self.depth_limit
    }

    /// The root pointer list of the message: one pointer at byte 0 of the
    /// first segment.
    pub fn root(&self) -> Result<PointerList<'_>> {
        self.segment(0)?.root()
    }

    /// Deducts `amount` bytes from the read budget; `false` once exceeded.
    pub(crate) fn can_read(&self, amount: ByteCount64) -> bool {
        self.read_limiter.can_read(amount)
    }

    /// Appends a client to the capability table and returns its index.
    /// Indices never change once assigned.
    pub fn add_cap(&self, client: Option<Box<dyn ClientHook>>) -> CapabilityIndex {
        let mut table = self.cap_table.borrow_mut();
        table.push(client);
        (table.len() - 1) as CapabilityIndex
    }

    /// Looks up the client at `index`, if the table has one there.
    pub fn cap(&self, index: CapabilityIndex) -> Option<Box<dyn ClientHook>> {
        match self.cap_table.borrow().get(index as usize) {
            Some(Some(client)) => Some(client.add_ref()),
            _ => None,
        }
    }

    pub fn cap_count(&self) -> usize {
        self.cap_table.borrow().len()
    }

    /// Allocates a word-aligned region of `size` bytes (padded up to a
    /// word), preferring `preferred` but falling back to any segment with
    /// capacity and finally to a fresh segment from the allocator.
    pub(crate) fn alloc(&self, preferred: SegmentId, size: Size) -> Result<(SegmentId, Address)> {
        let size = size
            .pad_to_word()
            .ok_or_else(|| Error::from_kind(ErrorKind::Overflow))?;
        if u64::from(size.0) > MAX_SEGMENT_BYTES {
            return Err(Error::from_kind(ErrorKind::InvalidObjectSize));
        }
        let mut arena = self.arena.borrow_mut();
        if let Some(addr) = arena.allocate_in(preferred, size) {
            return Ok((preferred, addr));
        }
        for id in 0..arena.len() as SegmentId {
            if id == preferred {
                continue;
            }
            if let Some(addr) = arena.allocate_in(id, size) {
                return Ok((id, addr));
            }
        }
        let capacity = self
            .allocator
            .borrow_mut()
            .allocate_segment(size.word_count());
        let id = arena.add_segment(capacity);
        let addr = arena
            .allocate_in(id, size)
            .expect("use freshly-allocated segment");
        Ok((id, addr))
    }

    /// Whether segment `id` can hold `size` more bytes without triggering
    /// allocation; used to decide landing-pad placement.
    pub(crate) fn has_capacity(&self, id: SegmentId, size: Size) -> bool {
        self.arena.borrow().has_capacity(id, size)
    }

    pub(crate) fn arena(&self) -> Ref<'_, Arena> {
        self.arena.borrow()
    }

    pub(crate) fn arena_mut(&self) -> RefMut<'_, Arena> {
        self.arena.borrow_mut()
    }
}

impl Default for Message {
    fn default() -> Message {
        Message::new(HeapAllocator::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_allocates_root_word() {
        let message = Message::new(HeapAllocator::new());
        assert_eq!(message.segment_count(), 1);
        let segment = message.segment(0).unwrap();
        assert_eq!(segment.len(), 8);
        assert_eq!(segment.read_u64(Address(0)), 0);
    }

    #[test]
    fn missing_segment_is_a_bad_landing_pad() {
        let message = Message::new(HeapAllocator::new());
        assert_eq!(
            message.segment(1).unwrap_err().kind,
            ErrorKind::BadLandingPad
        );
    }

    #[test]
    fn from_segments_rejects_unaligned_lengths() {
        let err = Message::from_segments(alloc::vec![alloc::vec![0; 12]], ReaderOptions::new())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnalignedSegment);
    }

    #[test]
    fn alloc_prefers_the_named_segment() {
        let message = Message::new(HeapAllocator::new().first_segment_words(4));
        let (seg, addr) = message.alloc(0, Size(9)).unwrap();
        assert_eq!((seg, addr), (0, Address(8)));
        // The request was padded to two words.
        assert_eq!(message.segment(0).unwrap().len(), 24);
    }

    #[test]
    fn alloc_falls_back_to_a_new_segment() {
        let message = Message::new(
            HeapAllocator::new()
                .first_segment_words(1)
                .allocation_strategy(AllocationStrategy::FixedSize),
        );
        let (seg, addr) = message.alloc(0, Size(16)).unwrap();
        assert_eq!((seg, addr), (1, Address(0)));
        assert_eq!(message.segment_count(), 2);
        // A fixed-size allocator still has to satisfy the minimum.
        assert_eq!(message.segment(1).unwrap().len(), 16);
        assert!(!message.has_capacity(1, Size(8)));
    }

    #[test]
    fn grow_heuristically_leaves_spare_capacity() {
        let message = Message::new(HeapAllocator::new().first_segment_words(1));
        // Second segment: next_size has grown to 2 words, one will be spare.
        let (seg, _) = message.alloc(0, Size(8)).unwrap();
        assert_eq!(seg, 1);
        assert!(message.has_capacity(1, Size(8)));
    }

    #[test]
    fn cap_table_appends_and_returns_indices() {
        let message = Message::new(HeapAllocator::new());
        assert_eq!(message.add_cap(None), 0);
        assert_eq!(message.add_cap(None), 1);
        assert_eq!(message.cap_count(), 2);
        assert!(message.cap(0).is_none());
        assert!(message.cap(5).is_none());
    }
}
