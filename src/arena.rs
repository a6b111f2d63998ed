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

//! Backing storage for a message's segments.

use alloc::vec::Vec;

use crate::units::{Address, SegmentId, Size, WordCount32, BYTES_PER_WORD};

/// The largest byte length a segment may reach: the top of the 32-bit
/// address space, rounded down to a word boundary.
pub(crate) const MAX_SEGMENT_BYTES: u64 = (u32::MAX & !7) as u64;

/// One segment's bytes. `data.len()` is the allocated prefix and is always a
/// multiple of 8; `capacity` bounds how far the segment may grow, so that
/// landing-pad feasibility can be answered without allocating.
pub(crate) struct SegmentInner {
    data: Vec<u8>,
    capacity: usize,
}

pub(crate) struct Arena {
    segments: Vec<SegmentInner>,
}

impl Arena {
    pub fn new() -> Arena {
        Arena {
            segments: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn segment_len(&self, id: SegmentId) -> usize {
        self.segments[id as usize].data.len()
    }

    pub fn segment_data(&self, id: SegmentId) -> &[u8] {
        &self.segments[id as usize].data
    }

    pub fn segment_data_mut(&mut self, id: SegmentId) -> &mut [u8] {
        &mut self.segments[id as usize].data
    }

    /// Appends a fresh, empty segment with room to grow to `capacity_words`.
    pub fn add_segment(&mut self, capacity_words: WordCount32) -> SegmentId {
        let capacity = capacity_words as usize * BYTES_PER_WORD as usize;
        self.segments.push(SegmentInner {
            data: Vec::with_capacity(capacity),
            capacity,
        });
        (self.segments.len() - 1) as SegmentId
    }

    /// Appends an externally supplied segment. Its contents are frozen: the
    /// capacity equals the current length, so nothing can be allocated in it.
    pub fn adopt_segment(&mut self, data: Vec<u8>) -> SegmentId {
        let capacity = data.len();
        self.segments.push(SegmentInner { data, capacity });
        (self.segments.len() - 1) as SegmentId
    }

    /// Extends segment `id` by `size` zeroed bytes, returning the address of
    /// the new region, or `None` if the segment lacks the capacity. `size`
    /// must be word-aligned.
    pub fn allocate_in(&mut self, id: SegmentId, size: Size) -> Option<Address> {
        debug_assert_eq!(size.0 % BYTES_PER_WORD, 0);
        let seg = &mut self.segments[id as usize];
        let len = seg.data.len();
        if size.0 as usize > seg.capacity - len {
            return None;
        }
        seg.data.resize(len + size.0 as usize, 0);
        Some(Address(len as u32))
    }

    pub fn has_capacity(&self, id: SegmentId, size: Size) -> bool {
        let seg = &self.segments[id as usize];
        size.0 as usize <= seg.capacity - seg.data.len()
    }

    /// Copies `len` bytes between two regions of this arena. The regions must
    /// be in bounds; within one segment, overlapping regions are moved as by
    /// `memmove`.
    pub fn copy_bytes(
        &mut self,
        src: (SegmentId, Address),
        dst: (SegmentId, Address),
        len: usize,
    ) {
        let (src_id, dst_id) = (src.0 as usize, dst.0 as usize);
        let (src_off, dst_off) = (src.1 .0 as usize, dst.1 .0 as usize);
        if src_id == dst_id {
            self.segments[src_id]
                .data
                .copy_within(src_off..src_off + len, dst_off);
        } else if src_id < dst_id {
            let (low, high) = self.segments.split_at_mut(dst_id);
            high[0].data[dst_off..dst_off + len]
                .copy_from_slice(&low[src_id].data[src_off..src_off + len]);
        } else {
            let (low, high) = self.segments.split_at_mut(src_id);
            low[dst_id].data[dst_off..dst_off + len]
                .copy_from_slice(&high[0].data[src_off..src_off + len]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_within_capacity() {
        let mut arena = Arena::new();
        let id = arena.add_segment(2);
        assert_eq!(arena.segment_len(id), 0);
        assert_eq!(arena.allocate_in(id, Size(8)), Some(Address(0)));
        assert_eq!(arena.allocate_in(id, Size(8)), Some(Address(8)));
        assert_eq!(arena.allocate_in(id, Size(8)), None);
        assert_eq!(arena.segment_len(id), 16);
    }

    #[test]
    fn adopted_segments_are_frozen() {
        let mut arena = Arena::new();
        let id = arena.adopt_segment(alloc::vec![0; 16]);
        assert!(!arena.has_capacity(id, Size(8)));
        assert_eq!(arena.allocate_in(id, Size(8)), None);
    }

    #[test]
    fn copy_bytes_across_segments() {
        let mut arena = Arena::new();
        let a = arena.adopt_segment(alloc::vec![1, 2, 3, 4, 5, 6, 7, 8]);
        let b = arena.add_segment(1);
        arena.allocate_in(b, Size(8)).unwrap();
        arena.copy_bytes((a, Address(0)), (b, Address(0)), 8);
        assert_eq!(arena.segment_data(b), &[1, 2, 3, 4, 5, 6, 7, 8]);
        // And back again, the split goes the other way.
        arena.segment_data_mut(b)[0] = 9;
        arena.copy_bytes((b, Address(0)), (a, Address(0)), 4);
        assert_eq!(arena.segment_data(a), &[9, 2, 3, 4, 5, 6, 7, 8]);
    }
}
