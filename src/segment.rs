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

//! Bounded little-endian access to one segment of a message.

use core::cell::Ref;

use crate::message::Message;
use crate::units::{Address, SegmentId, Size};
use crate::wire::WirePointer;
use crate::Result;

/// A cheap, copyable handle on one segment of a [`Message`].
///
/// The raw accessors below require that the addressed region lie in bounds;
/// the pointer reader and writer perform those checks before touching bytes.
#[derive(Clone, Copy, Debug)]
pub struct Segment<'a> {
    msg: &'a Message,
    id: SegmentId,
}

impl<'a> Segment<'a> {
    pub(crate) fn new(msg: &'a Message, id: SegmentId) -> Segment<'a> {
        Segment { msg, id }
    }

    /// The message that contains this segment.
    pub fn message(&self) -> &'a Message {
        self.msg
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// The segment's current length in bytes; always a multiple of 8.
    pub fn len(&self) -> usize {
        self.msg.arena().segment_len(self.id)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_bounds(&self, addr: Address) -> bool {
        (addr.0 as usize) < self.len()
    }

    pub fn region_in_bounds(&self, base: Address, size: Size) -> bool {
        match base.add_size(size) {
            Some(end) => end.0 as usize <= self.len(),
            None => false,
        }
    }

    /// The segment's bytes from `base` to `base + size`.
    pub fn slice(&self, base: Address, size: Size) -> Ref<'a, [u8]> {
        let base = base.0 as usize;
        let end = base + size.0 as usize;
        Ref::map(self.msg.arena(), move |arena| {
            &arena.segment_data(self.id)[base..end]
        })
    }

    pub fn read_u8(&self, addr: Address) -> u8 {
        self.msg.arena().segment_data(self.id)[addr.0 as usize]
    }

    pub fn read_u16(&self, addr: Address) -> u16 {
        let mut bytes = [0; 2];
        bytes.copy_from_slice(&self.slice(addr, Size(2)));
        u16::from_le_bytes(bytes)
    }

    pub fn read_u32(&self, addr: Address) -> u32 {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(&self.slice(addr, Size(4)));
        u32::from_le_bytes(bytes)
    }

    pub fn read_u64(&self, addr: Address) -> u64 {
        let mut bytes = [0; 8];
        bytes.copy_from_slice(&self.slice(addr, Size(8)));
        u64::from_le_bytes(bytes)
    }

    pub fn write_u8(&self, addr: Address, value: u8) {
        self.msg.arena_mut().segment_data_mut(self.id)[addr.0 as usize] = value;
    }

    pub fn write_u16(&self, addr: Address, value: u16) {
        let base = addr.0 as usize;
        self.msg.arena_mut().segment_data_mut(self.id)[base..base + 2]
            .copy_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&self, addr: Address, value: u32) {
        let base = addr.0 as usize;
        self.msg.arena_mut().segment_data_mut(self.id)[base..base + 4]
            .copy_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&self, addr: Address, value: u64) {
        let base = addr.0 as usize;
        self.msg.arena_mut().segment_data_mut(self.id)[base..base + 8]
            .copy_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn read_raw_pointer(&self, addr: Address) -> WirePointer {
        WirePointer::from_raw(self.read_u64(addr))
    }

    pub(crate) fn write_raw_pointer(&self, addr: Address, value: WirePointer) {
        self.write_u64(addr, value.raw())
    }

    /// Resolves a segment id from the same message, short-circuiting the
    /// common case of a reference back into this segment.
    pub(crate) fn lookup_segment(self, id: SegmentId) -> Result<Segment<'a>> {
        if id == self.id {
            Ok(self)
        } else {
            self.msg.segment(id)
        }
    }
}
