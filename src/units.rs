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

//! Units of the wire format and checked address/size arithmetic.

pub type ByteCount32 = u32;
pub type ByteCount64 = u64;

pub type WordCount32 = u32;

pub type ElementCount32 = u32;

pub type WirePointerCount16 = u16;

/// A numeric identifier for a segment, unique within a message.
pub type SegmentId = u32;

/// An index into a message's capability table.
pub type CapabilityIndex = u32;

pub const BYTES_PER_WORD: ByteCount32 = 8;

/// The size of one word, as a byte count.
pub const WORD_SIZE: Size = Size(BYTES_PER_WORD);

/// A byte offset into a segment.
///
/// Addresses are byte-granular, but pointers always target word-aligned
/// addresses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Address(pub u32);

impl Address {
    /// Computes `self + size`, or `None` if the sum would not fit in the
    /// 32-bit segment address space.
    #[inline]
    pub fn add_size(self, size: Size) -> Option<Address> {
        let end = u64::from(self.0) + u64::from(size.0);
        if end > u64::from(u32::MAX) {
            None
        } else {
            Some(Address(end as u32))
        }
    }
}

/// A non-negative byte count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Size(pub u32);

impl Size {
    /// Computes `self * count`, or `None` on overflow or a negative count.
    #[inline]
    pub fn times(self, count: i32) -> Option<Size> {
        if count < 0 {
            return None;
        }
        let total = u64::from(self.0) * count as u64;
        if total > u64::from(u32::MAX) {
            None
        } else {
            Some(Size(total as u32))
        }
    }

    /// Rounds up to the nearest multiple of the word size.
    #[inline]
    pub fn pad_to_word(self) -> Option<Size> {
        let padded = (u64::from(self.0) + 7) & !7;
        if padded > u64::from(u32::MAX) {
            None
        } else {
            Some(Size(padded as u32))
        }
    }

    /// The number of whole words this size spans. The size must already be
    /// word-aligned.
    #[inline]
    pub fn word_count(self) -> WordCount32 {
        debug_assert_eq!(self.0 % BYTES_PER_WORD, 0);
        self.0 / BYTES_PER_WORD
    }
}
