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

//! The raw 64-bit pointer codec.
//!
//! Packing and unpacking are total functions; validating what a decoded
//! field means against an actual segment is the reader's job.

use crate::units::{
    Address, ByteCount32, ElementCount32, SegmentId, Size, WirePointerCount16, WordCount32,
    BYTES_PER_WORD,
};

pub use self::ElementSize::{
    Bit, Byte, EightBytes, FourBytes, InlineComposite, Pointer, TwoBytes, Void,
};

/// The variant encoded in the low two bits of a pointer word.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WirePointerKind {
    Struct = 0,
    List = 1,
    Far = 2,
    Other = 3,
}

impl WirePointerKind {
    #[inline]
    fn from(val: u8) -> Self {
        match val & 3 {
            0 => Self::Struct,
            1 => Self::List,
            2 => Self::Far,
            _ => Self::Other,
        }
    }
}

/// The element-size tag of a list pointer.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementSize {
    Void = 0,
    Bit = 1,
    Byte = 2,
    TwoBytes = 3,
    FourBytes = 4,
    EightBytes = 5,
    Pointer = 6,
    InlineComposite = 7,
}

impl ElementSize {
    #[inline]
    fn from(val: u8) -> Self {
        match val & 7 {
            0 => Void,
            1 => Bit,
            2 => Byte,
            3 => TwoBytes,
            4 => FourBytes,
            5 => EightBytes,
            6 => Pointer,
            _ => InlineComposite,
        }
    }

    /// The per-element object size of a plain (non-bit, non-composite) list.
    pub(crate) fn object_size(self) -> ObjectSize {
        let (data, pointers) = match self {
            Void => (0, 0),
            Byte => (1, 0),
            TwoBytes => (2, 0),
            FourBytes => (4, 0),
            EightBytes => (8, 0),
            Pointer => (0, 1),
            Bit | InlineComposite => unreachable!("element size {self:?} has no object size"),
        };
        ObjectSize { data, pointers }
    }

    /// The inverse of [`ElementSize::object_size`].
    pub(crate) fn from_object_size(size: ObjectSize) -> ElementSize {
        match (size.data, size.pointers) {
            (0, 0) => Void,
            (1, 0) => Byte,
            (2, 0) => TwoBytes,
            (4, 0) => FourBytes,
            (8, 0) => EightBytes,
            (0, 1) => Pointer,
            _ => unreachable!("plain list with composite element size"),
        }
    }
}

/// The size of a struct-shaped region: `data` bytes of data followed by
/// `pointers` pointer words.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObjectSize {
    pub data: ByteCount32,
    pub pointers: WirePointerCount16,
}

impl ObjectSize {
    #[inline]
    pub fn total(&self) -> Size {
        Size(self.data + BYTES_PER_WORD * u32::from(self.pointers))
    }
}

/// A signed 30-bit word offset, counted from the word following the pointer
/// word that carries it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointerOffset(pub i32);

impl PointerOffset {
    /// Computes `base + 8 * (offset + 1)`, rejecting results outside the
    /// 32-bit segment address space.
    #[inline]
    pub fn resolve(self, base: Address) -> Option<Address> {
        let addr = i64::from(base.0) + 8 * (i64::from(self.0) + 1);
        if addr < 0 || addr > i64::from(u32::MAX) {
            None
        } else {
            Some(Address(addr as u32))
        }
    }

    /// The offset that makes a pointer word at `base` resolve to `target`.
    /// Both addresses must be word-aligned.
    #[inline]
    pub(crate) fn between(target: Address, base: Address) -> PointerOffset {
        PointerOffset(((i64::from(target.0) - i64::from(base.0)) / 8 - 1) as i32)
    }
}

/// The on-wire 64-bit pointer encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WirePointer(u64);

impl WirePointer {
    pub const NULL: WirePointer = WirePointer(0);

    #[inline]
    pub fn from_raw(raw: u64) -> WirePointer {
        WirePointer(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn kind(self) -> WirePointerKind {
        WirePointerKind::from(self.0 as u8)
    }

    /// The signed word offset of a struct or list pointer. For a
    /// struct-shaped composite-list tag, this field carries the element
    /// count instead.
    #[inline]
    pub fn offset(self) -> PointerOffset {
        PointerOffset((self.0 as u32 as i32) >> 2)
    }

    #[inline]
    pub fn struct_size(self) -> ObjectSize {
        ObjectSize {
            data: u32::from((self.0 >> 32) as u16) * BYTES_PER_WORD,
            pointers: (self.0 >> 48) as u16,
        }
    }

    #[inline]
    pub fn list_element_size(self) -> ElementSize {
        ElementSize::from((self.0 >> 32) as u8)
    }

    /// The element count of a list pointer. For composite lists this field
    /// holds the total word count of the payload instead.
    #[inline]
    pub fn list_element_count(self) -> ElementCount32 {
        ((self.0 >> 35) as u32) & 0x1fff_ffff
    }

    #[inline]
    pub fn inline_composite_word_count(self) -> WordCount32 {
        self.list_element_count()
    }

    /// The total byte size of a list's in-segment region, including the tag
    /// word for composite lists. `None` on overflow.
    pub fn total_list_size(self) -> Option<Size> {
        let count = self.list_element_count();
        match self.list_element_size() {
            Void => Some(Size(0)),
            Bit => Some(Size((count + 7) / 8)),
            InlineComposite => {
                let bytes =
                    (u64::from(self.inline_composite_word_count()) + 1) * u64::from(BYTES_PER_WORD);
                if bytes > u64::from(u32::MAX) {
                    None
                } else {
                    Some(Size(bytes as u32))
                }
            }
            other => other.object_size().total().times(count as i32),
        }
    }

    #[inline]
    pub fn is_double_far(self) -> bool {
        (self.0 >> 2) & 1 != 0
    }

    /// The byte address of a far pointer's landing pad within its target
    /// segment.
    #[inline]
    pub fn far_address(self) -> Address {
        Address((((self.0 >> 3) as u32) & 0x1fff_ffff) * BYTES_PER_WORD)
    }

    #[inline]
    pub fn far_segment_id(self) -> SegmentId {
        (self.0 >> 32) as u32
    }

    /// The non-kind low bits of an `other`-variant pointer. Must be zero for
    /// a capability pointer.
    #[inline]
    pub fn other_variant(self) -> u32 {
        (self.0 as u32) >> 2
    }

    #[inline]
    pub fn cap_index(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    fn lower32(offset: PointerOffset, kind: WirePointerKind) -> u64 {
        u64::from(((offset.0 as u32) << 2) | kind as u32)
    }

    #[inline]
    pub fn struct_pointer(offset: PointerOffset, size: ObjectSize) -> WirePointer {
        debug_assert_eq!(size.data % BYTES_PER_WORD, 0);
        WirePointer(
            Self::lower32(offset, WirePointerKind::Struct)
                | (u64::from(size.data / BYTES_PER_WORD) << 32)
                | (u64::from(size.pointers) << 48),
        )
    }

    /// Encodes a list pointer. For composite lists, `count` is the total
    /// word count of the payload rather than the element count.
    #[inline]
    pub fn list_pointer(
        offset: PointerOffset,
        element_size: ElementSize,
        count: ElementCount32,
    ) -> WirePointer {
        debug_assert!(count < (1 << 29), "lists are limited to 2**29 elements");
        WirePointer(
            Self::lower32(offset, WirePointerKind::List)
                | (u64::from(element_size as u8) << 32)
                | (u64::from(count) << 35),
        )
    }

    /// Encodes the struct-shaped tag word that precedes a composite list's
    /// elements: the offset field carries the element count.
    #[inline]
    pub fn composite_tag(element_count: ElementCount32, size: ObjectSize) -> WirePointer {
        Self::struct_pointer(PointerOffset(element_count as i32), size)
    }

    #[inline]
    pub fn far_pointer(segment_id: SegmentId, addr: Address) -> WirePointer {
        debug_assert_eq!(addr.0 % BYTES_PER_WORD, 0);
        WirePointer(
            WirePointerKind::Far as u64
                | (u64::from(addr.0 / BYTES_PER_WORD) << 3)
                | (u64::from(segment_id) << 32),
        )
    }

    #[inline]
    pub fn double_far_pointer(segment_id: SegmentId, addr: Address) -> WirePointer {
        WirePointer(WirePointer::far_pointer(segment_id, addr).0 | (1 << 2))
    }

    #[inline]
    pub fn interface_pointer(index: u32) -> WirePointer {
        WirePointer(WirePointerKind::Other as u64 | (u64::from(index) << 32))
    }

    /// Reconstructs the near pointer equivalent to a double-far landing pad,
    /// addressed as if the pointer word sat at offset zero of the target
    /// segment. `tag` must have a zero offset field.
    #[inline]
    pub fn landing_pad_near_pointer(far: WirePointer, tag: WirePointer) -> WirePointer {
        let offset = PointerOffset((far.far_address().0 / BYTES_PER_WORD) as i32 - 1);
        WirePointer(tag.0 | ((offset.0 as u32) << 2) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_pointer_round_trip() {
        // A one-word struct immediately following its pointer word.
        let p = WirePointer::struct_pointer(
            PointerOffset(0),
            ObjectSize {
                data: 8,
                pointers: 0,
            },
        );
        assert_eq!(p.raw(), 0x0000_0001_0000_0000);
        assert_eq!(p.kind(), WirePointerKind::Struct);
        assert_eq!(p.offset(), PointerOffset(0));
        assert_eq!(
            p.struct_size(),
            ObjectSize {
                data: 8,
                pointers: 0
            }
        );

        let p = WirePointer::struct_pointer(
            PointerOffset(-3),
            ObjectSize {
                data: 16,
                pointers: 2,
            },
        );
        assert_eq!(p.offset(), PointerOffset(-3));
        assert_eq!(
            p.struct_size(),
            ObjectSize {
                data: 16,
                pointers: 2
            }
        );
    }

    #[test]
    fn offset_resolve() {
        assert_eq!(PointerOffset(0).resolve(Address(0)), Some(Address(8)));
        assert_eq!(PointerOffset(-1).resolve(Address(16)), Some(Address(16)));
        assert_eq!(PointerOffset(-3).resolve(Address(16)), Some(Address(0)));
        // Resolving below the start of the segment fails.
        assert_eq!(PointerOffset(-4).resolve(Address(16)), None);
        // And so does running off the top of the address space.
        assert_eq!(PointerOffset(0x1fff_ffff).resolve(Address(u32::MAX & !7)), None);
    }

    #[test]
    fn offset_between() {
        assert_eq!(PointerOffset::between(Address(8), Address(0)), PointerOffset(0));
        assert_eq!(PointerOffset::between(Address(0), Address(16)), PointerOffset(-3));
        assert_eq!(
            PointerOffset::between(Address(64), Address(8)),
            PointerOffset(6)
        );
    }

    #[test]
    fn list_pointer_round_trip() {
        let p = WirePointer::list_pointer(PointerOffset(1), Byte, 13);
        assert_eq!(p.kind(), WirePointerKind::List);
        assert_eq!(p.offset(), PointerOffset(1));
        assert_eq!(p.list_element_size(), Byte);
        assert_eq!(p.list_element_count(), 13);
        assert_eq!(p.total_list_size(), Some(Size(13)));

        let p = WirePointer::list_pointer(PointerOffset(0), Bit, 17);
        assert_eq!(p.total_list_size(), Some(Size(3)));

        let p = WirePointer::list_pointer(PointerOffset(0), InlineComposite, 6);
        assert_eq!(p.inline_composite_word_count(), 6);
        // The tag word is part of the in-segment region.
        assert_eq!(p.total_list_size(), Some(Size(56)));
    }

    #[test]
    fn total_list_size_overflow() {
        // The largest plain list still fits the 32-bit size space...
        let p = WirePointer::list_pointer(PointerOffset(0), EightBytes, (1 << 29) - 1);
        assert_eq!(p.total_list_size(), Some(Size(u32::MAX - 7)));
        // ...but a maximal composite word count plus its tag word does not.
        let p = WirePointer::list_pointer(PointerOffset(0), InlineComposite, (1 << 29) - 1);
        assert_eq!(p.total_list_size(), None);
    }

    #[test]
    fn composite_tag_carries_count_in_offset() {
        let tag = WirePointer::composite_tag(
            3,
            ObjectSize {
                data: 8,
                pointers: 1,
            },
        );
        assert_eq!(tag.kind(), WirePointerKind::Struct);
        assert_eq!(tag.offset(), PointerOffset(3));
        assert_eq!(
            tag.struct_size(),
            ObjectSize {
                data: 8,
                pointers: 1
            }
        );
    }

    #[test]
    fn far_pointer_round_trip() {
        let p = WirePointer::far_pointer(7, Address(32));
        assert_eq!(p.kind(), WirePointerKind::Far);
        assert!(!p.is_double_far());
        assert_eq!(p.far_segment_id(), 7);
        assert_eq!(p.far_address(), Address(32));

        let p = WirePointer::double_far_pointer(1, Address(0));
        assert_eq!(p.kind(), WirePointerKind::Far);
        assert!(p.is_double_far());
        assert_eq!(p.far_address(), Address(0));
    }

    #[test]
    fn interface_pointer_round_trip() {
        let p = WirePointer::interface_pointer(5);
        assert_eq!(p.kind(), WirePointerKind::Other);
        assert_eq!(p.other_variant(), 0);
        assert_eq!(p.cap_index(), 5);
    }

    #[test]
    fn landing_pad_reconstruction() {
        let far = WirePointer::far_pointer(2, Address(16));
        let tag = WirePointer::struct_pointer(
            PointerOffset(0),
            ObjectSize {
                data: 16,
                pointers: 0,
            },
        );
        let near = WirePointer::landing_pad_near_pointer(far, tag);
        assert_eq!(near.kind(), WirePointerKind::Struct);
        assert_eq!(near.offset().resolve(Address(0)), Some(Address(16)));
        assert_eq!(near.struct_size(), tag.struct_size());

        // A pad at address zero reconstructs to offset -1.
        let far = WirePointer::far_pointer(2, Address(0));
        let near = WirePointer::landing_pad_near_pointer(far, tag);
        assert_eq!(near.offset(), PointerOffset(-1));
        assert_eq!(near.offset().resolve(Address(0)), Some(Address(0)));
    }
}
