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

//! Typed views over segment bytes, and the pointer reader and writer that
//! connect them to the wire encoding.
//!
//! This is where untrusted bytes meet typed data: every view handed out by
//! [`Segment::read_ptr`] has been bounds-checked against its segment and
//! charged against the message's read and depth budgets.

use alloc::boxed::Box;
use core::cell::Ref;
use core::cmp;
use core::fmt;

use crate::capability::ClientHook;
use crate::message::Message;
use crate::segment::Segment;
use crate::units::{
    Address, ByteCount64, CapabilityIndex, ElementCount32, SegmentId, Size, WORD_SIZE,
};
use crate::wire::{ElementSize, ObjectSize, PointerOffset, WirePointer, WirePointerKind};
use crate::{Error, ErrorKind, Result};

/// Bounds recursion in [`Segment::write_ptr`]'s deep copy, guarding against
/// adversarial shared substructure that survived the reader's checks.
const COPY_DEPTH_LIMIT: u32 = 64;

/// How a list's elements are laid out in its segment region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListEncoding {
    /// Fixed-size elements packed back to back.
    Plain,
    /// One bit per element, packed LSB-first within bytes.
    Bit,
    /// Struct elements preceded by a tag word describing their shape.
    Composite,
}

/// A view of a struct: `size.data` bytes of data followed by
/// `size.pointers` pointer words.
#[derive(Clone, Copy)]
pub struct Struct<'a> {
    seg: Segment<'a>,
    off: Address,
    size: ObjectSize,
    list_member: bool,
    depth_limit: u32,
}

impl<'a> Struct<'a> {
    pub fn segment(&self) -> Segment<'a> {
        self.seg
    }

    pub fn address(&self) -> Address {
        self.off
    }

    pub fn size(&self) -> ObjectSize {
        self.size
    }

    /// The struct's data section.
    pub fn data(&self) -> Ref<'a, [u8]> {
        self.seg.slice(self.off, Size(self.size.data))
    }

    fn pointer_address(&self, i: u16) -> Address {
        Address(self.off.0 + self.size.data + 8 * u32::from(i))
    }

    /// Decodes the pointer in slot `i`. Slots past the struct's pointer
    /// count read as null.
    pub fn ptr(&self, i: u16) -> Result<Pointer<'a>> {
        if i >= self.size.pointers {
            return Ok(Pointer::Null);
        }
        self.seg.read_ptr(self.pointer_address(i), self.depth_limit)
    }

    /// Whether slot `i` holds a non-null pointer word. Unlike [`Struct::ptr`]
    /// this inspects only the raw word and charges no budget.
    pub fn has_ptr(&self, i: u16) -> bool {
        i < self.size.pointers && !self.seg.read_raw_pointer(self.pointer_address(i)).is_null()
    }

    /// Writes `value` into pointer slot `i`.
    pub fn set_ptr(&self, i: u16, value: Pointer<'_>) -> Result<()> {
        if i >= self.size.pointers {
            return Err(Error::from_kind(ErrorKind::OutOfBounds));
        }
        self.seg.write_ptr(self.pointer_address(i), value, false)
    }

    pub(crate) fn read_size(&self) -> ByteCount64 {
        // An empty struct still charges one word, so that a message cannot
        // fan out into unbounded numbers of free visits.
        cmp::max(u64::from(self.size.total().0), 8)
    }
}

/// A view of a list. For composite lists, `off` points just past the tag
/// word that precedes the elements.
#[derive(Clone, Copy)]
pub struct List<'a> {
    seg: Segment<'a>,
    off: Address,
    length: ElementCount32,
    size: ObjectSize,
    encoding: ListEncoding,
    depth_limit: u32,
}

impl<'a> List<'a> {
    pub fn segment(&self) -> Segment<'a> {
        self.seg
    }

    pub fn address(&self) -> Address {
        self.off
    }

    pub fn len(&self) -> ElementCount32 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The per-element size. Zero for bit lists.
    pub fn size(&self) -> ObjectSize {
        self.size
    }

    pub fn encoding(&self) -> ListEncoding {
        self.encoding
    }

    /// Element `i` viewed as a struct. Primitive elements read as a struct
    /// whose data section is the element value; bit-list elements read as an
    /// empty struct.
    pub(crate) fn struct_element(&self, i: ElementCount32) -> Struct<'a> {
        let size = match self.encoding {
            ListEncoding::Bit => ObjectSize::default(),
            _ => self.size,
        };
        Struct {
            seg: self.seg,
            off: Address(self.off.0 + i * size.total().0),
            size,
            list_member: true,
            depth_limit: self.depth_limit,
        }
    }

    /// The byte size of a fresh copy of this list, including the tag word
    /// for composite lists.
    pub(crate) fn alloc_size(&self) -> Result<Size> {
        match self.encoding {
            ListEncoding::Bit => Ok(Size((self.length + 7) / 8)),
            ListEncoding::Plain => self
                .size
                .total()
                .times(self.length as i32)
                .ok_or_else(|| Error::from_kind(ErrorKind::Overflow)),
            ListEncoding::Composite => {
                let payload = self
                    .size
                    .total()
                    .times(self.length as i32)
                    .ok_or_else(|| Error::from_kind(ErrorKind::Overflow))?;
                let total = u64::from(payload.0) + 8;
                if total > u64::from(u32::MAX) {
                    Err(Error::from_kind(ErrorKind::Overflow))
                } else {
                    Ok(Size(total as u32))
                }
            }
        }
    }

    pub(crate) fn read_size(&self) -> ByteCount64 {
        let bytes = match self.encoding {
            ListEncoding::Bit => (u64::from(self.length) + 7) / 8,
            ListEncoding::Plain => u64::from(self.size.total().0) * u64::from(self.length),
            ListEncoding::Composite => {
                u64::from(self.size.total().0) * u64::from(self.length) + 8
            }
        };
        cmp::max(bytes, 8)
    }
}

/// A handle into a message's capability table.
#[derive(Clone, Copy)]
pub struct Interface<'a> {
    seg: Segment<'a>,
    cap: CapabilityIndex,
}

impl<'a> Interface<'a> {
    pub fn new(seg: Segment<'a>, cap: CapabilityIndex) -> Interface<'a> {
        Interface { seg, cap }
    }

    pub fn message(&self) -> &'a Message {
        self.seg.message()
    }

    pub fn capability(&self) -> CapabilityIndex {
        self.cap
    }

    /// The client this handle refers to, if the capability table has one at
    /// this index.
    pub fn client(&self) -> Option<Box<dyn ClientHook>> {
        self.seg.message().cap(self.cap)
    }
}

/// A decoded pointer. The four cases are exhaustive and closed.
#[derive(Clone, Copy)]
pub enum Pointer<'a> {
    Null,
    Struct(Struct<'a>),
    List(List<'a>),
    Interface(Interface<'a>),
}

impl Pointer<'_> {
    pub fn is_null(&self) -> bool {
        matches!(self, Pointer::Null)
    }
}

/// A list of pointers, as returned by [`Segment::root`].
#[derive(Clone, Copy)]
pub struct PointerList<'a> {
    list: List<'a>,
}

impl<'a> PointerList<'a> {
    pub fn len(&self) -> ElementCount32 {
        self.list.length
    }

    pub fn is_empty(&self) -> bool {
        self.list.length == 0
    }

    fn element_address(&self, i: ElementCount32) -> Address {
        Address(self.list.off.0 + 8 * i)
    }

    /// Decodes the pointer at index `i`.
    pub fn get(&self, i: ElementCount32) -> Result<Pointer<'a>> {
        if i >= self.list.length {
            return Err(Error::from_kind(ErrorKind::OutOfBounds));
        }
        self.list
            .seg
            .read_ptr(self.element_address(i), self.list.depth_limit)
    }

    /// Writes `value` at index `i`, deep-copying if it lives in another
    /// message.
    pub fn set(&self, i: ElementCount32, value: Pointer<'_>) -> Result<()> {
        if i >= self.list.length {
            return Err(Error::from_kind(ErrorKind::OutOfBounds));
        }
        self.list.seg.write_ptr(self.element_address(i), value, false)
    }
}

impl<'a> TryFrom<List<'a>> for PointerList<'a> {
    type Error = Error;

    fn try_from(list: List<'a>) -> Result<PointerList<'a>> {
        let pointer_shaped = ObjectSize {
            data: 0,
            pointers: 1,
        };
        if list.encoding != ListEncoding::Plain || list.size != pointer_shaped {
            return Err(Error::from_kind(ErrorKind::MismatchedElementSize));
        }
        Ok(PointerList { list })
    }
}

impl<'a> From<PointerList<'a>> for List<'a> {
    fn from(list: PointerList<'a>) -> List<'a> {
        list.list
    }
}

impl<'a> Segment<'a> {
    /// Returns a 1-element pointer list that references the first word in
    /// the segment. This only makes sense to call on the first segment in a
    /// message.
    pub fn root(self) -> Result<PointerList<'a>> {
        let size = ObjectSize {
            data: 0,
            pointers: 1,
        };
        if !self.region_in_bounds(Address(0), size.total()) {
            return Err(Error::from_kind(ErrorKind::OutOfBounds));
        }
        Ok(PointerList {
            list: List {
                seg: self,
                off: Address(0),
                length: 1,
                size,
                encoding: ListEncoding::Plain,
                depth_limit: self.message().depth_limit(),
            },
        })
    }

    /// Resolves the pointer word at `off` into a typed view, following far
    /// pointers, enforcing the depth budget, and charging the message's read
    /// budget for the referenced region.
    pub fn read_ptr(self, off: Address, depth_limit: u32) -> Result<Pointer<'a>> {
        if !self.region_in_bounds(off, WORD_SIZE) {
            return Err(Error::from_kind(ErrorKind::OutOfBounds));
        }
        let val = self.read_raw_pointer(off);
        let (seg, off, val) = self.resolve_far_pointer(off, val)?;
        if val.is_null() {
            return Ok(Pointer::Null);
        }
        if depth_limit == 0 {
            return Err(Error::from_kind(ErrorKind::DepthLimitExceeded));
        }
        match val.kind() {
            WirePointerKind::Struct => {
                let result = seg.read_struct_ptr(off, val, depth_limit - 1)?;
                if !seg.message().can_read(result.read_size()) {
                    return Err(Error::from_kind(ErrorKind::ReadLimitExceeded));
                }
                Ok(Pointer::Struct(result))
            }
            WirePointerKind::List => {
                let result = seg.read_list_ptr(off, val, depth_limit - 1)?;
                if !seg.message().can_read(result.read_size()) {
                    return Err(Error::from_kind(ErrorKind::ReadLimitExceeded));
                }
                Ok(Pointer::List(result))
            }
            WirePointerKind::Other => {
                if val.other_variant() != 0 {
                    return Err(Error::from_kind(ErrorKind::UnknownPointerType));
                }
                Ok(Pointer::Interface(Interface {
                    seg,
                    cap: val.cap_index(),
                }))
            }
            // Resolution in resolve_far_pointer follows at most one hop, so
            // a far pointer here means the landing pad held another one.
            WirePointerKind::Far => Err(Error::from_kind(ErrorKind::BadLandingPad)),
        }
    }

    fn read_struct_ptr(self, off: Address, val: WirePointer, depth_limit: u32) -> Result<Struct<'a>> {
        let addr = val
            .offset()
            .resolve(off)
            .ok_or_else(|| Error::from_kind(ErrorKind::PointerOutOfBounds))?;
        let size = val.struct_size();
        if !self.region_in_bounds(addr, size.total()) {
            return Err(Error::from_kind(ErrorKind::PointerOutOfBounds));
        }
        Ok(Struct {
            seg: self,
            off: addr,
            size,
            list_member: false,
            depth_limit,
        })
    }

    fn read_list_ptr(self, off: Address, val: WirePointer, depth_limit: u32) -> Result<List<'a>> {
        let addr = val
            .offset()
            .resolve(off)
            .ok_or_else(|| Error::from_kind(ErrorKind::PointerOutOfBounds))?;
        let total = val
            .total_list_size()
            .ok_or_else(|| Error::from_kind(ErrorKind::Overflow))?;
        if !self.region_in_bounds(addr, total) {
            return Err(Error::from_kind(ErrorKind::PointerOutOfBounds));
        }
        match val.list_element_size() {
            ElementSize::InlineComposite => {
                let tag = self.read_raw_pointer(addr);
                let addr = addr
                    .add_size(WORD_SIZE)
                    .ok_or_else(|| Error::from_kind(ErrorKind::Overflow))?;
                if tag.kind() != WirePointerKind::Struct {
                    return Err(Error::from_kind(ErrorKind::BadCompositeTag));
                }
                let size = tag.struct_size();
                // The tag's offset field carries the element count and is
                // authoritative over the pointer's word count.
                let count = tag.offset().0;
                if count < 0 {
                    return Err(Error::from_kind(ErrorKind::InvalidListSize));
                }
                let payload = size
                    .total()
                    .times(count)
                    .ok_or_else(|| Error::from_kind(ErrorKind::Overflow))?;
                if !self.region_in_bounds(addr, payload) {
                    return Err(Error::from_kind(ErrorKind::PointerOutOfBounds));
                }
                Ok(List {
                    seg: self,
                    off: addr,
                    length: count as ElementCount32,
                    size,
                    encoding: ListEncoding::Composite,
                    depth_limit,
                })
            }
            ElementSize::Bit => Ok(List {
                seg: self,
                off: addr,
                length: val.list_element_count(),
                size: ObjectSize::default(),
                encoding: ListEncoding::Bit,
                depth_limit,
            }),
            element_size => Ok(List {
                seg: self,
                off: addr,
                length: val.list_element_count(),
                size: element_size.object_size(),
                encoding: ListEncoding::Plain,
                depth_limit,
            }),
        }
    }

    /// Follows at most one far hop. On return the pointer word is near
    /// (struct, list, other, or null) unless the input was malformed.
    fn resolve_far_pointer(
        self,
        off: Address,
        val: WirePointer,
    ) -> Result<(Segment<'a>, Address, WirePointer)> {
        if val.kind() != WirePointerKind::Far {
            return Ok((self, off, val));
        }
        let seg = self.lookup_segment(val.far_segment_id())?;
        let pad_addr = val.far_address();
        if val.is_double_far() {
            // The landing pad is a far pointer to the object's first word,
            // followed by a tag that would normally sit right before the
            // object (hence its offset field must be zero).
            if !seg.region_in_bounds(pad_addr, Size(16)) {
                return Err(Error::from_kind(ErrorKind::PointerOutOfBounds));
            }
            let far = seg.read_raw_pointer(pad_addr);
            let tag_addr = pad_addr
                .add_size(WORD_SIZE)
                .ok_or_else(|| Error::from_kind(ErrorKind::Overflow))?;
            let tag = seg.read_raw_pointer(tag_addr);
            if far.kind() != WirePointerKind::Far || far.is_double_far() || tag.offset().0 != 0 {
                return Err(Error::from_kind(ErrorKind::BadLandingPad));
            }
            let target = seg.lookup_segment(far.far_segment_id())?;
            Ok((
                target,
                Address(0),
                WirePointer::landing_pad_near_pointer(far, tag),
            ))
        } else {
            if !seg.region_in_bounds(pad_addr, WORD_SIZE) {
                return Err(Error::from_kind(ErrorKind::PointerOutOfBounds));
            }
            let val = seg.read_raw_pointer(pad_addr);
            Ok((seg, pad_addr, val))
        }
    }

    /// Encodes `src` as a pointer word at `off`.
    ///
    /// The referent is deep-copied into this segment's message when
    /// `force_copy` is set, when `src` belongs to another message, or when it
    /// is a struct inlined in a composite list. If the (possibly relocated)
    /// referent lands in a different segment than the pointer word, a far
    /// pointer is emitted, with a landing pad in the referent's segment when
    /// it has room and a two-word double-far pad elsewhere otherwise.
    pub fn write_ptr(self, off: Address, src: Pointer<'_>, force_copy: bool) -> Result<()> {
        if !self.region_in_bounds(off, WORD_SIZE) {
            return Err(Error::from_kind(ErrorKind::OutOfBounds));
        }
        self.write_ptr_impl(off, src, force_copy, COPY_DEPTH_LIMIT)
    }

    fn write_ptr_impl(
        self,
        off: Address,
        src: Pointer<'_>,
        force_copy: bool,
        copy_depth: u32,
    ) -> Result<()> {
        let msg = self.message();
        match src {
            Pointer::Null => {
                self.write_raw_pointer(off, WirePointer::NULL);
                Ok(())
            }
            Pointer::Interface(interface) => {
                let cap = if same_message(interface.message(), msg) {
                    interface.capability()
                } else {
                    msg.add_cap(interface.client())
                };
                // A capability pointer carries no byte reference, so no far
                // pointer is ever needed.
                self.write_raw_pointer(off, WirePointer::interface_pointer(cap));
                Ok(())
            }
            Pointer::Struct(st) => {
                let local = same_message(st.seg.message(), msg);
                let (obj_seg, obj_addr, size) = if force_copy || !local || st.list_member {
                    let size = ObjectSize {
                        data: (st.size.data + 7) & !7,
                        pointers: st.size.pointers,
                    };
                    let (seg_id, addr) = msg.alloc(self.id(), size.total())?;
                    let dst = Struct {
                        seg: Segment::new(msg, seg_id),
                        off: addr,
                        size,
                        list_member: false,
                        depth_limit: msg.depth_limit(),
                    };
                    copy_struct(dst, st, copy_depth)?;
                    (seg_id, addr, size)
                } else {
                    (st.seg.id(), st.off, st.size)
                };
                let near = move |paddr: Address| {
                    if size.total().0 == 0 {
                        // An empty struct is placed "just before" its
                        // pointer so the emitted word stays distinguishable
                        // from null.
                        WirePointer::struct_pointer(PointerOffset(-1), size)
                    } else {
                        WirePointer::struct_pointer(PointerOffset::between(obj_addr, paddr), size)
                    }
                };
                let tag = WirePointer::struct_pointer(PointerOffset(0), size);
                self.finish_pointer(off, obj_seg, obj_addr, &near, tag)
            }
            Pointer::List(list) => {
                let local = same_message(list.seg.message(), msg);
                let (obj_seg, data_off) = if force_copy || !local {
                    let alloc_size = list.alloc_size()?;
                    let (seg_id, addr) = msg.alloc(self.id(), alloc_size)?;
                    let dst_seg = Segment::new(msg, seg_id);
                    let mut data_off = addr;
                    if list.encoding == ListEncoding::Composite {
                        // Tag word first, then the elements.
                        let tag = list.seg.read_raw_pointer(Address(list.off.0 - 8));
                        dst_seg.write_raw_pointer(addr, tag);
                        data_off = Address(addr.0 + 8);
                    }
                    let dst = List {
                        seg: dst_seg,
                        off: data_off,
                        length: list.length,
                        size: list.size,
                        encoding: list.encoding,
                        depth_limit: msg.depth_limit(),
                    };
                    if list.encoding == ListEncoding::Bit || list.size.pointers == 0 {
                        let tag_bytes = match list.encoding {
                            ListEncoding::Composite => 8,
                            _ => 0,
                        };
                        copy_bytes(
                            dst.seg,
                            dst.off,
                            list.seg,
                            list.off,
                            (alloc_size.0 - tag_bytes) as usize,
                        );
                    } else {
                        for i in 0..list.length {
                            copy_struct(dst.struct_element(i), list.struct_element(i), copy_depth)?;
                        }
                    }
                    (seg_id, data_off)
                } else {
                    (list.seg.id(), list.off)
                };
                let obj_addr = match list.encoding {
                    ListEncoding::Composite => Address(data_off.0 - 8),
                    _ => data_off,
                };
                let (element_size, count) = match list.encoding {
                    ListEncoding::Composite => (
                        ElementSize::InlineComposite,
                        list.size.total().word_count() * list.length,
                    ),
                    ListEncoding::Bit => (ElementSize::Bit, list.length),
                    ListEncoding::Plain => {
                        (ElementSize::from_object_size(list.size), list.length)
                    }
                };
                let near = move |paddr: Address| {
                    WirePointer::list_pointer(
                        PointerOffset::between(obj_addr, paddr),
                        element_size,
                        count,
                    )
                };
                let tag = WirePointer::list_pointer(PointerOffset(0), element_size, count);
                self.finish_pointer(off, obj_seg, obj_addr, &near, tag)
            }
        }
    }

    /// Emits the pointer word at `off` naming the object at
    /// `(obj_seg, obj_addr)`, which by now lives in this segment's message:
    /// near if it shares this segment, far otherwise.
    fn finish_pointer(
        self,
        off: Address,
        obj_seg: SegmentId,
        obj_addr: Address,
        near: &dyn Fn(Address) -> WirePointer,
        tag: WirePointer,
    ) -> Result<()> {
        if obj_seg == self.id() {
            self.write_raw_pointer(off, near(off));
            return Ok(());
        }
        let msg = self.message();
        if msg.has_capacity(obj_seg, WORD_SIZE) {
            // One-word landing pad in the object's own segment, holding the
            // near pointer that names the data.
            let (pad_seg, pad_addr) = msg.alloc(obj_seg, WORD_SIZE)?;
            debug_assert_eq!(pad_seg, obj_seg);
            let pad = msg.segment(pad_seg)?;
            pad.write_raw_pointer(pad_addr, near(pad_addr));
            self.write_raw_pointer(off, WirePointer::far_pointer(pad_seg, pad_addr));
        } else {
            // No room next to the object: put a two-word {far, tag} pad
            // wherever it fits, preferring this segment.
            let (pad_seg, pad_addr) = msg.alloc(self.id(), Size(16))?;
            let pad = msg.segment(pad_seg)?;
            pad.write_raw_pointer(pad_addr, WirePointer::far_pointer(obj_seg, obj_addr));
            pad.write_raw_pointer(Address(pad_addr.0 + 8), tag);
            self.write_raw_pointer(off, WirePointer::double_far_pointer(pad_seg, pad_addr));
        }
        Ok(())
    }
}

fn same_message(m1: &Message, m2: &Message) -> bool {
    core::ptr::eq(m1, m2)
}

/// Copies `len` bytes between two segment regions, which may belong to the
/// same message or even the same segment. Bounds must already be checked.
fn copy_bytes(
    dst_seg: Segment<'_>,
    dst_off: Address,
    src_seg: Segment<'_>,
    src_off: Address,
    len: usize,
) {
    if len == 0 {
        return;
    }
    if same_message(dst_seg.message(), src_seg.message()) {
        dst_seg.message().arena_mut().copy_bytes(
            (src_seg.id(), src_off),
            (dst_seg.id(), dst_off),
            len,
        );
    } else {
        let src = src_seg.slice(src_off, Size(len as u32));
        let mut dst_arena = dst_seg.message().arena_mut();
        let base = dst_off.0 as usize;
        dst_arena.segment_data_mut(dst_seg.id())[base..base + len].copy_from_slice(&src);
    }
}

/// Copies `src`'s data bytes verbatim, then recursively writes each source
/// pointer into the corresponding destination slot. The recursive writes
/// cross segments iff the top-level write did, so copy-on-write falls out of
/// [`Segment::write_ptr`]'s own rules.
fn copy_struct(dst: Struct<'_>, src: Struct<'_>, copy_depth: u32) -> Result<()> {
    if copy_depth == 0 {
        return Err(Error::from_kind(ErrorKind::CopyDepthLimitExceeded));
    }
    let data_len = cmp::min(dst.size.data, src.size.data);
    if data_len > 0 {
        if same_message(dst.seg.message(), src.seg.message()) && dst.seg.id() == src.seg.id() {
            let (s, d, n) = (
                u64::from(src.off.0),
                u64::from(dst.off.0),
                u64::from(data_len),
            );
            if s < d + n && d < s + n {
                return Err(Error::from_kind(ErrorKind::OverlappingCopy));
            }
        }
        copy_bytes(dst.seg, dst.off, src.seg, src.off, data_len as usize);
    }
    let pointer_count = cmp::min(dst.size.pointers, src.size.pointers);
    for i in 0..pointer_count {
        let value = src.ptr(i)?;
        dst.seg
            .write_ptr_impl(dst.pointer_address(i), value, false, copy_depth - 1)?;
    }
    Ok(())
}

impl fmt::Debug for Struct<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Struct")
            .field("segment", &self.seg.id())
            .field("off", &self.off.0)
            .field("size", &self.size)
            .finish()
    }
}

impl fmt::Debug for List<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("List")
            .field("segment", &self.seg.id())
            .field("off", &self.off.0)
            .field("length", &self.length)
            .field("size", &self.size)
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl fmt::Debug for Interface<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Interface")
            .field("capability", &self.cap)
            .finish()
    }
}

impl fmt::Debug for Pointer<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Pointer::Null => fmt.write_str("Null"),
            Pointer::Struct(st) => st.fmt(fmt),
            Pointer::List(list) => list.fmt(fmt),
            Pointer::Interface(interface) => interface.fmt(fmt),
        }
    }
}

impl fmt::Debug for PointerList<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("PointerList")
            .field("list", &self.list)
            .finish()
    }
}
