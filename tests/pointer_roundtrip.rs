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

//! Write-then-read round trips across the landing-pad matrix, plus deep
//! copies between messages.

use capnp_layout::{
    equal, word, Address, AllocationStrategy, ClientHook, ErrorKind, HeapAllocator, Interface,
    ListEncoding, Message, Pointer, PointerList, ReaderOptions, Word,
};

fn reader(segments: &[&[Word]]) -> Message {
    let segments: Vec<Vec<u8>> = segments
        .iter()
        .map(|words| Word::words_to_bytes(words).to_vec())
        .collect();
    Message::from_segments(segments, ReaderOptions::new()).unwrap()
}

#[test]
fn null_round_trip() {
    let builder = Message::new(HeapAllocator::new());
    builder.root().unwrap().set(0, Pointer::Null).unwrap();
    let segment = builder.segment(0).unwrap();
    assert_eq!(segment.read_u64(Address(0)), 0);
    assert!(builder.root().unwrap().get(0).unwrap().is_null());
}

#[test]
fn cross_message_copy_of_a_struct_tree() {
    // A struct with one data word and two pointers: a byte list and a
    // one-word struct.
    let source = reader(&[&[
        word(0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x00),
        word(0xde, 0xad, 0xbe, 0xef, 0x00, 0x00, 0x00, 0x00),
        word(0x05, 0x00, 0x00, 0x00, 0x2a, 0x00, 0x00, 0x00),
        word(0x04, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
        word(0x01, 0x02, 0x03, 0x04, 0x05, 0x00, 0x00, 0x00),
        word(0x2a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ]]);
    let original = source.root().unwrap().get(0).unwrap();

    let builder = Message::new(HeapAllocator::new());
    builder.root().unwrap().set(0, original).unwrap();
    let copy = builder.root().unwrap().get(0).unwrap();
    assert!(equal(original, copy).unwrap());
    assert!(equal(copy, original).unwrap());

    // The copy owns its bytes: mutating it leaves the source untouched and
    // the two values no longer equal.
    match copy {
        Pointer::Struct(st) => st.segment().write_u8(st.address(), 0xff),
        ref other => panic!("expected a struct, got {other:?}"),
    }
    assert!(!equal(original, copy).unwrap());
    match original {
        Pointer::Struct(st) => assert_eq!(st.data()[0], 0xde),
        ref other => panic!("expected a struct, got {other:?}"),
    }
}

#[test]
fn same_message_write_shares_the_referent() {
    let source = reader(&[&[
        word(0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
        word(0x11, 0x22, 0x33, 0x44, 0x00, 0x00, 0x00, 0x00),
    ]]);
    let builder = Message::new(HeapAllocator::new());
    builder
        .root()
        .unwrap()
        .set(0, source.root().unwrap().get(0).unwrap())
        .unwrap();

    let first = builder.root().unwrap().get(0).unwrap();
    let len_before = builder.segment(0).unwrap().len();
    // Rewriting the root with a value that already lives here reuses it in
    // place: no new bytes, and the decoded referent sits where it was.
    builder.root().unwrap().set(0, first).unwrap();
    assert_eq!(builder.segment(0).unwrap().len(), len_before);
    match (first, builder.root().unwrap().get(0).unwrap()) {
        (Pointer::Struct(a), Pointer::Struct(b)) => {
            assert_eq!(a.segment().id(), b.segment().id());
            assert_eq!(a.address(), b.address());
        }
        other => panic!("expected structs, got {other:?}"),
    }
}

#[test]
fn force_copy_shares_no_bytes() {
    let source = reader(&[&[
        word(0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
        word(0x11, 0x22, 0x33, 0x44, 0x00, 0x00, 0x00, 0x00),
    ]]);
    let builder = Message::new(HeapAllocator::new());
    builder
        .root()
        .unwrap()
        .set(0, source.root().unwrap().get(0).unwrap())
        .unwrap();
    let first = builder.root().unwrap().get(0).unwrap();
    let first_addr = match first {
        Pointer::Struct(st) => (st.segment().id(), st.address()),
        ref other => panic!("expected a struct, got {other:?}"),
    };

    builder
        .segment(0)
        .unwrap()
        .write_ptr(Address(0), first, true)
        .unwrap();
    let second = builder.root().unwrap().get(0).unwrap();
    match second {
        Pointer::Struct(st) => {
            assert_ne!((st.segment().id(), st.address()), first_addr);
        }
        ref other => panic!("expected a struct, got {other:?}"),
    }
    assert!(equal(first, second).unwrap());
}

#[test]
fn far_pointer_with_in_segment_landing_pad() {
    let source = reader(&[&[
        word(0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
        word(0x2a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ]]);
    let original = source.root().unwrap().get(0).unwrap();

    // One word of first-segment capacity: the root pointer fills it, so the
    // copied struct spills to a second segment with room to spare.
    let builder = Message::new(HeapAllocator::new().first_segment_words(1));
    builder.root().unwrap().set(0, original).unwrap();

    assert_eq!(builder.segment_count(), 2);
    let root_word = builder.segment(0).unwrap().read_u64(Address(0));
    // Kind bits 10, single-far.
    assert_eq!(root_word & 7, 2);
    // Object word plus its landing pad.
    assert_eq!(builder.segment(1).unwrap().len(), 16);

    let copy = builder.root().unwrap().get(0).unwrap();
    match copy {
        Pointer::Struct(st) => assert_eq!(st.segment().id(), 1),
        ref other => panic!("expected a struct, got {other:?}"),
    }
    assert!(equal(original, copy).unwrap());
}

#[test]
fn double_far_pointer_when_the_source_segment_is_full() {
    let source = reader(&[&[
        word(0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
        word(0x2a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ]]);
    let original = source.root().unwrap().get(0).unwrap();

    // Fixed-size single-word segments: the copied struct exactly fills its
    // segment, leaving no room for a landing pad.
    let builder = Message::new(
        HeapAllocator::new()
            .first_segment_words(1)
            .allocation_strategy(AllocationStrategy::FixedSize),
    );
    builder.root().unwrap().set(0, original).unwrap();

    assert_eq!(builder.segment_count(), 3);
    let root_word = builder.segment(0).unwrap().read_u64(Address(0));
    // Kind bits 10 with the double-far flag.
    assert_eq!(root_word & 7, 6);

    let copy = builder.root().unwrap().get(0).unwrap();
    match copy {
        Pointer::Struct(st) => {
            assert_eq!(st.segment().id(), 1);
            assert_eq!(st.address(), Address(0));
        }
        ref other => panic!("expected a struct, got {other:?}"),
    }
    assert!(equal(original, copy).unwrap());
}

#[test]
fn composite_list_round_trip() {
    // Two {1 data word, 1 pointer} elements whose pointers both name the
    // same inner struct.
    let source = reader(&[&[
        word(0x01, 0x00, 0x00, 0x00, 0x27, 0x00, 0x00, 0x00),
        word(0x08, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00),
        word(0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
        word(0x08, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
        word(0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
        word(0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
        word(0x2a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ]]);
    let original = source.root().unwrap().get(0).unwrap();

    let builder = Message::new(HeapAllocator::new());
    builder.root().unwrap().set(0, original).unwrap();
    let copy = builder.root().unwrap().get(0).unwrap();
    match copy {
        Pointer::List(list) => assert_eq!(list.encoding(), ListEncoding::Composite),
        ref other => panic!("expected a list, got {other:?}"),
    }
    assert!(equal(original, copy).unwrap());
}

#[test]
fn bit_list_round_trip() {
    let source = reader(&[&[
        word(0x01, 0x00, 0x00, 0x00, 0x51, 0x00, 0x00, 0x00),
        word(0x75, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ]]);
    let original = source.root().unwrap().get(0).unwrap();

    let builder = Message::new(HeapAllocator::new());
    builder.root().unwrap().set(0, original).unwrap();
    let copy = builder.root().unwrap().get(0).unwrap();
    match copy {
        Pointer::List(list) => {
            assert_eq!(list.encoding(), ListEncoding::Bit);
            assert_eq!(list.len(), 10);
            assert_eq!(list.segment().read_u8(list.address()), 0x75);
        }
        ref other => panic!("expected a list, got {other:?}"),
    }
    assert!(equal(original, copy).unwrap());
}

#[test]
fn pointer_list_round_trip() {
    let source = reader(&[&[
        word(0x01, 0x00, 0x00, 0x00, 0x16, 0x00, 0x00, 0x00),
        word(0x04, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
        word(0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
        word(0x2a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ]]);
    let original = source.root().unwrap().get(0).unwrap();

    let builder = Message::new(HeapAllocator::new());
    builder.root().unwrap().set(0, original).unwrap();
    match builder.root().unwrap().get(0).unwrap() {
        Pointer::List(list) => {
            let pointers = PointerList::try_from(list).unwrap();
            assert_eq!(pointers.len(), 2);
            assert!(matches!(pointers.get(0).unwrap(), Pointer::Struct(_)));
            assert!(pointers.get(1).unwrap().is_null());
        }
        other => panic!("expected a list, got {other:?}"),
    }
    assert!(equal(original, builder.root().unwrap().get(0).unwrap()).unwrap());
}

#[test]
fn empty_struct_round_trip() {
    let source = reader(&[&[word(0xfc, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00)]]);
    let original = source.root().unwrap().get(0).unwrap();

    let builder = Message::new(HeapAllocator::new());
    builder.root().unwrap().set(0, original).unwrap();
    // The emitted word must stay distinguishable from null.
    assert_ne!(builder.segment(0).unwrap().read_u64(Address(0)), 0);
    match builder.root().unwrap().get(0).unwrap() {
        Pointer::Struct(st) => assert_eq!(st.size().total().0, 0),
        other => panic!("expected a struct, got {other:?}"),
    }
}

#[derive(Clone, Copy)]
struct TestClient {
    brand: usize,
    ptr: usize,
}

impl ClientHook for TestClient {
    fn add_ref(&self) -> Box<dyn ClientHook> {
        Box::new(*self)
    }

    fn get_brand(&self) -> usize {
        self.brand
    }

    fn get_ptr(&self) -> usize {
        self.ptr
    }
}

#[test]
fn interface_copy_appends_to_the_capability_table() {
    let source = reader(&[&[word(0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00)]]);
    source.add_cap(Some(Box::new(TestClient { brand: 1, ptr: 7 })));
    let original = source.root().unwrap().get(0).unwrap();

    let builder = Message::new(HeapAllocator::new());
    builder.root().unwrap().set(0, original).unwrap();
    assert_eq!(builder.cap_count(), 1);

    let copy = builder.root().unwrap().get(0).unwrap();
    match copy {
        Pointer::Interface(interface) => {
            assert_eq!(interface.capability(), 0);
            assert_eq!(interface.client().unwrap().get_ptr(), 7);
        }
        ref other => panic!("expected an interface, got {other:?}"),
    }
    assert!(equal(original, copy).unwrap());

    // Writing a capability that already belongs to this message reuses its
    // index instead of appending.
    builder.root().unwrap().set(0, copy).unwrap();
    assert_eq!(builder.cap_count(), 1);
}

#[test]
fn interface_written_from_a_fresh_capability() {
    let builder = Message::new(HeapAllocator::new());
    let index = builder.add_cap(Some(Box::new(TestClient { brand: 1, ptr: 3 })));
    let interface = Interface::new(builder.segment(0).unwrap(), index);
    builder
        .root()
        .unwrap()
        .set(0, Pointer::Interface(interface))
        .unwrap();
    match builder.root().unwrap().get(0).unwrap() {
        Pointer::Interface(read_back) => {
            assert_eq!(read_back.capability(), index);
            assert_eq!(read_back.client().unwrap().get_ptr(), 3);
        }
        other => panic!("expected an interface, got {other:?}"),
    }
}

#[test]
fn set_ptr_overwrites_a_pointer_slot() {
    // A struct with one data word and two pointers: a byte list and a
    // one-word struct.
    let source = reader(&[&[
        word(0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x00),
        word(0xde, 0xad, 0xbe, 0xef, 0x00, 0x00, 0x00, 0x00),
        word(0x05, 0x00, 0x00, 0x00, 0x2a, 0x00, 0x00, 0x00),
        word(0x04, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
        word(0x01, 0x02, 0x03, 0x04, 0x05, 0x00, 0x00, 0x00),
        word(0x2a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ]]);
    let builder = Message::new(HeapAllocator::new());
    builder
        .root()
        .unwrap()
        .set(0, source.root().unwrap().get(0).unwrap())
        .unwrap();
    match builder.root().unwrap().get(0).unwrap() {
        Pointer::Struct(st) => {
            assert!(st.has_ptr(1));
            st.set_ptr(1, Pointer::Null).unwrap();
            assert!(!st.has_ptr(1));
            assert!(st.ptr(1).unwrap().is_null());
            let err = st.set_ptr(2, Pointer::Null).unwrap_err();
            assert_eq!(err.kind, ErrorKind::OutOfBounds);
        }
        other => panic!("expected a struct, got {other:?}"),
    }
    assert!(!equal(
        source.root().unwrap().get(0).unwrap(),
        builder.root().unwrap().get(0).unwrap()
    )
    .unwrap());
}

#[test]
fn writing_into_an_adopted_message_spills_to_a_new_segment() {
    let source = reader(&[&[
        word(0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
        word(0x2a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ]]);
    // Adopted segments are frozen, so the copy lands in a fresh segment
    // reached through a far pointer.
    let target = reader(&[&[word(0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00)]]);
    let original = source.root().unwrap().get(0).unwrap();
    target.root().unwrap().set(0, original).unwrap();
    assert!(target.segment_count() > 1);
    assert!(equal(original, target.root().unwrap().get(0).unwrap()).unwrap());
}

#[test]
fn write_destination_must_be_in_bounds() {
    let builder = Message::new(HeapAllocator::new());
    let err = builder
        .segment(0)
        .unwrap()
        .write_ptr(Address(8), Pointer::Null, false)
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::OutOfBounds);
}
