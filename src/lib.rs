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

//! The pointer and segment layer of the Cap'n Proto data interchange format.
//!
//! Cap'n Proto is a zero-copy, little-endian, 64-bit-word-aligned
//! serialization format. A [`Message`] is a collection of segments (byte
//! arenas), and structured objects are addressed through 64-bit pointer words
//! that may refer to locations in the same segment or, via far pointers, to
//! other segments.
//!
//! This crate decodes those pointer words into typed views ([`Struct`],
//! [`List`], [`Interface`]), upholds the safety budgets that bound untrusted
//! input (depth limit, read-traversal limit, address overflow, tag-word
//! validity), and, symmetrically, writes pointer words that correctly encode
//! inter-segment references, allocating landing pads when necessary.
//!
//! Typical use:
//!
//! ```
//! use capnp_layout::{equal, HeapAllocator, Message, ReaderOptions};
//!
//! # fn main() -> capnp_layout::Result<()> {
//! // A single-segment message: a pointer word at address 0 naming a
//! // one-word struct at address 8.
//! let words = &[
//!     capnp_layout::word(0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
//!     capnp_layout::word(0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08),
//! ];
//! let reader = Message::from_segments(
//!     vec![capnp_layout::Word::words_to_bytes(words).to_vec()],
//!     ReaderOptions::new(),
//! )?;
//! let value = reader.root()?.get(0)?;
//!
//! // Deep-copy the value into a freshly built message.
//! let builder = Message::new(HeapAllocator::new());
//! builder.root()?.set(0, value)?;
//! assert!(equal(value, builder.root()?.get(0)?)?);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use core::fmt;

pub mod capability;
pub mod equality;
pub mod layout;
pub mod message;
pub mod segment;
pub mod units;
pub mod wire;

mod arena;
mod read_limiter;


pub use crate::capability::ClientHook;
pub use crate::equality::equal;
pub use crate::layout::{Interface, List, ListEncoding, Pointer, PointerList, Struct};
pub use crate::message::{
    AllocationStrategy, Allocator, HeapAllocator, Message, ReaderOptions, DEFAULT_READER_OPTIONS,
};
pub use crate::segment::Segment;
pub use crate::units::{Address, CapabilityIndex, SegmentId, Size};
pub use crate::wire::{ElementSize, ObjectSize, PointerOffset, WirePointer, WirePointerKind};

/// 8 bytes, aligned to the word size. All pointers, headers, and tags on the
/// wire are sequences of `Word`s.
#[repr(C, align(8))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Word {
    raw_content: [u8; 8],
}

/// Constructs a word with the given bytes, in wire (little-endian) order.
#[allow(clippy::too_many_arguments)]
pub const fn word(b0: u8, b1: u8, b2: u8, b3: u8, b4: u8, b5: u8, b6: u8, b7: u8) -> Word {
    Word {
        raw_content: [b0, b1, b2, b3, b4, b5, b6, b7],
    }
}

impl Word {
    /// Converts a slice of words into a slice of bytes.
    pub fn words_to_bytes(words: &[Word]) -> &[u8] {
        // `Word` is `#[repr(C, align(8))]` over `[u8; 8]`, so the cast is valid.
        unsafe { core::slice::from_raw_parts(words.as_ptr() as *const u8, words.len() * 8) }
    }
}

/// The general error type used by the crate.
///
/// Every fallible operation in the pointer layer fails with exactly one
/// [`ErrorKind`]; errors bubble up to the original caller unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
}

/// The kinds of errors that the pointer layer can produce.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A pointer resolved to a region outside the bounds of its segment.
    PointerOutOfBounds,

    /// A far-pointer landing pad was malformed: wrong kind, nonzero tag
    /// offset, or a nonexistent segment.
    BadLandingPad,

    /// A composite-list tag word was not struct-shaped.
    BadCompositeTag,

    /// An `other`-variant pointer that is not a recognized capability
    /// pointer.
    UnknownPointerType,

    /// A declared object size was invalid.
    InvalidObjectSize,

    /// A list's element size was inconsistent with its referent.
    MismatchedElementSize,

    /// The message's read-traversal budget was exhausted.
    ReadLimitExceeded,

    /// A pointer-dereference chain exceeded the depth budget.
    DepthLimitExceeded,

    /// Arithmetic overflow in an address or size computation.
    Overflow,

    /// A non-pointer bounds violation.
    OutOfBounds,

    /// A recursive copy exceeded the copy depth guard.
    CopyDepthLimitExceeded,

    /// A copy's source and destination regions overlap.
    OverlappingCopy,

    /// An invalid list length/size combination.
    InvalidListSize,

    /// A segment's length is not a multiple of 8 bytes.
    UnalignedSegment,
}

impl Error {
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self { kind }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::PointerOutOfBounds => write!(fmt, "message contains out-of-bounds pointer"),
            Self::BadLandingPad => write!(fmt, "message contains invalid far pointer landing pad"),
            Self::BadCompositeTag => write!(fmt, "composite list tag word is not struct-shaped"),
            Self::UnknownPointerType => write!(fmt, "message contains unknown pointer type"),
            Self::InvalidObjectSize => write!(fmt, "invalid object size"),
            Self::MismatchedElementSize => write!(fmt, "mismatched list element size"),
            Self::ReadLimitExceeded => write!(fmt, "read traversal limit exceeded"),
            Self::DepthLimitExceeded => write!(fmt, "pointer depth limit exceeded"),
            Self::Overflow => write!(fmt, "address or size overflow"),
            Self::OutOfBounds => write!(fmt, "address out of bounds"),
            Self::CopyDepthLimitExceeded => write!(fmt, "copy recursion too deep"),
            Self::OverlappingCopy => write!(fmt, "overlapping data on copy"),
            Self::InvalidListSize => write!(fmt, "invalid list size"),
            Self::UnalignedSegment => write!(fmt, "segment length is not a multiple of 8 bytes"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.kind.fmt(fmt)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// The general result type used by the crate.
pub type Result<T> = core::result::Result<T, Error>;
