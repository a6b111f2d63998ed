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

//! Structural comparison of decoded pointers.

use core::cmp;
use core::ptr;

use crate::capability::clients_match;
use crate::layout::{Interface, List, ListEncoding, Pointer, Struct};
use crate::units::Size;
use crate::{Error, ErrorKind, Result};

/// Returns true iff `p1` and `p2` are equal.
///
/// Equality is defined to be:
///
/// - Two structs are equal iff all of their fields are equal. If one struct
///   has more fields than the other, the extra fields must all be zero.
/// - Two lists are equal iff they have the same length and their
///   corresponding elements are equal. If one list is a list of primitives
///   and the other is a list of structs, then the list of primitives is
///   treated as if it was a list of structs with the element value as the
///   sole field.
/// - Two interfaces are equal iff they refer to the same capability-table
///   index in the same message or their clients are the same capability.
/// - Two null pointers are equal.
/// - All other combinations of things are not equal.
///
/// Recursion is bounded by the depth budget already embedded in each view,
/// and reads performed along the way are charged against the read budgets of
/// the messages involved.
pub fn equal(p1: Pointer<'_>, p2: Pointer<'_>) -> Result<bool> {
    match (p1, p2) {
        (Pointer::Null, Pointer::Null) => Ok(true),
        (Pointer::Struct(s1), Pointer::Struct(s2)) => struct_equal(&s1, &s2),
        (Pointer::List(l1), Pointer::List(l2)) => list_equal(&l1, &l2),
        (Pointer::Interface(i1), Pointer::Interface(i2)) => interface_equal(&i1, &i2),
        _ => Ok(false),
    }
}

fn is_zero_filled(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0)
}

fn struct_equal(s1: &Struct<'_>, s2: &Struct<'_>) -> Result<bool> {
    {
        let data1 = s1.data();
        let data2 = s2.data();
        let data1: &[u8] = &data1;
        let data2: &[u8] = &data2;
        let common = cmp::min(data1.len(), data2.len());
        if data1[..common] != data2[..common] {
            return Ok(false);
        }
        // The data section of the larger struct only extends the smaller
        // one, so any extra bytes must be zero.
        if !is_zero_filled(&data1[common..]) || !is_zero_filled(&data2[common..]) {
            return Ok(false);
        }
    }
    let common = cmp::min(s1.size().pointers, s2.size().pointers);
    for i in 0..common {
        if !equal(s1.ptr(i)?, s2.ptr(i)?)? {
            return Ok(false);
        }
    }
    for i in common..s1.size().pointers {
        if s1.has_ptr(i) {
            return Ok(false);
        }
    }
    for i in common..s2.size().pointers {
        if s2.has_ptr(i) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn list_equal(l1: &List<'_>, l2: &List<'_>) -> Result<bool> {
    if l1.len() != l2.len() {
        return Ok(false);
    }
    if l1.encoding() != ListEncoding::Composite
        && l2.encoding() != ListEncoding::Composite
        && l1.size() != l2.size()
    {
        return Ok(false);
    }
    if l1.encoding() == ListEncoding::Bit && l2.encoding() == ListEncoding::Bit {
        let bytes = Size((l1.len() + 7) / 8);
        return Ok(*l1.segment().slice(l1.address(), bytes)
            == *l2.segment().slice(l2.address(), bytes));
    }
    if l1.size().pointers == 0 && l2.size().pointers == 0 && l1.size().data == l2.size().data {
        // Pure data lists can be compared bytewise; both regions were
        // validated when the lists were decoded.
        let total = l1
            .size()
            .total()
            .times(l1.len() as i32)
            .ok_or_else(|| Error::from_kind(ErrorKind::Overflow))?;
        return Ok(*l1.segment().slice(l1.address(), total)
            == *l2.segment().slice(l2.address(), total));
    }
    for i in 0..l1.len() {
        let e1 = l1.struct_element(i);
        let e2 = l2.struct_element(i);
        if !struct_equal(&e1, &e2)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn interface_equal(i1: &Interface<'_>, i2: &Interface<'_>) -> Result<bool> {
    if ptr::eq(i1.message(), i2.message()) {
        if i1.capability() == i2.capability() {
            return Ok(true);
        }
        // Distinct indices can still name the same client, but only once the
        // table has entries for both of them.
        let table_len = i1.message().cap_count();
        if i1.capability() as usize >= table_len || i2.capability() as usize >= table_len {
            return Ok(false);
        }
    }
    match (i1.client(), i2.client()) {
        (Some(c1), Some(c2)) => Ok(clients_match(&*c1, &*c2)),
        (None, None) => Ok(true),
        _ => Ok(false),
    }
}
