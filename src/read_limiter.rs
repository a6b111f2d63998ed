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

use core::cell::Cell;

use crate::units::ByteCount64;

/// The monotonically decreasing read-traversal budget of a message.
///
/// Deduction happens on every decode, even when the same bytes are
/// revisited through a different pointer; that bounds total work on
/// adversarial inputs that share substructure.
pub struct ReadLimiter {
    limit: Cell<ByteCount64>,
    error_on_limit_exceeded: bool,
}

impl ReadLimiter {
    pub fn new(limit: Option<ByteCount64>) -> ReadLimiter {
        match limit {
            Some(value) => ReadLimiter {
                limit: Cell::new(value),
                error_on_limit_exceeded: true,
            },
            None => ReadLimiter {
                limit: Cell::new(u64::MAX),
                error_on_limit_exceeded: false,
            },
        }
    }

    /// Deducts `amount` bytes from the budget, returning `false` once the
    /// budget is exceeded.
    #[inline]
    pub fn can_read(&self, amount: ByteCount64) -> bool {
        let current = self.limit.get();
        if amount > current && self.error_on_limit_exceeded {
            false
        } else {
            self.limit.set(current.wrapping_sub(amount));
            true
        }
    }
}
