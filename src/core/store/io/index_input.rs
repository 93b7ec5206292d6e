// Copyright 2019 Zhizhesihai (Beijing) Technology Limited.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

use core::store::io::DataInput;

use error::Result;

/// Random-access input over one file of a `Directory`.
///
/// Clones are independent cursors over the same immutable bytes, which is how
/// every enumerator gets a private read position.
pub trait IndexInput: DataInput + Send + Sync {
    fn clone(&self) -> Result<Box<dyn IndexInput>>;

    fn file_pointer(&self) -> i64;
    fn seek(&mut self, pos: i64) -> Result<()>;
    fn len(&self) -> u64;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn name(&self) -> &str;

    /// Creates a slice of this input with the given description, offset and length.
    /// The slice is positioned at its own offset zero.
    fn slice(&self, description: &str, offset: i64, length: i64) -> Result<Box<dyn IndexInput>>;
}

impl<T: IndexInput + ?Sized> IndexInput for Box<T> {
    fn clone(&self) -> Result<Box<dyn IndexInput>> {
        IndexInput::clone(&**self)
    }

    fn file_pointer(&self) -> i64 {
        (**self).file_pointer()
    }

    fn seek(&mut self, pos: i64) -> Result<()> {
        (**self).seek(pos)
    }

    fn len(&self) -> u64 {
        (**self).len()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn slice(&self, description: &str, offset: i64, length: i64) -> Result<Box<dyn IndexInput>> {
        (**self).slice(description, offset, length)
    }
}
