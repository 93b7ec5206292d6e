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

//! Streams of non-negative ints addressed through bookmarks.
//!
//! An `IntIndexOutput` appends ints and hands out `IntIndex` bookmarks of its
//! current position. A bookmark can be written into another stream, either
//! absolute or as a delta against the previously written bookmark, and read
//! back to reposition an `IntIndexReader`.

mod fixed_block;

pub use self::fixed_block::*;

mod vint;

pub use self::vint::*;

use core::store::directory::Directory;
use core::store::io::{DataInput, DataOutput};
use core::store::IOContext;

use error::Result;

use std::fmt::Debug;

/// A bookmark into an int stream.
///
/// Besides the position itself every bookmark remembers the last position
/// it wrote or read, which is the base of the relative encoding.
pub trait IntIndex: Clone + Default + Debug + Send + Sync + 'static {
    /// Copies the position of `other`. With `copy_last` the delta base is
    /// moved to that position as well.
    fn copy_from(&mut self, other: &Self, copy_last: bool);

    /// Writes this bookmark, absolute or relative to the last one written.
    fn write(&mut self, out: &mut impl DataOutput, absolute: bool) -> Result<()>;

    /// Reads a bookmark written by `write` with the same `absolute` flag.
    fn read(&mut self, input: &mut impl DataInput, absolute: bool) -> Result<()>;
}

/// Writes ints, which must be >= 0.
pub trait IntIndexOutput {
    type Index: IntIndex;

    fn write(&mut self, v: i32) -> Result<()>;

    /// Records the current write position into `index`.
    fn mark(&self, index: &mut Self::Index);

    /// Returns a bookmark of the current write position.
    fn index(&self) -> Self::Index {
        let mut index = Self::Index::default();
        self.mark(&mut index);
        index
    }

    /// Flushes pending ints and writes the footer.
    fn close(&mut self) -> Result<()>;
}

/// An open int stream, shared by every cursor over it.
pub trait IntIndexInput: Send + Sync {
    type Index: IntIndex;
    type Reader: IntIndexReader<Index = Self::Index>;

    /// Returns an independent cursor.
    fn reader(&self) -> Result<Self::Reader>;

    fn check_integrity(&self) -> Result<()>;
}

/// Pull cursor over an int stream.
pub trait IntIndexReader: Send {
    type Index: IntIndex;

    fn next(&mut self) -> Result<i32>;

    fn seek(&mut self, index: &Self::Index) -> Result<()>;
}

/// Creates the int streams used by the separate streams codec.
pub trait IntStreamFactory: Clone + Send + Sync + 'static {
    type Index: IntIndex;
    type Output: IntIndexOutput<Index = Self::Index>;
    type Input: IntIndexInput<Index = Self::Index>;

    fn name(&self) -> &str;

    fn create_output<D: Directory>(
        &self,
        dir: &D,
        file_name: &str,
        context: &IOContext,
    ) -> Result<Self::Output>;

    fn open_input<D: Directory>(
        &self,
        dir: &D,
        file_name: &str,
        context: &IOContext,
    ) -> Result<Self::Input>;
}

pub type IntReader<F> = <<F as IntStreamFactory>::Input as IntIndexInput>::Reader;
