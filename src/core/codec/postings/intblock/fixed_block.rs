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

use core::codec::codec_util;
use core::codec::postings::intblock::{
    IntIndex, IntIndexInput, IntIndexOutput, IntIndexReader, IntStreamFactory,
};
use core::codec::postings::DEFAULT_INT_BLOCK_SIZE;
use core::store::directory::Directory;
use core::store::io::{DataInput, DataOutput, IndexInput, IndexOutput};
use core::store::IOContext;

use error::ErrorKind::{CorruptIndex, IllegalArgument};
use error::Result;

use std::io::Write;

pub const FIXED_INT_BLOCK_CODEC: &str = "FixedIntBlockStream";
pub const FIXED_INT_BLOCK_VERSION_START: i32 = 0;
pub const FIXED_INT_BLOCK_VERSION_CURRENT: i32 = FIXED_INT_BLOCK_VERSION_START;

/// Bookmark of a block stream: the file pointer of a block and the offset
/// of an int inside it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FixedIntBlockIndex {
    fp: i64,
    upto: i32,
    last_fp: i64,
    last_upto: i32,
}

impl FixedIntBlockIndex {
    pub fn fp(&self) -> i64 {
        self.fp
    }

    pub fn upto(&self) -> i32 {
        self.upto
    }
}

impl IntIndex for FixedIntBlockIndex {
    fn copy_from(&mut self, other: &Self, copy_last: bool) {
        self.fp = other.fp;
        self.upto = other.upto;
        if copy_last {
            self.last_fp = other.fp;
            self.last_upto = other.upto;
        }
    }

    fn write(&mut self, out: &mut impl DataOutput, absolute: bool) -> Result<()> {
        if absolute {
            out.write_vint(self.upto)?;
            out.write_vlong(self.fp)?;
        } else if self.fp == self.last_fp {
            // same block
            debug_assert!(self.upto >= self.last_upto);
            let upto_delta = self.upto - self.last_upto;
            out.write_vint(upto_delta << 1 | 1)?;
        } else {
            // new block
            out.write_vint(self.upto << 1)?;
            out.write_vlong(self.fp - self.last_fp)?;
        }
        self.last_upto = self.upto;
        self.last_fp = self.fp;
        Ok(())
    }

    fn read(&mut self, input: &mut impl DataInput, absolute: bool) -> Result<()> {
        if absolute {
            self.upto = input.read_vint()?;
            self.fp = input.read_vlong()?;
        } else {
            let code = input.read_vint()?;
            if code & 1 != 0 {
                self.upto += (code as u32 >> 1) as i32;
            } else {
                self.upto = (code as u32 >> 1) as i32;
                self.fp += input.read_vlong()?;
            }
        }
        Ok(())
    }
}

/// Buffers ints into fixed size blocks, each written as `block_size` vints.
pub struct FixedIntBlockIndexOutput {
    out: Box<dyn IndexOutput>,
    pending: Vec<i32>,
    upto: usize,
}

impl FixedIntBlockIndexOutput {
    pub fn new(mut out: Box<dyn IndexOutput>, block_size: usize) -> Result<Self> {
        if block_size == 0 || block_size > i32::max_value() as usize {
            bail!(IllegalArgument(format!("invalid block size {}", block_size)));
        }
        codec_util::write_header(
            &mut out,
            FIXED_INT_BLOCK_CODEC,
            FIXED_INT_BLOCK_VERSION_CURRENT,
        )?;
        out.write_vint(block_size as i32)?;
        Ok(FixedIntBlockIndexOutput {
            out,
            pending: vec![0; block_size],
            upto: 0,
        })
    }

    fn flush_block(&mut self) -> Result<()> {
        for &v in &self.pending {
            self.out.write_vint(v)?;
        }
        Ok(())
    }
}

impl IntIndexOutput for FixedIntBlockIndexOutput {
    type Index = FixedIntBlockIndex;

    fn write(&mut self, v: i32) -> Result<()> {
        if v < 0 {
            bail!(IllegalArgument(format!(
                "cannot write negative int {} to {}",
                v,
                self.out.name()
            )));
        }
        self.pending[self.upto] = v;
        self.upto += 1;
        if self.upto == self.pending.len() {
            self.flush_block()?;
            self.upto = 0;
        }
        Ok(())
    }

    fn mark(&self, index: &mut FixedIntBlockIndex) {
        index.fp = self.out.file_pointer();
        index.upto = self.upto as i32;
    }

    fn close(&mut self) -> Result<()> {
        if self.upto > 0 {
            // zero pad the partial block
            for v in &mut self.pending[self.upto..] {
                *v = 0;
            }
            self.flush_block()?;
            self.upto = 0;
        }
        codec_util::write_footer(&mut self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

pub struct FixedIntBlockIndexInput {
    input: Box<dyn IndexInput>,
    block_size: usize,
    data_start: i64,
}

impl FixedIntBlockIndexInput {
    pub fn open(mut input: Box<dyn IndexInput>) -> Result<FixedIntBlockIndexInput> {
        codec_util::check_header(
            &mut input,
            FIXED_INT_BLOCK_CODEC,
            FIXED_INT_BLOCK_VERSION_START,
            FIXED_INT_BLOCK_VERSION_CURRENT,
        )?;
        let block_size = input.read_vint()?;
        if block_size <= 0 {
            bail!(CorruptIndex(format!(
                "invalid block size {} in {}",
                block_size,
                input.name()
            )));
        }
        let data_start = input.file_pointer();
        codec_util::retrieve_checksum(&mut input)?;
        Ok(FixedIntBlockIndexInput {
            input,
            block_size: block_size as usize,
            data_start,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

impl IntIndexInput for FixedIntBlockIndexInput {
    type Index = FixedIntBlockIndex;
    type Reader = FixedIntBlockReader;

    fn reader(&self) -> Result<FixedIntBlockReader> {
        let mut input = self.input.clone()?;
        input.seek(self.data_start)?;
        Ok(FixedIntBlockReader {
            input,
            pending: vec![0; self.block_size],
            upto: self.block_size,
            last_block_fp: -1,
            pending_fp: 0,
            seek_pending: false,
        })
    }

    fn check_integrity(&self) -> Result<()> {
        codec_util::checksum_entire_file(self.input.as_ref())?;
        Ok(())
    }
}

/// Cursor over a block stream. Seeks are lazy, the target block is only
/// loaded by the next call to `next`.
pub struct FixedIntBlockReader {
    input: Box<dyn IndexInput>,
    pending: Vec<i32>,
    upto: usize,
    last_block_fp: i64,
    pending_fp: i64,
    seek_pending: bool,
}

impl FixedIntBlockReader {
    fn read_block(&mut self) -> Result<()> {
        for v in &mut self.pending {
            *v = self.input.read_vint()?;
        }
        Ok(())
    }
}

impl IntIndexReader for FixedIntBlockReader {
    type Index = FixedIntBlockIndex;

    fn next(&mut self) -> Result<i32> {
        if self.seek_pending {
            self.input.seek(self.pending_fp)?;
            self.last_block_fp = self.pending_fp;
            self.read_block()?;
            self.seek_pending = false;
        } else if self.upto == self.pending.len() {
            self.last_block_fp = self.input.file_pointer();
            self.read_block()?;
            self.upto = 0;
        }
        let v = self.pending[self.upto];
        self.upto += 1;
        Ok(v)
    }

    fn seek(&mut self, index: &FixedIntBlockIndex) -> Result<()> {
        let upto = index.upto as usize;
        if index.upto < 0 || upto >= self.pending.len() {
            bail!(CorruptIndex(format!(
                "block offset {} out of range for block size {}",
                index.upto,
                self.pending.len()
            )));
        }
        if self.seek_pending || index.fp != self.last_block_fp {
            self.pending_fp = index.fp;
            self.seek_pending = true;
        }
        self.upto = upto;
        Ok(())
    }
}

/// Int streams buffered in fixed size blocks.
#[derive(Clone, Debug)]
pub struct FixedIntBlockStreamFactory {
    block_size: usize,
}

impl FixedIntBlockStreamFactory {
    pub fn new(block_size: usize) -> FixedIntBlockStreamFactory {
        FixedIntBlockStreamFactory { block_size }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

impl Default for FixedIntBlockStreamFactory {
    fn default() -> Self {
        FixedIntBlockStreamFactory::new(DEFAULT_INT_BLOCK_SIZE as usize)
    }
}

impl IntStreamFactory for FixedIntBlockStreamFactory {
    type Index = FixedIntBlockIndex;
    type Output = FixedIntBlockIndexOutput;
    type Input = FixedIntBlockIndexInput;

    fn name(&self) -> &str {
        FIXED_INT_BLOCK_CODEC
    }

    fn create_output<D: Directory>(
        &self,
        dir: &D,
        file_name: &str,
        context: &IOContext,
    ) -> Result<FixedIntBlockIndexOutput> {
        debug!(
            "creating block stream {} in {}, block_size={}",
            file_name, dir, self.block_size
        );
        let out = dir.create_output(file_name, context)?;
        FixedIntBlockIndexOutput::new(Box::new(out), self.block_size)
    }

    fn open_input<D: Directory>(
        &self,
        dir: &D,
        file_name: &str,
        context: &IOContext,
    ) -> Result<FixedIntBlockIndexInput> {
        let input = FixedIntBlockIndexInput::open(dir.open_input(file_name, context)?)?;
        debug!(
            "opened block stream {} in {}, block_size={}",
            file_name,
            dir,
            input.block_size()
        );
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::codec::postings::intblock::VIntStreamFactory;
    use core::store::directory::RAMDirectory;
    use error::ErrorKind;

    fn write_stream(dir: &RAMDirectory, block_size: usize, count: i32) -> Vec<FixedIntBlockIndex> {
        let factory = FixedIntBlockStreamFactory::new(block_size);
        let mut out = factory
            .create_output(dir, "_0.doc", &IOContext::Default)
            .unwrap();
        let mut marks = Vec::new();
        for i in 0..count {
            marks.push(out.index());
            out.write(i).unwrap();
        }
        out.close().unwrap();
        marks
    }

    #[test]
    fn test_sequential_read_with_padding() {
        let dir = RAMDirectory::new();
        write_stream(&dir, 4, 10);
        // the reader recovers the block size from the header
        let input = FixedIntBlockStreamFactory::default()
            .open_input(&dir, "_0.doc", &IOContext::Default)
            .unwrap();
        assert_eq!(input.block_size(), 4);
        input.check_integrity().unwrap();
        let mut reader = input.reader().unwrap();
        for i in 0..10 {
            assert_eq!(reader.next().unwrap(), i);
        }
        // the partial last block is zero padded
        assert_eq!(reader.next().unwrap(), 0);
        assert_eq!(reader.next().unwrap(), 0);
    }

    #[test]
    fn test_relative_bookmarks() {
        let dir = RAMDirectory::new();
        let marks = write_stream(&dir, 4, 23);
        assert_eq!(marks[5].upto(), 1);
        assert_eq!(marks[4].fp(), marks[7].fp());
        assert!(marks[8].fp() > marks[7].fp());

        let mut meta = Vec::new();
        let mut last = FixedIntBlockIndex::default();
        for (i, index) in marks.iter().enumerate() {
            last.copy_from(index, false);
            last.write(&mut meta, i % 6 == 0).unwrap();
        }

        let input = FixedIntBlockStreamFactory::new(4)
            .open_input(&dir, "_0.doc", &IOContext::Default)
            .unwrap();
        let mut reader = input.reader().unwrap();
        let mut decoded = FixedIntBlockIndex::default();
        let mut bytes: &[u8] = &meta;
        for (i, index) in marks.iter().enumerate() {
            decoded.read(&mut bytes, i % 6 == 0).unwrap();
            assert_eq!(decoded.fp(), index.fp());
            assert_eq!(decoded.upto(), index.upto());
            reader.seek(&decoded).unwrap();
            assert_eq!(reader.next().unwrap(), i as i32);
        }
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_seek_within_loaded_block() {
        let dir = RAMDirectory::new();
        let marks = write_stream(&dir, 8, 20);
        let input = FixedIntBlockStreamFactory::new(8)
            .open_input(&dir, "_0.doc", &IOContext::Default)
            .unwrap();
        let mut reader = input.reader().unwrap();
        reader.seek(&marks[9]).unwrap();
        assert_eq!(reader.next().unwrap(), 9);
        // backwards inside the same block
        reader.seek(&marks[8]).unwrap();
        assert_eq!(reader.next().unwrap(), 8);
        reader.seek(&marks[2]).unwrap();
        assert_eq!(reader.next().unwrap(), 2);
        assert_eq!(reader.next().unwrap(), 3);
        reader.seek(&marks[17]).unwrap();
        assert_eq!(reader.next().unwrap(), 17);
    }

    #[test]
    fn test_header_mismatch() {
        let dir = RAMDirectory::new();
        let ctx = IOContext::Default;
        let mut out = VIntStreamFactory.create_output(&dir, "_0.doc", &ctx).unwrap();
        out.write(3).unwrap();
        out.close().unwrap();

        match FixedIntBlockStreamFactory::default().open_input(&dir, "_0.doc", &ctx) {
            Err(e) => match *e.kind() {
                ErrorKind::CorruptIndex(_) => {}
                ref k => panic!("unexpected error {:?}", k),
            },
            Ok(_) => panic!("vint stream opened as block stream"),
        }
    }
}
