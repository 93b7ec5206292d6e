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
use core::store::directory::Directory;
use core::store::io::{DataInput, DataOutput, IndexInput, IndexOutput};
use core::store::IOContext;

use error::ErrorKind::IllegalArgument;
use error::Result;

use std::io::Write;

pub const VINT_STREAM_CODEC: &str = "SingleIntStream";
pub const VINT_STREAM_VERSION_START: i32 = 0;
pub const VINT_STREAM_VERSION_CURRENT: i32 = VINT_STREAM_VERSION_START;

/// Bookmark of a vint stream, a plain file pointer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VIntIndex {
    fp: i64,
    last_fp: i64,
}

impl VIntIndex {
    pub fn fp(&self) -> i64 {
        self.fp
    }
}

impl IntIndex for VIntIndex {
    fn copy_from(&mut self, other: &Self, copy_last: bool) {
        self.fp = other.fp;
        if copy_last {
            self.last_fp = other.fp;
        }
    }

    fn write(&mut self, out: &mut impl DataOutput, absolute: bool) -> Result<()> {
        if absolute {
            out.write_vlong(self.fp)?;
        } else {
            out.write_vlong(self.fp - self.last_fp)?;
        }
        self.last_fp = self.fp;
        Ok(())
    }

    fn read(&mut self, input: &mut impl DataInput, absolute: bool) -> Result<()> {
        if absolute {
            self.fp = input.read_vlong()?;
        } else {
            self.fp += input.read_vlong()?;
        }
        Ok(())
    }
}

/// Writes every int as one vint.
pub struct VIntIndexOutput {
    out: Box<dyn IndexOutput>,
}

impl VIntIndexOutput {
    pub fn new(mut out: Box<dyn IndexOutput>) -> Result<VIntIndexOutput> {
        codec_util::write_header(&mut out, VINT_STREAM_CODEC, VINT_STREAM_VERSION_CURRENT)?;
        Ok(VIntIndexOutput { out })
    }
}

impl IntIndexOutput for VIntIndexOutput {
    type Index = VIntIndex;

    fn write(&mut self, v: i32) -> Result<()> {
        if v < 0 {
            bail!(IllegalArgument(format!(
                "cannot write negative int {} to {}",
                v,
                self.out.name()
            )));
        }
        self.out.write_vint(v)
    }

    fn mark(&self, index: &mut VIntIndex) {
        index.fp = self.out.file_pointer();
    }

    fn close(&mut self) -> Result<()> {
        codec_util::write_footer(&mut self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

pub struct VIntIndexInput {
    input: Box<dyn IndexInput>,
    data_start: i64,
}

impl VIntIndexInput {
    pub fn open(mut input: Box<dyn IndexInput>) -> Result<VIntIndexInput> {
        codec_util::check_header(
            &mut input,
            VINT_STREAM_CODEC,
            VINT_STREAM_VERSION_START,
            VINT_STREAM_VERSION_CURRENT,
        )?;
        let data_start = input.file_pointer();
        codec_util::retrieve_checksum(&mut input)?;
        Ok(VIntIndexInput { input, data_start })
    }
}

impl IntIndexInput for VIntIndexInput {
    type Index = VIntIndex;
    type Reader = VIntReader;

    fn reader(&self) -> Result<VIntReader> {
        let mut input = self.input.clone()?;
        input.seek(self.data_start)?;
        Ok(VIntReader { input })
    }

    fn check_integrity(&self) -> Result<()> {
        codec_util::checksum_entire_file(self.input.as_ref())?;
        Ok(())
    }
}

pub struct VIntReader {
    input: Box<dyn IndexInput>,
}

impl IntIndexReader for VIntReader {
    type Index = VIntIndex;

    fn next(&mut self) -> Result<i32> {
        self.input.read_vint()
    }

    fn seek(&mut self, index: &VIntIndex) -> Result<()> {
        self.input.seek(index.fp)
    }
}

/// Int streams with one vint per int.
#[derive(Clone, Debug, Default)]
pub struct VIntStreamFactory;

impl IntStreamFactory for VIntStreamFactory {
    type Index = VIntIndex;
    type Output = VIntIndexOutput;
    type Input = VIntIndexInput;

    fn name(&self) -> &str {
        VINT_STREAM_CODEC
    }

    fn create_output<D: Directory>(
        &self,
        dir: &D,
        file_name: &str,
        context: &IOContext,
    ) -> Result<VIntIndexOutput> {
        debug!("creating vint stream {} in {}", file_name, dir);
        let out = dir.create_output(file_name, context)?;
        VIntIndexOutput::new(Box::new(out))
    }

    fn open_input<D: Directory>(
        &self,
        dir: &D,
        file_name: &str,
        context: &IOContext,
    ) -> Result<VIntIndexInput> {
        debug!("opening vint stream {} in {}", file_name, dir);
        VIntIndexInput::open(dir.open_input(file_name, context)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::store::directory::RAMDirectory;
    use error::ErrorKind;

    #[test]
    fn test_bookmarks_round_trip() {
        let dir = RAMDirectory::new();
        let factory = VIntStreamFactory;
        let ctx = IOContext::Default;
        let mut out = factory.create_output(&dir, "_0.doc", &ctx).unwrap();
        let mut marks = Vec::new();
        for i in 0..100 {
            if i % 10 == 0 {
                marks.push((i, out.index()));
            }
            out.write(i * 300).unwrap();
        }
        out.close().unwrap();

        // bookmarks are delta coded, with a restart in the middle
        let mut meta = Vec::new();
        let mut last = VIntIndex::default();
        for (k, &(_, ref index)) in marks.iter().enumerate() {
            last.copy_from(index, false);
            last.write(&mut meta, k == 0 || k == 5).unwrap();
        }

        let input = factory.open_input(&dir, "_0.doc", &ctx).unwrap();
        input.check_integrity().unwrap();
        let mut reader = input.reader().unwrap();
        let mut decoded = VIntIndex::default();
        let mut bytes: &[u8] = &meta;
        for (k, &(i, ref index)) in marks.iter().enumerate() {
            decoded.read(&mut bytes, k == 0 || k == 5).unwrap();
            assert_eq!(decoded.fp(), index.fp());
            reader.seek(&decoded).unwrap();
            assert_eq!(reader.next().unwrap(), i * 300);
            assert_eq!(reader.next().unwrap(), (i + 1) * 300);
        }
    }

    #[test]
    fn test_reader_starts_after_header() {
        let dir = RAMDirectory::new();
        let ctx = IOContext::Default;
        let mut out = VIntStreamFactory.create_output(&dir, "_0.frq", &ctx).unwrap();
        out.write(7).unwrap();
        out.write(1 << 20).unwrap();
        out.close().unwrap();

        let input = VIntStreamFactory.open_input(&dir, "_0.frq", &ctx).unwrap();
        let mut reader = input.reader().unwrap();
        assert_eq!(reader.next().unwrap(), 7);
        assert_eq!(reader.next().unwrap(), 1 << 20);
    }

    #[test]
    fn test_negative_int_rejected() {
        let dir = RAMDirectory::new();
        let mut out = VIntStreamFactory
            .create_output(&dir, "_0.pos", &IOContext::Default)
            .unwrap();
        match out.write(-1) {
            Err(e) => match *e.kind() {
                ErrorKind::IllegalArgument(_) => {}
                ref k => panic!("unexpected error {:?}", k),
            },
            Ok(()) => panic!("negative int accepted"),
        }
    }

    #[test]
    fn test_missing_footer_is_corrupt() {
        let dir = RAMDirectory::new();
        {
            let out = dir.create_output("_0.doc", &IOContext::Default).unwrap();
            let mut out = VIntIndexOutput::new(Box::new(out)).unwrap();
            out.write(1).unwrap();
        }
        match VIntStreamFactory.open_input(&dir, "_0.doc", &IOContext::Default) {
            Err(e) => match *e.kind() {
                ErrorKind::CorruptIndex(_) => {}
                ref k => panic!("unexpected error {:?}", k),
            },
            Ok(_) => panic!("stream without footer opened"),
        }
    }
}
