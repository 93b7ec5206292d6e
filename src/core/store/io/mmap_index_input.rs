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

use core::store::io::{DataInput, IndexInput};

use error::ErrorKind::{IllegalArgument, UnexpectedEOF};
use error::Result;
use memmap::{Mmap, MmapOptions};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

/// A shared, read-only view over a region of a memory mapped file.
///
/// Empty files cannot be mapped, they are represented by a source without a map.
#[derive(Clone)]
pub struct ReadOnlySource {
    map: Option<Arc<Mmap>>,
    offset: usize,
    len: usize,
}

impl ReadOnlySource {
    pub fn open(path: &Path) -> Result<ReadOnlySource> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len() as usize;
        if file_len == 0 {
            return Ok(ReadOnlySource {
                map: None,
                offset: 0,
                len: 0,
            });
        }
        let mmap = unsafe { MmapOptions::new().len(file_len).map(&file)? };
        Ok(ReadOnlySource {
            map: Some(Arc::new(mmap)),
            offset: 0,
            len: file_len,
        })
    }

    pub fn range(&self, offset: usize, len: usize) -> Result<ReadOnlySource> {
        if self.len < offset + len {
            bail!(IllegalArgument(format!(
                "Illegal (offset, length) slice: ({}, {}) for source of length: {}",
                offset, len, self.len
            )));
        }
        Ok(ReadOnlySource {
            map: self.map.clone(),
            offset: self.offset + offset,
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        match self.map {
            Some(ref map) => &map[self.offset..self.offset + self.len],
            None => &[],
        }
    }
}

#[derive(Clone)]
pub struct MmapIndexInput {
    source: ReadOnlySource,
    position: usize,
    description: String,
}

impl MmapIndexInput {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<MmapIndexInput> {
        let description = path.as_ref().to_string_lossy().into_owned();
        let source = ReadOnlySource::open(path.as_ref())?;
        Ok(MmapIndexInput {
            source,
            position: 0,
            description,
        })
    }
}

impl IndexInput for MmapIndexInput {
    fn clone(&self) -> Result<Box<dyn IndexInput>> {
        Ok(Box::new(Clone::clone(self)))
    }

    fn file_pointer(&self) -> i64 {
        self.position as i64
    }

    fn seek(&mut self, pos: i64) -> Result<()> {
        if pos < 0 || pos as usize > self.source.len() {
            bail!(UnexpectedEOF(format!(
                "seek to {} beyond end of {} (length {})",
                pos,
                self.description,
                self.source.len()
            )));
        }
        self.position = pos as usize;
        Ok(())
    }

    #[inline]
    fn len(&self) -> u64 {
        self.source.len() as u64
    }

    fn name(&self) -> &str {
        &self.description
    }

    fn slice(&self, description: &str, offset: i64, length: i64) -> Result<Box<dyn IndexInput>> {
        if offset < 0 || length < 0 {
            bail!(IllegalArgument(format!(
                "Illegal (offset, length) slice: ({}, {})",
                offset, length
            )));
        }
        let source = self.source.range(offset as usize, length as usize)?;
        Ok(Box::new(MmapIndexInput {
            source,
            position: 0,
            description: description.to_string(),
        }))
    }
}

impl DataInput for MmapIndexInput {
    fn read_byte(&mut self) -> Result<u8> {
        let slice = self.source.as_slice();
        if self.position >= slice.len() {
            bail!(UnexpectedEOF(format!(
                "read past EOF: {}",
                self.description
            )));
        }
        let b = slice[self.position];
        self.position += 1;
        Ok(b)
    }

    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        if self.position + count > self.source.len() {
            bail!(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "failed to fill whole buffer"
            ));
        }
        self.position += count;
        Ok(())
    }
}

impl Read for MmapIndexInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let slice = self.source.as_slice();
        let count = buf.len().min(slice.len() - self.position);
        buf[..count].copy_from_slice(&slice[self.position..self.position + count]);
        self.position += count;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::store::io::{DataOutput, FSIndexOutput};
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile;

    #[test]
    fn test_mmap_index_input() {
        let name = "test.txt";
        let temp_dir = tempfile::tempdir().unwrap();
        let path: PathBuf = temp_dir.path().join(name);

        {
            let mut fsout = FSIndexOutput::new(name.to_string(), &path).unwrap();
            fsout.write_byte(b'a').unwrap();
            fsout.write_short(0x7F_i16).unwrap();
            fsout.write_long(567_890).unwrap();
            fsout.write_int(1_234_567).unwrap();
            fsout.write_byte(b'b').unwrap();
            fsout.flush().unwrap();
        }

        let mut mmap_input = MmapIndexInput::new(&path).unwrap();
        assert_eq!(mmap_input.len(), 16);
        let mut slice = mmap_input.slice("from3", 3, 12).unwrap();
        assert_eq!(slice.read_long().unwrap(), 567_890_i64);
        assert_eq!(slice.read_int().unwrap(), 1_234_567_i32);
        assert!(slice.read_int().is_err());

        mmap_input.seek(15).unwrap();
        assert_eq!(mmap_input.read_byte().unwrap(), b'b');
        assert!(mmap_input.read_byte().is_err());
    }

    #[test]
    fn test_mmap_empty_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path: PathBuf = temp_dir.path().join("empty");
        ::std::fs::File::create(&path).unwrap();

        let mut input = MmapIndexInput::new(&path).unwrap();
        assert!(input.is_empty());
        assert!(input.read_byte().is_err());
    }
}
