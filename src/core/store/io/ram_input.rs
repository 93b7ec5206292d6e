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

use std::io::{self, Read};
use std::sync::Arc;

/// `IndexInput` over a snapshot of an in-memory file.
#[derive(Clone)]
pub struct RAMIndexInput {
    name: String,
    data: Arc<Vec<u8>>,
    offset: usize,
    len: usize,
    position: usize,
}

impl RAMIndexInput {
    pub fn new(name: &str, data: Arc<Vec<u8>>) -> RAMIndexInput {
        let len = data.len();
        RAMIndexInput {
            name: name.to_string(),
            data,
            offset: 0,
            len,
            position: 0,
        }
    }

    #[inline]
    fn as_slice(&self) -> &[u8] {
        &self.data[self.offset..self.offset + self.len]
    }
}

impl IndexInput for RAMIndexInput {
    fn clone(&self) -> Result<Box<dyn IndexInput>> {
        Ok(Box::new(Clone::clone(self)))
    }

    fn file_pointer(&self) -> i64 {
        self.position as i64
    }

    fn seek(&mut self, pos: i64) -> Result<()> {
        if pos < 0 || pos as usize > self.len {
            bail!(UnexpectedEOF(format!(
                "seek to {} beyond end of {} (length {})",
                pos, self.name, self.len
            )));
        }
        self.position = pos as usize;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.len as u64
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn slice(&self, description: &str, offset: i64, length: i64) -> Result<Box<dyn IndexInput>> {
        if offset < 0 || length < 0 || (offset + length) as usize > self.len {
            bail!(IllegalArgument(format!(
                "Illegal (offset, length) slice: ({}, {}) for file of length: {}",
                offset, length, self.len
            )));
        }
        Ok(Box::new(RAMIndexInput {
            name: description.to_string(),
            data: Arc::clone(&self.data),
            offset: self.offset + offset as usize,
            len: length as usize,
            position: 0,
        }))
    }
}

impl DataInput for RAMIndexInput {
    fn read_byte(&mut self) -> Result<u8> {
        if self.position >= self.len {
            bail!(UnexpectedEOF(format!("read past EOF: {}", self.name)));
        }
        let b = self.data[self.offset + self.position];
        self.position += 1;
        Ok(b)
    }

    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        if self.position + count > self.len {
            bail!(UnexpectedEOF(format!("skip past EOF: {}", self.name)));
        }
        self.position += count;
        Ok(())
    }
}

impl Read for RAMIndexInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let position = self.position;
        let count = buf.len().min(self.len - position);
        buf[..count].copy_from_slice(&self.as_slice()[position..position + count]);
        self.position += count;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_and_seek() {
        let data = Arc::new(vec![0u8, 1, 2, 3, 4, 5, 6, 7]);
        let mut input = RAMIndexInput::new("ram", data);
        input.seek(6).unwrap();
        assert_eq!(input.read_byte().unwrap(), 6);
        assert!(input.seek(9).is_err());

        let mut slice = input.slice("mid", 2, 3).unwrap();
        assert_eq!(slice.len(), 3);
        assert_eq!(slice.read_byte().unwrap(), 2);
        slice.seek(2).unwrap();
        assert_eq!(slice.read_byte().unwrap(), 4);
        assert!(slice.read_byte().is_err());
        assert!(input.slice("bad", 6, 3).is_err());
    }

    #[test]
    fn test_read_stops_at_slice_end() {
        let data = Arc::new(vec![0u8, 1, 2, 3, 4, 5, 6, 7]);
        let input = RAMIndexInput::new("ram", data);
        let mut slice = input.slice("mid", 2, 3).unwrap();
        slice.seek(1).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(Read::read(&mut slice, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[3, 4]);
        assert_eq!(Read::read(&mut slice, &mut buf).unwrap(), 0);
    }
}
