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

use core::store::io::{DataOutput, IndexOutput};

use error::{ErrorKind, Result};

use std::io::{self, Write};

use flate2::Crc;

/// Growable in-memory output, used for per-level skip buffers and as the
/// scratch buffer for term metadata.
pub struct RAMOutputStream {
    name: String,
    buffer: Vec<u8>,
    crc: Option<Crc>,
}

impl RAMOutputStream {
    pub fn new(checksum: bool) -> Self {
        Self::with_name("noname", checksum)
    }

    pub fn with_name(name: &str, checksum: bool) -> Self {
        let crc = if checksum { Some(Crc::new()) } else { None };
        RAMOutputStream {
            name: name.to_string(),
            buffer: Vec::new(),
            crc,
        }
    }

    /// Copies the buffered bytes to `out`.
    pub fn write_to(&self, out: &mut impl DataOutput) -> Result<()> {
        out.write_bytes(&self.buffer, 0, self.buffer.len())
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        if let Some(ref mut crc) = self.crc {
            crc.reset();
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Write for RAMOutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        if let Some(ref mut crc) = self.crc {
            crc.update(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DataOutput for RAMOutputStream {}

impl IndexOutput for RAMOutputStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn file_pointer(&self) -> i64 {
        self.buffer.len() as i64
    }

    fn checksum(&self) -> Result<i64> {
        if let Some(ref crc) = self.crc {
            Ok(i64::from(crc.sum()) & 0xffff_ffffi64)
        } else {
            bail!(ErrorKind::IllegalState(
                "internal RAMOutputStream created with checksum disabled".into()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_to_and_reset() {
        let mut ram = RAMOutputStream::new(false);
        ram.write_vint(1000).unwrap();
        ram.write_byte(3).unwrap();
        assert_eq!(ram.file_pointer(), 3);

        let mut out: Vec<u8> = Vec::new();
        ram.write_to(&mut out).unwrap();
        assert_eq!(out, ram.as_bytes().to_vec());

        ram.reset();
        assert!(ram.is_empty());
        assert!(ram.checksum().is_err());
    }

    #[test]
    fn test_checksum_tracks_written_bytes() {
        let mut a = RAMOutputStream::new(true);
        let mut b = RAMOutputStream::new(true);
        a.write_bytes(b"pulsing", 0, 7).unwrap();
        b.write_bytes(b"puls", 0, 4).unwrap();
        b.write_bytes(b"ing", 0, 3).unwrap();
        assert_eq!(a.checksum().unwrap(), b.checksum().unwrap());
        a.reset();
        b.reset();
        assert_eq!(a.checksum().unwrap(), b.checksum().unwrap());
    }
}
