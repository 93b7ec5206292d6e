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

use error::ErrorKind::*;
use error::Result;

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{self, Read};

/// Trait for performing read operations of the low-level data types used by codecs.
///
/// Integers are big-endian; variable-length integers use seven data bits per byte with
/// the high bit set on every byte but the last.
pub trait DataInput: Read {
    fn read_byte(&mut self) -> Result<u8> {
        let mut buffer = [0u8; 1];
        if self.read(&mut buffer)? != 1 {
            bail!(UnexpectedEOF(
                "Reached EOF when a single byte is expected".to_owned()
            ))
        } else {
            Ok(buffer[0])
        }
    }

    fn read_bytes(&mut self, b: &mut [u8], offset: usize, length: usize) -> Result<()> {
        let end = offset + length;
        if b.len() < end {
            let msg = format!(
                "Buffer too small: writing [{}, {}) to [0, {})",
                offset,
                end,
                b.len(),
            );
            bail!(IllegalArgument(msg));
        }

        let mut read = 0;
        while read < length {
            let count = self.read(&mut b[offset + read..end])?;
            if count == 0 {
                bail!(UnexpectedEOF(format!(
                    "Reached EOF when {} bytes are expected, got {}",
                    length, read
                )));
            }
            read += count;
        }
        Ok(())
    }

    fn read_short(&mut self) -> Result<i16> {
        Ok(ReadBytesExt::read_i16::<BigEndian>(self)?)
    }

    fn read_int(&mut self) -> Result<i32> {
        Ok(ReadBytesExt::read_i32::<BigEndian>(self)?)
    }

    fn read_long(&mut self) -> Result<i64> {
        Ok(ReadBytesExt::read_i64::<BigEndian>(self)?)
    }

    fn read_vint(&mut self) -> Result<i32> {
        let mut b = (self.read_byte()?) as i8;
        if b >= 0 {
            return Ok(i32::from(b));
        }

        let mut i = i32::from(b) & 0x7f;
        b = self.read_byte()? as i8;
        i |= (i32::from(b) & 0x7f) << 7;
        if b >= 0 {
            return Ok(i);
        }

        b = self.read_byte()? as i8;
        i |= (i32::from(b) & 0x7f) << 14;
        if b >= 0 {
            return Ok(i);
        }

        b = self.read_byte()? as i8;
        i |= (i32::from(b) & 0x7f) << 21;
        if b >= 0 {
            return Ok(i);
        }

        b = self.read_byte()? as i8;
        i |= (i32::from(b) & 0x0f) << 28;

        if (b as u8 & 0xf0) != 0 {
            bail!(IllegalState("Invalid vInt detected".to_owned()));
        }

        Ok(i)
    }

    fn read_vlong(&mut self) -> Result<i64> {
        let mut i = 0i64;
        let mut shift = 0;
        while shift < 63 {
            let b = self.read_byte()?;
            i |= i64::from(b & 0x7f) << shift;
            if b & 0x80 == 0 {
                return Ok(i);
            }
            shift += 7;
        }
        bail!(IllegalState("Invalid vLong detected".to_owned()))
    }

    fn read_zlong(&mut self) -> Result<i64> {
        let mut z = 0u64;
        let mut shift = 0;
        while shift < 64 {
            let b = self.read_byte()?;
            z |= u64::from(b & 0x7f) << shift;
            if b & 0x80 == 0 {
                return Ok(((z >> 1) as i64) ^ -((z & 1) as i64));
            }
            shift += 7;
        }
        bail!(IllegalState("Invalid zLong detected".to_owned()))
    }

    fn read_string(&mut self) -> Result<String> {
        let length = self.read_vint()?;
        if length < 0 {
            bail!(IllegalState("Invalid String detected".to_owned()));
        }

        let mut buffer = vec![0u8; length as usize];
        self.read_exact(&mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        const SKIP_BUFFER_SIZE: usize = 1024;
        let mut skip_buffer = [0u8; SKIP_BUFFER_SIZE];
        let mut skipped = 0;

        while skipped < count {
            let step = ::std::cmp::min(SKIP_BUFFER_SIZE, count - skipped);
            self.read_bytes(&mut skip_buffer, 0, step)?;
            skipped += step;
        }
        Ok(())
    }
}

impl<'a> DataInput for &'a [u8] {
    fn read_byte(&mut self) -> Result<u8> {
        if self.is_empty() {
            bail!(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "failed to fill whole buffer"
            ));
        }
        let b = self[0];
        *self = &self[1..];
        Ok(b)
    }

    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        if self.len() < count {
            bail!(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "failed to fill whole buffer"
            ));
        }

        *self = &self[count..];
        Ok(())
    }
}

impl<'a, T: DataInput + ?Sized> DataInput for &'a mut T {
    fn read_byte(&mut self) -> Result<u8> {
        (**self).read_byte()
    }

    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        (**self).skip_bytes(count)
    }
}

impl<T: DataInput + ?Sized> DataInput for Box<T> {
    fn read_byte(&mut self) -> Result<u8> {
        (**self).read_byte()
    }

    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        (**self).skip_bytes(count)
    }
}
