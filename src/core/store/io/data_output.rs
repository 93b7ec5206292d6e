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

use error::ErrorKind::IllegalArgument;
use error::Result;

use byteorder::{BigEndian, WriteBytesExt};
use std::io::Write;

/// Trait for performing write operations of the low-level data types used by codecs.
pub trait DataOutput: Write {
    fn write_byte(&mut self, b: u8) -> Result<()> {
        let buf = [b; 1];
        self.write_all(&buf)?;
        Ok(())
    }

    #[inline]
    fn write_bytes(&mut self, b: &[u8], offset: usize, length: usize) -> Result<()> {
        debug_assert!(offset + length <= b.len());
        self.write_all(&b[offset..offset + length])?;
        Ok(())
    }

    fn write_short(&mut self, i: i16) -> Result<()> {
        WriteBytesExt::write_i16::<BigEndian>(self, i)?;
        Ok(())
    }

    fn write_int(&mut self, i: i32) -> Result<()> {
        WriteBytesExt::write_i32::<BigEndian>(self, i)?;
        Ok(())
    }

    fn write_long(&mut self, i: i64) -> Result<()> {
        WriteBytesExt::write_i64::<BigEndian>(self, i)?;
        Ok(())
    }

    fn write_vint(&mut self, i: i32) -> Result<()> {
        let mut i = i as u32;
        while (i & !0x7f_u32) != 0 {
            self.write_byte(((i & 0x7f) | 0x80) as u8)?;
            i >>= 7;
        }
        self.write_byte(i as u8)
    }

    fn write_vlong(&mut self, i: i64) -> Result<()> {
        if i < 0 {
            bail!(IllegalArgument(format!("Can't write negative vLong: {}", i)));
        }
        let mut i = i as u64;
        while (i & !0x7f_u64) != 0 {
            self.write_byte(((i & 0x7f_u64) | 0x80_u64) as u8)?;
            i >>= 7;
        }
        self.write_byte(i as u8)
    }

    /// Writes a zig-zag encoded long, small negative values stay short.
    fn write_zlong(&mut self, i: i64) -> Result<()> {
        let z = ((i >> 63) ^ (i << 1)) as u64;
        let mut z = z;
        while (z & !0x7f_u64) != 0 {
            self.write_byte(((z & 0x7f_u64) | 0x80_u64) as u8)?;
            z >>= 7;
        }
        self.write_byte(z as u8)
    }

    fn write_string(&mut self, s: &str) -> Result<()> {
        let s = s.as_bytes();
        self.write_vint(s.len() as i32)?;
        self.write_all(s)?;
        Ok(())
    }

    fn copy_bytes<I: DataInput + ?Sized>(&mut self, from: &mut I, len: usize) -> Result<()>
    where
        Self: Sized,
    {
        const COPY_BUFFER_SIZE: usize = 16384;
        let mut left = len;
        let mut copy_buffer = [0u8; COPY_BUFFER_SIZE];
        while left > 0 {
            let to_copy = ::std::cmp::min(left, COPY_BUFFER_SIZE);
            from.read_bytes(&mut copy_buffer, 0, to_copy)?;
            self.write_all(&copy_buffer[..to_copy])?;
            left -= to_copy;
        }
        Ok(())
    }
}

// a implement that can use Vec<u8> as a data output
impl DataOutput for Vec<u8> {}

impl<'a, T: DataOutput + ?Sized> DataOutput for &'a mut T {}

impl<T: DataOutput + ?Sized> DataOutput for Box<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_mixed() {
        let mut out: Vec<u8> = Vec::new();
        out.write_vint(300).unwrap();
        out.write_vlong(1i64 << 40).unwrap();
        DataOutput::write_int(&mut out, -2).unwrap();
        out.write_string("SepPostings").unwrap();

        let mut input: &[u8] = &out;
        assert_eq!(input.read_vint().unwrap(), 300);
        assert_eq!(input.read_vlong().unwrap(), 1i64 << 40);
        assert_eq!(input.read_int().unwrap(), -2);
        assert_eq!(input.read_string().unwrap(), "SepPostings");
        assert!(input.is_empty());
    }

    #[test]
    fn test_zlong() {
        let mut out: Vec<u8> = Vec::new();
        out.write_zlong(-1).unwrap();
        out.write_zlong(i64::min_value()).unwrap();
        assert_eq!(out[0], 1);
        let mut input: &[u8] = &out;
        assert_eq!(input.read_zlong().unwrap(), -1);
        assert_eq!(input.read_zlong().unwrap(), i64::min_value());
    }

    #[test]
    fn test_negative_vlong_rejected() {
        let mut out: Vec<u8> = Vec::new();
        assert!(out.write_vlong(-1).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn test_negative_vint_uses_five_bytes() {
        let mut out: Vec<u8> = Vec::new();
        out.write_vint(-1).unwrap();
        assert_eq!(out.len(), 5);
        let mut input: &[u8] = &out;
        assert_eq!(input.read_vint().unwrap(), -1);
    }
}
