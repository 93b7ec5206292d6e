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

//! Utility functions for reading and writing versioned headers.
//!
//! Writing codec headers is useful to ensure that a file is in
//! the format you think it is.

use core::store::io::{
    BufferedChecksumIndexInput, ChecksumIndexInput, DataInput, DataOutput, IndexInput, IndexOutput,
};

use error::ErrorKind::{CorruptIndex, IllegalArgument, IllegalState};
use error::Result;
use std::io::Read;

/// Constant to identify the start of a codec header.
pub const CODEC_MAGIC: i32 = 0x3FD7_6C17;
/// Constant to identify the start of a codec footer.
pub const FOOTER_MAGIC: i32 = !CODEC_MAGIC;

/// Writes a codec header, which records both a string to identify the file and a version number.
///
/// This header can be parsed and validated with {@link #check_header()}.
///
/// CodecHeader --> Magic,CodecName,Version
/// * Magic -->  DataOutput#write_int. This identifies the start of the header. It is always
///   `CODEC_MAGIC`.
/// * CodecName --> DataOutput#write_string. This is a string to identify this file.
/// * Version --> DataOutput#write_int. Records the version of the file.
///
/// Note that the length of a codec header depends only upon the name of the codec,
/// so this length can be computed at any time with {@link #header_len(&str)}.
pub fn write_header<T: DataOutput + ?Sized>(out: &mut T, codec: &str, version: i32) -> Result<()> {
    let clen = codec.len();
    if clen >= 128 {
        bail!(IllegalArgument(format!(
            "codec must be simple ASCII less than 128 characters, got {}[length={}]",
            codec, clen,
        )));
    }
    out.write_int(CODEC_MAGIC)?;
    out.write_string(codec)?;
    out.write_int(version)
}

/// Writes a codec footer, which records both a checksum algorithm ID and a
/// checksum. This footer can be parsed and validated with `check_footer`.
///
/// CodecFooter --> Magic,AlgorithmID,Checksum
/// * Magic --> DataOutput#write_int. This identifies the start of the footer.
///   It is always `FOOTER_MAGIC`.
/// * AlgorithmID --> DataOutput#write_int. This indicates the checksum algorithm
///   used. Currently this is always 0, for zlib-crc32.
/// * Checksum --> DataOutput#write_long. The actual checksum value for all
///   previous bytes in the stream, including the bytes from Magic and AlgorithmID.
pub fn write_footer(output: &mut impl IndexOutput) -> Result<()> {
    output.write_int(FOOTER_MAGIC)?;
    output.write_int(0)?;
    write_crc(output)
}

/// Computes the length of a codec header.
pub fn header_length(codec: &str) -> usize {
    9 + codec.len()
}

/// Reads and validates a header previously written with `write_header`.
///
/// Returns the actual version, which must lie within `[min_ver, max_ver]`.
pub fn check_header<T: DataInput + ?Sized>(
    data_input: &mut T,
    codec: &str,
    min_ver: i32,
    max_ver: i32,
) -> Result<i32> {
    let actual_header = data_input.read_int()?;
    if actual_header != CODEC_MAGIC {
        bail!(CorruptIndex(format!(
            "codec header mismatch: actual=0x{:X}, expected=0x{:X}",
            actual_header, CODEC_MAGIC
        )));
    }
    check_header_no_magic(data_input, codec, min_ver, max_ver)
}

/// Like `check_header` except this version assumes the first i32 has already
/// been read and validated from the input.
pub fn check_header_no_magic<T: DataInput + ?Sized>(
    data_input: &mut T,
    codec: &str,
    min_ver: i32,
    max_ver: i32,
) -> Result<i32> {
    let actual_codec = data_input.read_string()?;
    if actual_codec != codec {
        bail!(CorruptIndex(format!(
            "codec mismatch: actual={}, expected={}",
            actual_codec, codec
        )));
    }
    let actual_ver = data_input.read_int()?;
    if actual_ver < min_ver || actual_ver > max_ver {
        bail!(CorruptIndex(format!(
            "index format either too new or too old: {} <= {} <= {} doesn't hold",
            min_ver, actual_ver, max_ver
        )));
    }
    Ok(actual_ver)
}

/// Computes the length of a codec footer.
#[inline(always)]
pub fn footer_length() -> usize {
    16
}

pub fn validate_footer<T: IndexInput + ?Sized>(input: &mut T) -> Result<()> {
    let remaining = input.len() as i64 - input.file_pointer();
    let expected = footer_length() as i64;

    if remaining < expected {
        bail!(CorruptIndex(format!(
            "misplaced codec footer (file truncated?): remaining={}, expected={}",
            remaining, expected
        )))
    } else if remaining > expected {
        bail!(CorruptIndex(format!(
            "misplaced codec footer (file extended?): remaining={}, expected={}",
            remaining, expected
        )))
    } else {
        let magic = input.read_int()?;
        if magic != FOOTER_MAGIC {
            bail!(CorruptIndex(format!(
                "codec footer mismatch: actual={} vs expected={}",
                magic, FOOTER_MAGIC
            )));
        }
        let algorithm_id = input.read_int()?;
        if algorithm_id != 0 {
            bail!(CorruptIndex(format!(
                "codec footer mismatch: unknown algorithm_id: {}",
                algorithm_id
            )));
        }
        Ok(())
    }
}

/// Validates the codec footer previously written by writer_footer(), optionally
/// passing an unexpected exception that has already occurred.
pub fn check_footer(input: &mut impl ChecksumIndexInput) -> Result<i64> {
    validate_footer(input)?;
    let actual_checksum: i64 = input.checksum();
    let expected_checksum: i64 = read_crc(input)?;
    if actual_checksum != expected_checksum {
        bail!(CorruptIndex(format!(
            "checksum failed (hardware problems?): expected=0x{:X}, actual=0x{:X}",
            expected_checksum, actual_checksum
        )));
    }
    Ok(actual_checksum)
}

pub fn read_crc<T: IndexInput + ?Sized>(input: &mut T) -> Result<i64> {
    let val = input.read_long()?;
    if (val as u64 & 0xFFFF_FFFF_0000_0000) != 0 {
        bail!(CorruptIndex(format!("Illegal CRC-32 checksum: {}", val)));
    }
    Ok(val)
}

pub fn write_crc<T: IndexOutput + ?Sized>(output: &mut T) -> Result<()> {
    let value = output.checksum()?;
    if value as u64 & 0xFFFF_FFFF_0000_0000 != 0 {
        bail!(IllegalState(format!("Illegal CRC-32 checksum: {}", value)));
    }
    output.write_long(value)
}

/// Returns (but does not validate) the checksum previously written by check_footer().
pub fn retrieve_checksum<T: IndexInput + ?Sized>(input: &mut T) -> Result<i64> {
    let length = input.len();
    let footer_length = footer_length() as u64;
    if length < footer_length {
        bail!(CorruptIndex(format!(
            "misplaced codec footer (file truncated?): length={}, but footer_length={}",
            length, footer_length
        )));
    }
    input.seek((length - footer_length) as i64)?;
    validate_footer(input)?;

    read_crc(input)
}

// TODO: duplicates to refactor

/// validate the input checksum
pub fn check_checksum<T: IndexInput + ?Sized>(input: &mut T, actual_checksum: i64) -> Result<()> {
    let expected_checksum: i64 = read_crc(input)?;
    if actual_checksum != expected_checksum {
        bail!(CorruptIndex(format!(
            "checksum failed (hardware problems?): expected=0x{:X}, actual=0x{:X}",
            expected_checksum, actual_checksum
        )));
    }
    Ok(())
}

/// Clones the provided input, reads all bytes from the file, and calls check_footer().
///
/// Note that this method may be slow, as it must process the entire file.
/// If you just need to extract the checksum value, call {@link #retrieve_checksum}.
pub fn checksum_entire_file<T: IndexInput + ?Sized>(input: &T) -> Result<i64> {
    let mut index = input.clone()?;
    index.seek(0)?;
    let mut checksum = BufferedChecksumIndexInput::new(index);
    let mut len = checksum.len();
    let mut pos = checksum.file_pointer() as u64;
    if len < footer_length() as u64 {
        bail!(CorruptIndex(format!(
            "misplaced codec footer (file truncated?): length={} but footerLength=={}",
            checksum.len(),
            footer_length()
        )));
    }
    const BUFSIZ: u64 = 1024 * 64;
    let mut buffer = [0u8; BUFSIZ as usize];
    len -= footer_length() as u64;

    while pos < len {
        let size = if len - pos < BUFSIZ {
            len - pos
        } else {
            BUFSIZ
        };
        pos += checksum.read(&mut buffer[0..size as usize])? as u64;
    }

    validate_footer(&mut checksum)?;
    let actual = checksum.checksum();
    check_checksum(&mut checksum, actual)?;
    Ok(actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::store::directory::{Directory, RAMDirectory};
    use core::store::IOContext;

    #[test]
    fn test_header_round_trip() {
        let mut out: Vec<u8> = Vec::new();
        write_header(&mut out, "SepPostingsWriter", 1).unwrap();
        assert_eq!(out.len(), header_length("SepPostingsWriter"));

        let mut input: &[u8] = &out;
        assert_eq!(check_header(&mut input, "SepPostingsWriter", 0, 1).unwrap(), 1);
    }

    #[test]
    fn test_header_mismatch_is_corruption() {
        let mut out: Vec<u8> = Vec::new();
        write_header(&mut out, "PulsedPostingsWriter", 3).unwrap();

        let mut input: &[u8] = &out;
        let err = check_header(&mut input, "PulsedPostingsWriter", 0, 1).unwrap_err();
        match *err.kind() {
            CorruptIndex(_) => {}
            ref other => panic!("unexpected error: {:?}", other),
        }

        let mut input: &[u8] = &out;
        let err = check_header(&mut input, "SepPostingsWriter", 0, 3).unwrap_err();
        match *err.kind() {
            CorruptIndex(ref msg) => assert!(msg.contains("SepPostingsWriter")),
            ref other => panic!("unexpected error: {:?}", other),
        }

        let garbage = [0u8; 16];
        let mut input: &[u8] = &garbage;
        assert!(check_header(&mut input, "SepPostingsWriter", 0, 1).is_err());
    }

    #[test]
    fn test_footer_and_checksum() {
        let dir = RAMDirectory::new();
        {
            let mut out = dir.create_output("_0.skp", &IOContext::Default).unwrap();
            write_header(&mut out, "SepSkip", 0).unwrap();
            out.write_vlong(123_456).unwrap();
            write_footer(&mut out).unwrap();
        }

        let mut input = dir.open_input("_0.skp", &IOContext::READ).unwrap();
        let stored = retrieve_checksum(input.as_mut()).unwrap();
        assert_eq!(checksum_entire_file(input.as_ref()).unwrap(), stored);

        let mut checksum_input = dir.open_checksum_input("_0.skp", &IOContext::READ).unwrap();
        check_header(&mut checksum_input, "SepSkip", 0, 0).unwrap();
        assert_eq!(checksum_input.read_vlong().unwrap(), 123_456);
        assert_eq!(check_footer(&mut checksum_input).unwrap(), stored);
    }

    #[test]
    fn test_truncated_footer() {
        let dir = RAMDirectory::new();
        {
            let mut out = dir.create_output("short", &IOContext::Default).unwrap();
            out.write_int(FOOTER_MAGIC).unwrap();
        }
        let mut input = dir.open_input("short", &IOContext::READ).unwrap();
        assert!(retrieve_checksum(input.as_mut()).is_err());
    }
}
