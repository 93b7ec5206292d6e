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

//! Postings format that writes docs, freqs and positions to separate int
//! streams, with payloads and multi-level skip lists kept in byte files of
//! their own.

mod posting_format;

pub use self::posting_format::*;

mod posting_reader;

pub use self::posting_reader::*;

mod posting_writer;

pub use self::posting_writer::*;

mod skip_reader;

pub use self::skip_reader::*;

mod skip_writer;

pub use self::skip_writer::*;

use core::codec::postings::intblock::IntIndex;

use error::ErrorKind::CorruptIndex;
use error::Result;

pub const SEP_CODEC: &str = "SepPostingsWriter";

pub const DOC_EXTENSION: &str = "doc";
pub const FREQ_EXTENSION: &str = "frq";
pub const POS_EXTENSION: &str = "pos";
pub const PAYLOAD_EXTENSION: &str = "pyl";
pub const SKIP_EXTENSION: &str = "skp";

/// On disk versions of the separate streams format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SepVersion {
    /// Initial version, positions never carry offsets.
    Start = 0,
    /// Offsets follow each position in the pos stream.
    Offsets = 1,
}

impl SepVersion {
    pub const CURRENT: SepVersion = SepVersion::Offsets;

    pub fn from_i32(version: i32) -> Result<SepVersion> {
        match version {
            0 => Ok(SepVersion::Start),
            1 => Ok(SepVersion::Offsets),
            _ => bail!(CorruptIndex(format!(
                "unsupported {} version: {}",
                SEP_CODEC, version
            ))),
        }
    }

    pub fn value(self) -> i32 {
        self as i32
    }

    pub fn supports_offsets(self) -> bool {
        self >= SepVersion::Offsets
    }
}

impl Default for SepVersion {
    fn default() -> Self {
        SepVersion::CURRENT
    }
}

/// Per term metadata of the separate streams format.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SepTermState<I: IntIndex> {
    pub doc_index: I,
    pub freq_index: I,
    pub pos_index: I,
    pub payload_fp: i64,
    /// -1 when the term carries no skip data
    pub skip_fp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use error::ErrorKind;

    #[test]
    fn test_version_registry() {
        assert_eq!(SepVersion::from_i32(0).unwrap(), SepVersion::Start);
        assert_eq!(SepVersion::from_i32(1).unwrap(), SepVersion::Offsets);
        assert_eq!(SepVersion::CURRENT.value(), 1);
        assert!(!SepVersion::Start.supports_offsets());
        assert!(SepVersion::Offsets.supports_offsets());
        for v in &[-1, 2, 100] {
            match SepVersion::from_i32(*v) {
                Err(e) => match *e.kind() {
                    ErrorKind::CorruptIndex(_) => {}
                    ref k => panic!("unexpected error {:?}", k),
                },
                Ok(v) => panic!("resolved {:?}", v),
            }
        }
    }
}
