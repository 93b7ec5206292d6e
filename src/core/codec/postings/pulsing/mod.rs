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

//! Postings format that inlines the postings of rare terms into the terms
//! dictionary and hands every other term to a wrapped format.

mod posting_format;

pub use self::posting_format::*;

mod posting_reader;

pub use self::posting_reader::*;

mod posting_writer;

pub use self::posting_writer::*;

use core::codec::postings::BlockTermState;

use error::ErrorKind::CorruptIndex;
use error::Result;

pub const PULSING_CODEC: &str = "PulsedPostingsWriter";

/// Extension of the file holding the longs size of every field.
pub const SUMMARY_EXTENSION: &str = "smy";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PulsingVersion {
    /// No summary file, wrapped formats never use longs.
    Start = 0,
    /// Longs sizes are written into the summary file.
    MetaArray = 1,
}

impl PulsingVersion {
    pub const CURRENT: PulsingVersion = PulsingVersion::MetaArray;

    pub fn from_i32(version: i32) -> Result<PulsingVersion> {
        match version {
            0 => Ok(PulsingVersion::Start),
            1 => Ok(PulsingVersion::MetaArray),
            _ => bail!(CorruptIndex(format!(
                "unsupported {} version: {}",
                PULSING_CODEC, version
            ))),
        }
    }

    pub fn value(self) -> i32 {
        self as i32
    }

    pub fn has_summary(self) -> bool {
        self >= PulsingVersion::MetaArray
    }
}

impl Default for PulsingVersion {
    fn default() -> Self {
        PulsingVersion::CURRENT
    }
}

/// Term state of the pulsing format.
///
/// Exactly one side is meaningful: `postings` holds the inlined blob of a
/// pulsed term, otherwise `wrapped` holds the state of the wrapped format.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PulsingTermState<S> {
    pub postings: Option<Vec<u8>>,
    pub wrapped: BlockTermState<S>,
    pub longs: Vec<i64>,
    /// whether the next wrapped term must be decoded absolute
    pub absolute: bool,
}

impl<S: Clone> PulsingTermState<S> {
    pub fn new(wrapped: BlockTermState<S>) -> Self {
        PulsingTermState {
            postings: None,
            wrapped,
            longs: Vec::new(),
            absolute: false,
        }
    }

    pub fn is_inlined(&self) -> bool {
        self.postings.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_registry() {
        assert_eq!(PulsingVersion::from_i32(0).unwrap(), PulsingVersion::Start);
        assert_eq!(
            PulsingVersion::from_i32(1).unwrap(),
            PulsingVersion::MetaArray
        );
        assert!(PulsingVersion::from_i32(2).is_err());
        assert!(!PulsingVersion::Start.has_summary());
        assert!(PulsingVersion::CURRENT.has_summary());
    }

    #[test]
    fn test_term_state_sides() {
        let mut state = PulsingTermState::new(BlockTermState::new(0i64));
        assert!(!state.is_inlined());
        state.postings = Some(vec![1, 2]);
        assert!(state.is_inlined());
    }
}
