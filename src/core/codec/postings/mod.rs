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

mod config;

pub use self::config::*;

pub mod intblock;
pub mod pulsing;
pub mod sep;

#[cfg(test)]
pub mod test_util;

use core::codec::field_infos::FieldInfo;
use core::codec::postings::intblock::{FixedIntBlockStreamFactory, VIntStreamFactory};
use core::codec::postings::pulsing::PulsingPostingsFormat;
use core::codec::postings::sep::SepPostingsFormat;
use core::codec::segment_infos::{SegmentReadState, SegmentWriteState};
use core::search::{PostingIterator, PostingIteratorFlags, NO_MORE_DOCS};
use core::store::directory::Directory;
use core::store::io::{DataInput, DataOutput};
use core::util::{BitsRef, DocId, FixedBitSet};

use error::ErrorKind::IllegalArgument;
use error::Result;

use std::fmt;

/// Holds all state required for `PostingsReaderBase` to produce a postings
/// iterator without re-seeking the terms dict.
///
/// `codec` carries whatever the concrete postings format needs on top of the
/// statistics shared by every format.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlockTermState<T> {
    /// how many docs have this term
    pub doc_freq: i32,
    /// total number of occurrences of this term, -1 when frequencies are omitted
    pub total_term_freq: i64,
    pub codec: T,
}

impl<T: Clone> BlockTermState<T> {
    pub fn new(codec: T) -> Self {
        BlockTermState {
            doc_freq: 0,
            total_term_freq: 0,
            codec,
        }
    }

    pub fn copy_from(&mut self, other: &BlockTermState<T>) {
        self.clone_from(other);
    }
}

/// The core terms dictionaries calls this to write postings.
///
/// Every term is bracketed by `start_term` and `finish_term`; its documents by
/// `start_doc` and `finish_doc`. Per term metadata is then written into the
/// terms dictionary with `encode_term`.
pub trait PostingsWriterBase {
    type TermState: Clone + fmt::Debug;

    /// Whether this writer inlines postings into the terms dictionary.
    const IS_PULSING: bool = false;

    /// Called once after startup, before any terms have been
    /// added.  Implementations typically write a header to
    /// the provided `terms_out`.
    fn init(&mut self, terms_out: &mut impl DataOutput) -> Result<()>;

    /// Returns a fresh, empty term state.
    fn new_term_state(&self) -> BlockTermState<Self::TermState>;

    /// Sets the current field for writing, and returns the
    /// fixed length of [i64] metadata (which is fixed per
    /// field), called when the writing switches to another field.
    fn set_field(&mut self, field_info: &FieldInfo) -> Result<usize>;

    /// Start a new term.
    fn start_term(&mut self) -> Result<()>;

    /// Adds a new doc in this term. `freq` is -1 when frequencies are omitted.
    fn start_doc(&mut self, doc_id: DocId, freq: i32) -> Result<()>;

    /// Add a new position & payload, and start/end offset.  A
    /// `None` payload means no payload; an empty slice is treated the same.
    fn add_position(
        &mut self,
        position: i32,
        payload: Option<&[u8]>,
        start_offset: i32,
        end_offset: i32,
    ) -> Result<()>;

    /// Called when we are done adding positions and payloads
    /// for each doc.
    fn finish_doc(&mut self) -> Result<()>;

    /// Called when we are done adding docs to this term.
    fn finish_term(&mut self, state: &mut BlockTermState<Self::TermState>) -> Result<()>;

    /// Encode metadata as [i64] and [u8]. `absolute` controls whether
    /// current term is delta encoded according to latest term.
    /// Usually elements in `longs` are file pointers, so each one always
    /// increases when a new term is consumed. `out` is used to write generic
    /// bytes, which are not monotonic.
    fn encode_term(
        &mut self,
        longs: &mut [i64],
        out: &mut impl DataOutput,
        field_info: &FieldInfo,
        state: &BlockTermState<Self::TermState>,
        absolute: bool,
    ) -> Result<()>;

    /// Writes footers and releases every output. Further calls are no-ops.
    fn close(&mut self) -> Result<()>;

    /// Write all postings for one term pulled from `postings`. The bit of every
    /// doc written is set in `docs_seen`. If no docs were written, `None` is
    /// returned and the terms dict will skip the term.
    fn write_term(
        &mut self,
        field_info: &FieldInfo,
        postings: &mut impl PostingIterator,
        docs_seen: &mut FixedBitSet,
    ) -> Result<Option<BlockTermState<Self::TermState>>> {
        let options = field_info.index_options;
        let write_freqs = options.has_freqs();
        let write_positions = options.has_positions();
        let write_payloads = field_info.has_store_payloads;
        let write_offsets = options.has_offsets();

        self.start_term()?;
        let mut doc_freq = 0;
        let mut total_term_freq = 0i64;
        loop {
            let doc_id = postings.next()?;
            if doc_id == NO_MORE_DOCS {
                break;
            }
            doc_freq += 1;
            docs_seen.set(doc_id as usize);
            let freq = if write_freqs {
                let f = postings.freq()?;
                total_term_freq += i64::from(f);
                f
            } else {
                -1
            };
            self.start_doc(doc_id, freq)?;

            if write_positions {
                for _ in 0..freq {
                    let pos = postings.next_position()?;
                    let payload = if write_payloads {
                        postings.payload()?
                    } else {
                        Vec::with_capacity(0)
                    };
                    let (start_offset, end_offset) = if write_offsets {
                        (postings.start_offset()?, postings.end_offset()?)
                    } else {
                        (-1, -1)
                    };
                    let payload = if payload.is_empty() {
                        None
                    } else {
                        Some(payload.as_slice())
                    };
                    self.add_position(pos, payload, start_offset, end_offset)?;
                }
            }

            self.finish_doc()?;
        }

        if doc_freq == 0 {
            Ok(None)
        } else {
            let mut state = self.new_term_state();
            state.doc_freq = doc_freq;
            state.total_term_freq = if write_freqs { total_term_freq } else { -1 };
            self.finish_term(&mut state)?;
            Ok(Some(state))
        }
    }
}

/// The core terms dictionaries call this to read postings.
pub trait PostingsReaderBase {
    type TermState: Clone + fmt::Debug;
    type Postings: PostingIterator;

    /// Whether this reader decodes inlined postings.
    const IS_PULSING: bool = false;

    /// Performs any initialization, such as reading and
    /// verifying the header from the provided terms
    /// dictionary input.
    fn init(&mut self, terms_in: &mut impl DataInput) -> Result<()>;

    /// Return a newly created empty term state.
    fn new_term_state(&self) -> BlockTermState<Self::TermState>;

    /// Actually decode metadata for next term, the mirror of
    /// `PostingsWriterBase::encode_term`.
    fn decode_term(
        &self,
        longs: &[i64],
        input: &mut impl DataInput,
        field_info: &FieldInfo,
        state: &mut BlockTermState<Self::TermState>,
        absolute: bool,
    ) -> Result<()>;

    /// Must fully consume state, since after this call that
    /// term state may be reused.
    ///
    /// `reuse` is a previously returned iterator that may be reset in place
    /// instead of allocating a new one.
    fn postings(
        &self,
        field_info: &FieldInfo,
        state: &BlockTermState<Self::TermState>,
        live_docs: Option<BitsRef>,
        reuse: Option<Self::Postings>,
        flags: u16,
    ) -> Result<Self::Postings>;

    /// Checks consistency of this reader.
    ///
    /// Note that this may be costly in terms of I/O, e.g.
    /// may involve computing a checksum value against large data files.
    fn check_integrity(&self) -> Result<()>;
}

/// Encodes/decodes terms postings for one segment.
pub trait PostingsFormat {
    type Writer: PostingsWriterBase;
    type Reader: PostingsReaderBase;

    /// Opens the postings writer of a new segment.
    fn postings_writer<D: Directory>(&self, state: &SegmentWriteState<D>)
        -> Result<Self::Writer>;

    /// Reads a segment.  NOTE: by the time this call
    /// returns, it must hold open any files it will need to
    /// use; else, those files may be deleted.
    fn postings_reader<'a, D: Directory>(
        &self,
        state: &SegmentReadState<'a, D>,
    ) -> Result<Self::Reader>;

    /// Returns this posting format's name
    fn name(&self) -> &str;
}

/// Whether positions should be decoded for the given request.
pub fn positions_requested(field_info: &FieldInfo, flags: u16) -> bool {
    field_info.index_options.has_positions()
        && PostingIteratorFlags::feature_requested(flags, PostingIteratorFlags::POSITIONS)
}

pub type NestedPulsingPostingsFormat =
    PulsingPostingsFormat<PulsingPostingsFormat<SepPostingsFormat<VIntStreamFactory>>>;

/// Every postings format known by name.
pub enum PostingsFormatEnum {
    Sep(SepPostingsFormat<VIntStreamFactory>),
    SepFixedIntBlock(SepPostingsFormat<FixedIntBlockStreamFactory>),
    Pulsing(PulsingPostingsFormat<SepPostingsFormat<VIntStreamFactory>>),
    NestedPulsing(NestedPulsingPostingsFormat),
}

impl PostingsFormatEnum {
    pub fn with_config(name: &str, config: &PostingsFormatConfig) -> Result<PostingsFormatEnum> {
        config.validate()?;
        let format = match name {
            SEP_FORMAT_NAME => PostingsFormatEnum::Sep(SepPostingsFormat::vint(config)),
            SEP_FIXED_INT_BLOCK_FORMAT_NAME => {
                PostingsFormatEnum::SepFixedIntBlock(SepPostingsFormat::fixed_int_block(config))
            }
            PULSING_FORMAT_NAME => PostingsFormatEnum::Pulsing(PulsingPostingsFormat::new(
                SepPostingsFormat::vint(config),
                config.max_positions,
            )),
            NESTED_PULSING_FORMAT_NAME => {
                PostingsFormatEnum::NestedPulsing(PulsingPostingsFormat::nested(config))
            }
            _ => bail!(IllegalArgument(format!(
                "Invalid postings format: {}",
                name
            ))),
        };
        Ok(format)
    }

    pub fn name(&self) -> &str {
        match self {
            PostingsFormatEnum::Sep(f) => f.name(),
            PostingsFormatEnum::SepFixedIntBlock(f) => f.name(),
            PostingsFormatEnum::Pulsing(f) => f.name(),
            PostingsFormatEnum::NestedPulsing(f) => f.name(),
        }
    }
}

pub const SEP_FORMAT_NAME: &str = "Sep";
pub const SEP_FIXED_INT_BLOCK_FORMAT_NAME: &str = "SepFixedIntBlock";
pub const PULSING_FORMAT_NAME: &str = "Pulsing";
pub const NESTED_PULSING_FORMAT_NAME: &str = "NestedPulsing";

/// Resolves a postings format by name, using the default configuration.
pub fn postings_format_for_name(name: &str) -> Result<PostingsFormatEnum> {
    PostingsFormatEnum::with_config(name, &PostingsFormatConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use error::ErrorKind;

    #[test]
    fn test_postings_format_for_name() {
        for name in &["Sep", "SepFixedIntBlock", "Pulsing", "NestedPulsing"] {
            let format = postings_format_for_name(name).unwrap();
            assert_eq!(format.name(), *name);
        }
        match postings_format_for_name("Lucene50") {
            Err(e) => match *e.kind() {
                ErrorKind::IllegalArgument(_) => {}
                ref k => panic!("unexpected error {:?}", k),
            },
            Ok(_) => panic!("unknown format resolved"),
        }
    }

    #[test]
    fn test_with_config_validates() {
        let config = PostingsFormatConfig {
            skip_interval: 0,
            ..PostingsFormatConfig::default()
        };
        assert!(PostingsFormatEnum::with_config("Sep", &config).is_err());
    }

    #[test]
    fn test_block_term_state_copy_from() {
        let mut a = BlockTermState::new(vec![1i64, 2]);
        let mut b = BlockTermState::new(Vec::new());
        a.doc_freq = 3;
        a.total_term_freq = 7;
        b.copy_from(&a);
        assert_eq!(a, b);
        a.codec.push(3);
        assert_eq!(b.codec, vec![1, 2]);
    }
}
