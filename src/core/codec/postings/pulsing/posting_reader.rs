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
use core::codec::field_infos::FieldInfo;
use core::codec::postings::pulsing::{
    PulsingTermState, PulsingVersion, PULSING_CODEC, SUMMARY_EXTENSION,
};
use core::codec::postings::{positions_requested, BlockTermState, PostingsReaderBase};
use core::codec::segment_infos::SegmentReadState;
use core::index::IndexOptions;
use core::search::{DocIterator, Payload, PostingIterator, NO_MORE_DOCS};
use core::store::directory::Directory;
use core::store::io::{ByteArrayDataInput, DataInput, IndexInput};
use core::util::{BitsRef, DocId};

use error::ErrorKind::{CorruptIndex, IllegalState};
use error::Result;

use std::collections::HashMap;
use std::mem;

/// Concrete class that reads the pulsing format.
///
/// Inlined terms are decoded from the blob read into the term state, every
/// other term is delegated to the wrapped reader.
pub struct PulsingPostingsReader<R: PostingsReaderBase> {
    wrapped: R,
    version: PulsingVersion,
    max_positions: i32,
    summary_in: Option<Box<dyn IndexInput>>,
    // field number -> longs size of the wrapped reader
    fields: Option<HashMap<u32, usize>>,
}

impl<R: PostingsReaderBase> PulsingPostingsReader<R> {
    pub fn new<'a, D: Directory>(
        state: &SegmentReadState<'a, D>,
        wrapped: R,
    ) -> Result<PulsingPostingsReader<R>> {
        let summary_in = if R::IS_PULSING {
            None
        } else {
            let name = state.file_name(SUMMARY_EXTENSION);
            if state.directory.file_exists(&name)? {
                debug!("opening pulsing summary {}", name);
                Some(state.directory.open_input(&name, state.context)?)
            } else {
                None
            }
        };

        Ok(PulsingPostingsReader {
            wrapped,
            version: PulsingVersion::CURRENT,
            max_positions: 0,
            summary_in,
            fields: None,
        })
    }

    pub fn version(&self) -> PulsingVersion {
        self.version
    }

    pub fn max_positions(&self) -> i32 {
        self.max_positions
    }

    pub fn wrapped(&self) -> &R {
        &self.wrapped
    }

    fn read_summary(&mut self) -> Result<()> {
        let input = match self.summary_in {
            Some(ref mut input) => input,
            None => bail!(CorruptIndex(format!(
                "{} version {} requires a summary file",
                PULSING_CODEC,
                self.version.value()
            ))),
        };
        input.seek(0)?;
        codec_util::check_header(
            input.as_mut(),
            PULSING_CODEC,
            PulsingVersion::MetaArray.value(),
            PulsingVersion::CURRENT.value(),
        )?;
        let num_fields = input.read_vint()?;
        if num_fields < 0 {
            bail!(CorruptIndex(format!(
                "invalid number of fields in summary: {}",
                num_fields
            )));
        }
        let mut fields = HashMap::with_capacity(num_fields as usize);
        for _ in 0..num_fields {
            let number = input.read_vint()?;
            let longs_size = input.read_vint()?;
            if number < 0 || longs_size < 0 {
                bail!(CorruptIndex(format!(
                    "invalid summary entry: field={} longs={}",
                    number, longs_size
                )));
            }
            fields.insert(number as u32, longs_size as usize);
        }
        codec_util::retrieve_checksum(input.as_mut())?;
        self.fields = Some(fields);
        Ok(())
    }

    fn longs_size(&self, field_info: &FieldInfo) -> Result<usize> {
        match self.fields {
            Some(ref fields) => match fields.get(&field_info.number) {
                Some(size) => Ok(*size),
                None => bail!(CorruptIndex(format!(
                    "field '{}' ({}) is missing from the pulsing summary",
                    field_info.name, field_info.number
                ))),
            },
            None => Ok(0),
        }
    }
}

impl<R: PostingsReaderBase> PostingsReaderBase for PulsingPostingsReader<R> {
    type TermState = PulsingTermState<R::TermState>;
    type Postings = PulsingPostingIterator<R::Postings>;

    const IS_PULSING: bool = true;

    fn init(&mut self, terms_in: &mut impl DataInput) -> Result<()> {
        self.version = PulsingVersion::from_i32(codec_util::check_header(
            terms_in,
            PULSING_CODEC,
            PulsingVersion::Start.value(),
            PulsingVersion::CURRENT.value(),
        )?)?;
        self.max_positions = terms_in.read_vint()?;
        if self.max_positions <= 0 {
            bail!(CorruptIndex(format!(
                "invalid max positions: {}",
                self.max_positions
            )));
        }
        self.wrapped.init(terms_in)?;
        if self.version.has_summary() && !R::IS_PULSING {
            self.read_summary()?;
        }
        Ok(())
    }

    fn new_term_state(&self) -> BlockTermState<PulsingTermState<R::TermState>> {
        BlockTermState::new(PulsingTermState::new(self.wrapped.new_term_state()))
    }

    fn decode_term(
        &self,
        _longs: &[i64],
        input: &mut impl DataInput,
        field_info: &FieldInfo,
        state: &mut BlockTermState<PulsingTermState<R::TermState>>,
        absolute: bool,
    ) -> Result<()> {
        let doc_freq = state.doc_freq;
        let total_term_freq = state.total_term_freq;
        let term = &mut state.codec;
        term.absolute = term.absolute || absolute;

        let count = if field_info.index_options.has_freqs() {
            total_term_freq
        } else {
            i64::from(doc_freq)
        };
        if count <= i64::from(self.max_positions) {
            // inlined into the terms dict, only decoded when postings are pulled
            let length = input.read_vint()?;
            if length < 0 {
                bail!(CorruptIndex(format!("invalid inline length: {}", length)));
            }
            let mut bytes = term.postings.take().unwrap_or_default();
            bytes.resize(length as usize, 0);
            input.read_bytes(&mut bytes, 0, length as usize)?;
            term.postings = Some(bytes);
        } else {
            let longs_size = self.longs_size(field_info)?;
            term.longs.resize(longs_size, 0);
            for long in term.longs.iter_mut() {
                *long = input.read_vlong()?;
            }
            term.postings = None;
            term.wrapped.doc_freq = doc_freq;
            term.wrapped.total_term_freq = total_term_freq;
            self.wrapped.decode_term(
                &term.longs,
                input,
                field_info,
                &mut term.wrapped,
                term.absolute,
            )?;
            term.absolute = false;
        }
        Ok(())
    }

    fn postings(
        &self,
        field_info: &FieldInfo,
        state: &BlockTermState<PulsingTermState<R::TermState>>,
        live_docs: Option<BitsRef>,
        reuse: Option<PulsingPostingIterator<R::Postings>>,
        flags: u16,
    ) -> Result<PulsingPostingIterator<R::Postings>> {
        match state.codec.postings {
            Some(ref bytes) => {
                let (mut iter, other) = match reuse {
                    Some(PulsingPostingIterator::Inline { iter, other }) => (iter, other),
                    Some(PulsingPostingIterator::Wrapped { iter, other }) => {
                        (other.unwrap_or_default(), Some(iter))
                    }
                    None => (PulsingInlineIterator::default(), None),
                };
                iter.reset(field_info, bytes, state.doc_freq, live_docs, flags);
                Ok(PulsingPostingIterator::Inline { iter, other })
            }
            None => {
                let (reuse, other) = match reuse {
                    Some(PulsingPostingIterator::Inline { iter, other }) => (other, Some(iter)),
                    Some(PulsingPostingIterator::Wrapped { iter, other }) => (Some(iter), other),
                    None => (None, None),
                };
                let iter = self.wrapped.postings(
                    field_info,
                    &state.codec.wrapped,
                    live_docs,
                    reuse,
                    flags,
                )?;
                Ok(PulsingPostingIterator::Wrapped { iter, other })
            }
        }
    }

    fn check_integrity(&self) -> Result<()> {
        self.wrapped.check_integrity()?;
        if let Some(ref input) = self.summary_in {
            codec_util::checksum_entire_file(input.as_ref())?;
        }
        Ok(())
    }
}

/// Postings of a pulsing term: either decoded from its inlined blob or
/// produced by the wrapped reader.
///
/// `other` keeps the iterator of the other kind around, so handing the value
/// back as `reuse` recycles both.
pub enum PulsingPostingIterator<P: PostingIterator> {
    Inline {
        iter: PulsingInlineIterator,
        other: Option<P>,
    },
    Wrapped {
        iter: P,
        other: Option<PulsingInlineIterator>,
    },
}

impl<P: PostingIterator> PulsingPostingIterator<P> {
    pub fn is_inline(&self) -> bool {
        match self {
            PulsingPostingIterator::Inline { .. } => true,
            PulsingPostingIterator::Wrapped { .. } => false,
        }
    }
}

impl<P: PostingIterator> DocIterator for PulsingPostingIterator<P> {
    fn doc_id(&self) -> DocId {
        match self {
            PulsingPostingIterator::Inline { iter, .. } => iter.doc_id(),
            PulsingPostingIterator::Wrapped { iter, .. } => iter.doc_id(),
        }
    }

    fn next(&mut self) -> Result<DocId> {
        match self {
            PulsingPostingIterator::Inline { iter, .. } => iter.next(),
            PulsingPostingIterator::Wrapped { iter, .. } => iter.next(),
        }
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        match self {
            PulsingPostingIterator::Inline { iter, .. } => iter.advance(target),
            PulsingPostingIterator::Wrapped { iter, .. } => iter.advance(target),
        }
    }

    fn cost(&self) -> usize {
        match self {
            PulsingPostingIterator::Inline { iter, .. } => iter.cost(),
            PulsingPostingIterator::Wrapped { iter, .. } => iter.cost(),
        }
    }
}

impl<P: PostingIterator> PostingIterator for PulsingPostingIterator<P> {
    fn freq(&self) -> Result<i32> {
        match self {
            PulsingPostingIterator::Inline { iter, .. } => iter.freq(),
            PulsingPostingIterator::Wrapped { iter, .. } => iter.freq(),
        }
    }

    fn next_position(&mut self) -> Result<i32> {
        match self {
            PulsingPostingIterator::Inline { iter, .. } => iter.next_position(),
            PulsingPostingIterator::Wrapped { iter, .. } => iter.next_position(),
        }
    }

    fn start_offset(&self) -> Result<i32> {
        match self {
            PulsingPostingIterator::Inline { iter, .. } => iter.start_offset(),
            PulsingPostingIterator::Wrapped { iter, .. } => iter.start_offset(),
        }
    }

    fn end_offset(&self) -> Result<i32> {
        match self {
            PulsingPostingIterator::Inline { iter, .. } => iter.end_offset(),
            PulsingPostingIterator::Wrapped { iter, .. } => iter.end_offset(),
        }
    }

    fn payload(&mut self) -> Result<Payload> {
        match self {
            PulsingPostingIterator::Inline { iter, .. } => iter.payload(),
            PulsingPostingIterator::Wrapped { iter, .. } => iter.payload(),
        }
    }
}

/// Decodes the inlined postings blob of a term.
///
/// Without positions requested, positions of every doc are skipped right
/// after its freq. Otherwise they are decoded on demand, and whatever the
/// caller left unread is skipped before the next doc.
pub struct PulsingInlineIterator {
    postings: ByteArrayDataInput<Vec<u8>>,
    index_options: IndexOptions,
    store_payloads: bool,
    store_offsets: bool,
    with_positions: bool,
    live_docs: Option<BitsRef>,
    doc_freq: i32,

    doc: DocId,
    accum: DocId,
    freq: i32,

    pos_pending: i32,
    position: i32,
    payload_length: i32,
    payload_retrieved: bool,
    start_offset: i32,
    offset_length: i32,
    payload: Payload,
}

impl Default for PulsingInlineIterator {
    fn default() -> Self {
        PulsingInlineIterator {
            postings: ByteArrayDataInput::new(Vec::new()),
            index_options: IndexOptions::Docs,
            store_payloads: false,
            store_offsets: false,
            with_positions: false,
            live_docs: None,
            doc_freq: 0,
            doc: -1,
            accum: 0,
            freq: 1,
            pos_pending: 0,
            position: 0,
            payload_length: 0,
            payload_retrieved: false,
            start_offset: -1,
            offset_length: 0,
            payload: Payload::new(),
        }
    }
}

impl PulsingInlineIterator {
    fn reset(
        &mut self,
        field_info: &FieldInfo,
        bytes: &[u8],
        doc_freq: i32,
        live_docs: Option<BitsRef>,
        flags: u16,
    ) {
        let mut buf = mem::replace(self.postings.bytes_mut(), Vec::new());
        buf.clear();
        buf.extend_from_slice(bytes);
        self.postings.reset(buf);

        self.index_options = field_info.index_options;
        self.store_payloads = field_info.has_store_payloads;
        self.store_offsets = field_info.index_options.has_offsets();
        self.with_positions = positions_requested(field_info, flags);
        self.live_docs = live_docs;
        self.doc_freq = doc_freq;

        self.doc = -1;
        self.accum = 0;
        self.freq = 1;
        self.pos_pending = 0;
        self.position = 0;
        self.payload_length = 0;
        self.payload_retrieved = false;
        self.start_offset = -1;
        self.offset_length = 0;
    }

    fn is_live(&self, doc: DocId) -> Result<bool> {
        match self.live_docs {
            Some(ref bits) => bits.get(doc as usize),
            None => Ok(true),
        }
    }

    // consumes the positions of a doc whose positions were not requested
    fn skip_doc_positions(&mut self, freq: i32) -> Result<()> {
        for _ in 0..freq {
            let code = self.postings.read_vint()?;
            if self.store_payloads && (code & 1) != 0 {
                self.payload_length = self.postings.read_vint()?;
            }
            if self.store_offsets && (self.postings.read_vint()? & 1) != 0 {
                self.postings.read_vint()?;
            }
            if self.store_payloads && self.payload_length != 0 {
                self.postings.skip_bytes(self.payload_length as usize)?;
            }
        }
        Ok(())
    }

    // consumes whatever the caller left unread of the current doc
    fn skip_pending_positions(&mut self) -> Result<()> {
        while self.pos_pending != 0 {
            self.next_position()?;
        }
        if self.store_payloads && !self.payload_retrieved {
            self.postings.skip_bytes(self.payload_length as usize)?;
            self.payload_retrieved = true;
        }
        // no position of the next doc has been read yet
        self.payload.clear();
        Ok(())
    }
}

impl DocIterator for PulsingInlineIterator {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next(&mut self) -> Result<DocId> {
        loop {
            if self.with_positions {
                self.skip_pending_positions()?;
            }
            if self.postings.eof() {
                self.doc = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }

            let code = self.postings.read_vint()?;
            if !self.index_options.has_freqs() {
                self.accum += code;
            } else {
                self.accum += ((code as u32) >> 1) as i32;
                self.freq = if (code & 1) != 0 {
                    1
                } else {
                    self.postings.read_vint()?
                };
                if self.index_options.has_positions() {
                    if self.with_positions {
                        self.pos_pending = self.freq;
                        self.start_offset = if self.store_offsets { 0 } else { -1 };
                    } else {
                        let freq = self.freq;
                        self.skip_doc_positions(freq)?;
                    }
                }
            }

            if self.is_live(self.accum)? {
                self.position = 0;
                self.doc = self.accum;
                return Ok(self.doc);
            }
        }
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.slow_advance(target)
    }

    fn cost(&self) -> usize {
        self.doc_freq as usize
    }
}

impl PostingIterator for PulsingInlineIterator {
    fn freq(&self) -> Result<i32> {
        Ok(self.freq)
    }

    fn next_position(&mut self) -> Result<i32> {
        if !self.with_positions {
            return Ok(-1);
        }
        if self.pos_pending <= 0 {
            bail!(IllegalState(format!(
                "all {} positions of doc {} were read",
                self.freq, self.doc
            )));
        }
        self.pos_pending -= 1;

        if self.store_payloads {
            if !self.payload_retrieved {
                self.postings.skip_bytes(self.payload_length as usize)?;
            }
            let code = self.postings.read_vint()?;
            if (code & 1) != 0 {
                self.payload_length = self.postings.read_vint()?;
            }
            self.position += ((code as u32) >> 1) as i32;
            self.payload_retrieved = false;
        } else {
            self.position += self.postings.read_vint()?;
        }

        if self.store_offsets {
            let offset_code = self.postings.read_vint()?;
            if (offset_code & 1) != 0 {
                self.offset_length = self.postings.read_vint()?;
            }
            self.start_offset += ((offset_code as u32) >> 1) as i32;
        }

        Ok(self.position)
    }

    fn start_offset(&self) -> Result<i32> {
        if self.with_positions && self.store_offsets {
            Ok(self.start_offset)
        } else {
            Ok(-1)
        }
    }

    fn end_offset(&self) -> Result<i32> {
        if self.with_positions && self.store_offsets {
            Ok(self.start_offset + self.offset_length)
        } else {
            Ok(-1)
        }
    }

    fn payload(&mut self) -> Result<Payload> {
        if self.payload_retrieved {
            return Ok(self.payload.clone());
        }
        if self.with_positions && self.store_payloads && self.payload_length > 0 {
            let length = self.payload_length as usize;
            self.payload.resize(length, 0);
            self.postings.read_bytes(&mut self.payload, 0, length)?;
            self.payload_retrieved = true;
            Ok(self.payload.clone())
        } else {
            Ok(Payload::new())
        }
    }
}
