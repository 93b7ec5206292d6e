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
use core::codec::postings::intblock::{
    IntIndex, IntIndexInput, IntIndexReader, IntReader, IntStreamFactory,
};
use core::codec::postings::sep::{
    SepSkipListReader, SepTermState, SepVersion, DOC_EXTENSION, FREQ_EXTENSION,
    PAYLOAD_EXTENSION, POS_EXTENSION, SEP_CODEC, SKIP_EXTENSION,
};
use core::codec::postings::{positions_requested, BlockTermState, PostingsReaderBase};
use core::codec::segment_infos::SegmentReadState;
use core::index::IndexOptions;
use core::search::{DocIterator, Payload, PostingIterator, NO_MORE_DOCS};
use core::store::directory::Directory;
use core::store::io::{DataInput, IndexInput};
use core::util::{BitsRef, DocId};

use error::ErrorKind::{CorruptIndex, IllegalState};
use error::Result;

use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_READER_ID: AtomicUsize = AtomicUsize::new(0);

/// Concrete class that reads the separate streams postings format.
pub struct SepPostingsReader<F: IntStreamFactory> {
    id: usize,
    version: SepVersion,

    doc_in: F::Input,
    freq_in: Option<F::Input>,
    pos_in: Option<F::Input>,
    payload_in: Option<Box<dyn IndexInput>>,
    skip_in: Box<dyn IndexInput>,

    skip_interval: i32,
    max_skip_levels: i32,
    skip_minimum: i32,
}

impl<F: IntStreamFactory> SepPostingsReader<F> {
    pub fn new<'a, D: Directory>(
        state: &SegmentReadState<'a, D>,
        factory: &F,
    ) -> Result<SepPostingsReader<F>> {
        let dir = state.directory.as_ref();
        let context = state.context;

        let mut skip_in = dir.open_input(&state.file_name(SKIP_EXTENSION), context)?;
        let version = SepVersion::from_i32(codec_util::check_header(
            skip_in.as_mut(),
            SEP_CODEC,
            SepVersion::Start.value(),
            SepVersion::CURRENT.value(),
        )?)?;
        codec_util::retrieve_checksum(skip_in.as_mut())?;

        let doc_in = factory.open_input(dir, &state.file_name(DOC_EXTENSION), context)?;

        let freq_in = if state.field_infos.has_freq {
            Some(factory.open_input(dir, &state.file_name(FREQ_EXTENSION), context)?)
        } else {
            None
        };

        let (pos_in, payload_in) = if state.field_infos.has_prox {
            let pos_in = factory.open_input(dir, &state.file_name(POS_EXTENSION), context)?;
            let mut payload_in = dir.open_input(&state.file_name(PAYLOAD_EXTENSION), context)?;
            let payload_version = codec_util::check_header(
                payload_in.as_mut(),
                SEP_CODEC,
                SepVersion::Start.value(),
                SepVersion::CURRENT.value(),
            )?;
            if payload_version != version.value() {
                bail!(CorruptIndex(format!(
                    "payload file version {} does not match skip file version {}",
                    payload_version,
                    version.value()
                )));
            }
            codec_util::retrieve_checksum(payload_in.as_mut())?;
            (Some(pos_in), Some(payload_in))
        } else {
            (None, None)
        };

        debug!(
            "opened sep postings reader for segment {} with {} streams",
            state.segment_name,
            factory.name()
        );

        Ok(SepPostingsReader {
            id: NEXT_READER_ID.fetch_add(1, Ordering::Relaxed),
            version,
            doc_in,
            freq_in,
            pos_in,
            payload_in,
            skip_in,
            skip_interval: 0,
            max_skip_levels: 0,
            skip_minimum: 0,
        })
    }

    pub fn version(&self) -> SepVersion {
        self.version
    }
}

impl<F: IntStreamFactory> PostingsReaderBase for SepPostingsReader<F> {
    type TermState = SepTermState<F::Index>;
    type Postings = SepPostingIterator<F>;

    fn init(&mut self, terms_in: &mut impl DataInput) -> Result<()> {
        let version = codec_util::check_header(
            terms_in,
            SEP_CODEC,
            SepVersion::Start.value(),
            SepVersion::CURRENT.value(),
        )?;
        if version != self.version.value() {
            bail!(CorruptIndex(format!(
                "terms dict version {} does not match postings version {}",
                version,
                self.version.value()
            )));
        }
        self.skip_interval = terms_in.read_int()?;
        self.max_skip_levels = terms_in.read_int()?;
        self.skip_minimum = terms_in.read_int()?;
        if self.skip_interval < 1 || self.max_skip_levels <= 0 || self.skip_minimum <= 0 {
            bail!(CorruptIndex(format!(
                "invalid skip settings: interval={} levels={} minimum={}",
                self.skip_interval, self.max_skip_levels, self.skip_minimum
            )));
        }
        Ok(())
    }

    fn new_term_state(&self) -> BlockTermState<SepTermState<F::Index>> {
        BlockTermState::new(SepTermState::default())
    }

    fn decode_term(
        &self,
        _longs: &[i64],
        input: &mut impl DataInput,
        field_info: &FieldInfo,
        state: &mut BlockTermState<SepTermState<F::Index>>,
        absolute: bool,
    ) -> Result<()> {
        let options = field_info.index_options;
        let doc_freq = state.doc_freq;
        let term = &mut state.codec;

        term.doc_index.read(input, absolute)?;
        if options.has_freqs() {
            term.freq_index.read(input, absolute)?;
            if options.has_positions() {
                term.pos_index.read(input, absolute)?;
                if field_info.has_store_payloads {
                    if absolute {
                        term.payload_fp = input.read_vlong()?;
                    } else {
                        term.payload_fp += input.read_vlong()?;
                    }
                }
            }
        }

        if doc_freq >= self.skip_minimum {
            if absolute {
                term.skip_fp = input.read_vlong()?;
            } else {
                term.skip_fp += input.read_vlong()?;
            }
        } else if absolute {
            term.skip_fp = 0;
        }
        Ok(())
    }

    fn postings(
        &self,
        field_info: &FieldInfo,
        state: &BlockTermState<SepTermState<F::Index>>,
        live_docs: Option<BitsRef>,
        reuse: Option<SepPostingIterator<F>>,
        flags: u16,
    ) -> Result<SepPostingIterator<F>> {
        let with_positions = positions_requested(field_info, flags);
        let mut iter = match reuse {
            Some(iter) => {
                if iter.can_reuse(self.id, field_info, with_positions) {
                    iter
                } else {
                    SepPostingIterator::new(self, field_info, with_positions)?
                }
            }
            None => SepPostingIterator::new(self, field_info, with_positions)?,
        };
        iter.reset(state, live_docs)?;
        Ok(iter)
    }

    fn check_integrity(&self) -> Result<()> {
        self.doc_in.check_integrity()?;
        if let Some(ref input) = self.freq_in {
            input.check_integrity()?;
        }
        if let Some(ref input) = self.pos_in {
            input.check_integrity()?;
        }
        if let Some(ref input) = self.payload_in {
            codec_util::checksum_entire_file(input.as_ref())?;
        }
        codec_util::checksum_entire_file(self.skip_in.as_ref())?;
        Ok(())
    }
}

/// Iterates the docs of a term, and optionally its positions, payloads and
/// offsets.
///
/// Positions are decoded lazily: docs consumed with `next` only add their
/// freq to a pending count which `next_position` skips over first. Payload
/// bytes are skipped the same way and only read when `payload` is called.
pub struct SepPostingIterator<F: IntStreamFactory> {
    reader_id: usize,
    index_options: IndexOptions,
    store_payloads: bool,
    // skip entries carry payload data whenever the field stores payloads
    field_stores_payloads: bool,
    store_offsets: bool,
    with_positions: bool,

    live_docs: Option<BitsRef>,

    doc_reader: IntReader<F>,
    freq_reader: Option<IntReader<F>>,
    pos_reader: Option<IntReader<F>>,
    payload_in: Option<Box<dyn IndexInput>>,
    skip_in: Box<dyn IndexInput>,
    skipper: Option<SepSkipListReader<F::Index>>,

    skip_interval: i32,
    max_skip_levels: i32,
    skip_minimum: i32,

    // term start, bases of the skip list
    doc_index: F::Index,
    freq_index: F::Index,
    pos_index: F::Index,
    payload_fp: i64,
    skip_fp: i64,
    doc_freq: i32,

    count: i32,
    doc: DocId,
    accum: DocId,
    freq: i32,
    skipped: bool,

    pending_pos_count: i32,
    position: i32,
    payload_length: i32,
    pending_payload_bytes: i64,
    payload_pending: bool,
    pos_seek_pending: bool,
    start_offset: i32,
    offset_length: i32,
    payload: Payload,
}

impl<F: IntStreamFactory> SepPostingIterator<F> {
    fn new(
        reader: &SepPostingsReader<F>,
        field_info: &FieldInfo,
        with_positions: bool,
    ) -> Result<SepPostingIterator<F>> {
        let options = field_info.index_options;
        let freq_reader = if options.has_freqs() {
            match reader.freq_in {
                Some(ref input) => Some(input.reader()?),
                None => bail!(IllegalState(format!(
                    "field '{}' has freqs but the segment has no freq stream",
                    field_info.name
                ))),
            }
        } else {
            None
        };
        let (pos_reader, payload_in) = if with_positions {
            match (&reader.pos_in, &reader.payload_in) {
                (Some(pos_in), Some(payload_in)) => (
                    Some(pos_in.reader()?),
                    Some(IndexInput::clone(payload_in.as_ref())?),
                ),
                _ => bail!(IllegalState(format!(
                    "field '{}' has positions but the segment has no position stream",
                    field_info.name
                ))),
            }
        } else {
            (None, None)
        };

        Ok(SepPostingIterator {
            reader_id: reader.id,
            index_options: options,
            store_payloads: with_positions && field_info.has_store_payloads,
            field_stores_payloads: field_info.has_store_payloads,
            store_offsets: with_positions
                && options.has_offsets()
                && reader.version.supports_offsets(),
            with_positions,
            live_docs: None,
            doc_reader: reader.doc_in.reader()?,
            freq_reader,
            pos_reader,
            payload_in,
            skip_in: IndexInput::clone(reader.skip_in.as_ref())?,
            skipper: None,
            skip_interval: reader.skip_interval,
            max_skip_levels: reader.max_skip_levels,
            skip_minimum: reader.skip_minimum,
            doc_index: F::Index::default(),
            freq_index: F::Index::default(),
            pos_index: F::Index::default(),
            payload_fp: 0,
            skip_fp: 0,
            doc_freq: 0,
            count: 0,
            doc: -1,
            accum: 0,
            freq: 1,
            skipped: false,
            pending_pos_count: 0,
            position: 0,
            payload_length: 0,
            pending_payload_bytes: 0,
            payload_pending: false,
            pos_seek_pending: false,
            start_offset: 0,
            offset_length: 0,
            payload: Payload::new(),
        })
    }

    fn can_reuse(&self, reader_id: usize, field_info: &FieldInfo, with_positions: bool) -> bool {
        self.reader_id == reader_id
            && self.index_options == field_info.index_options
            && self.with_positions == with_positions
            && self.field_stores_payloads == field_info.has_store_payloads
    }

    fn reset(
        &mut self,
        state: &BlockTermState<SepTermState<F::Index>>,
        live_docs: Option<BitsRef>,
    ) -> Result<()> {
        let term = &state.codec;
        self.live_docs = live_docs;

        self.doc_index.copy_from(&term.doc_index, false);
        self.doc_reader.seek(&self.doc_index)?;
        if let Some(ref mut reader) = self.freq_reader {
            self.freq_index.copy_from(&term.freq_index, false);
            reader.seek(&self.freq_index)?;
        }
        if self.with_positions {
            self.pos_index.copy_from(&term.pos_index, false);
            self.pos_seek_pending = true;
        }

        self.payload_fp = term.payload_fp;
        self.skip_fp = term.skip_fp;
        self.doc_freq = state.doc_freq;

        self.count = 0;
        self.doc = -1;
        self.accum = 0;
        self.freq = 1;
        self.skipped = false;

        self.pending_pos_count = 0;
        self.position = 0;
        self.payload_length = 0;
        self.pending_payload_bytes = 0;
        self.payload_pending = false;
        self.start_offset = 0;
        self.offset_length = 0;
        Ok(())
    }

    fn is_live(&self, doc: DocId) -> Result<bool> {
        match self.live_docs {
            Some(ref bits) => bits.get(doc as usize),
            None => Ok(true),
        }
    }

    fn pos_reader(&mut self) -> Result<&mut IntReader<F>> {
        match self.pos_reader {
            Some(ref mut reader) => Ok(reader),
            None => bail!(IllegalState("positions were not requested".into())),
        }
    }
}

impl<F: IntStreamFactory> DocIterator for SepPostingIterator<F> {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next(&mut self) -> Result<DocId> {
        loop {
            if self.count == self.doc_freq {
                self.doc = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }
            self.count += 1;

            self.accum += self.doc_reader.next()?;
            if let Some(ref mut reader) = self.freq_reader {
                self.freq = reader.next()?;
            }
            if self.with_positions {
                self.pending_pos_count += self.freq;
            }

            if self.is_live(self.accum)? {
                break;
            }
        }

        self.position = 0;
        self.start_offset = 0;
        self.payload_pending = false;
        self.doc = self.accum;
        Ok(self.doc)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        if target - self.skip_interval >= self.doc && self.doc_freq >= self.skip_minimum {
            // there are enough docs in the posting to have skip data, and the
            // target is far enough ahead to use it
            if self.skipper.is_none() {
                let skip_in = IndexInput::clone(self.skip_in.as_ref())?;
                self.skipper = Some(SepSkipListReader::new(
                    skip_in,
                    self.max_skip_levels as usize,
                    self.skip_interval as u32,
                ));
            }

            if let Some(ref mut skipper) = self.skipper {
                if !self.skipped {
                    skipper.init(
                        self.skip_fp,
                        &self.doc_index,
                        &self.freq_index,
                        &self.pos_index,
                        self.payload_fp,
                        self.doc_freq,
                        self.index_options,
                        self.field_stores_payloads,
                    )?;
                    self.skipped = true;
                }

                let new_count = skipper.skip_to(target)?;
                if new_count > self.count {
                    // skipper moved
                    if let Some(ref mut reader) = self.freq_reader {
                        reader.seek(skipper.freq_index())?;
                    }
                    self.doc_reader.seek(skipper.doc_index())?;
                    if self.with_positions {
                        self.pos_index.copy_from(skipper.pos_index(), false);
                        self.pos_seek_pending = true;
                        self.payload_fp = skipper.payload_pointer();
                        self.payload_length = skipper.payload_length();
                        self.pending_pos_count = 0;
                        self.pending_payload_bytes = 0;
                        self.payload_pending = false;
                    }
                    self.count = new_count;
                    self.accum = skipper.doc();
                    self.doc = self.accum;
                }
            }
        }

        // now scan
        loop {
            let doc = self.next()?;
            if doc >= target {
                return Ok(doc);
            }
        }
    }

    fn cost(&self) -> usize {
        self.doc_freq as usize
    }
}

impl<F: IntStreamFactory> PostingIterator for SepPostingIterator<F> {
    fn freq(&self) -> Result<i32> {
        Ok(self.freq)
    }

    fn next_position(&mut self) -> Result<i32> {
        if !self.with_positions {
            return Ok(-1);
        }

        if self.pos_seek_pending {
            let pos_index = self.pos_index.clone();
            self.pos_reader()?.seek(&pos_index)?;
            if let Some(ref mut input) = self.payload_in {
                input.seek(self.payload_fp)?;
            }
            self.pos_seek_pending = false;
        }

        let store_payloads = self.store_payloads;
        let store_offsets = self.store_offsets;

        // scan over any docs that were iterated without their positions
        while self.pending_pos_count > self.freq {
            let code = self.pos_reader()?.next()?;
            if store_payloads && (code & 1) != 0 {
                self.payload_length = self.pos_reader()?.next()?;
            }
            if store_offsets && (self.pos_reader()?.next()? & 1) != 0 {
                self.pos_reader()?.next()?;
            }
            self.pending_pos_count -= 1;
            self.pending_payload_bytes += i64::from(self.payload_length);
        }

        let code = self.pos_reader()?.next()?;
        if store_payloads {
            if (code & 1) != 0 {
                self.payload_length = self.pos_reader()?.next()?;
            }
            self.position += ((code as u32) >> 1) as i32;
            self.pending_payload_bytes += i64::from(self.payload_length);
            self.payload_pending = self.payload_length > 0;
        } else {
            self.position += code;
        }

        if store_offsets {
            let offset_code = self.pos_reader()?.next()?;
            if (offset_code & 1) != 0 {
                self.offset_length = self.pos_reader()?.next()?;
            }
            self.start_offset += ((offset_code as u32) >> 1) as i32;
        }

        self.pending_pos_count -= 1;
        Ok(self.position)
    }

    fn start_offset(&self) -> Result<i32> {
        if self.store_offsets {
            Ok(self.start_offset)
        } else {
            Ok(-1)
        }
    }

    fn end_offset(&self) -> Result<i32> {
        if self.store_offsets {
            Ok(self.start_offset + self.offset_length)
        } else {
            Ok(-1)
        }
    }

    fn payload(&mut self) -> Result<Payload> {
        if !self.payload_pending {
            return Ok(Payload::new());
        }
        if self.pending_payload_bytes == 0 {
            // already loaded for this position
            return Ok(self.payload.clone());
        }
        debug_assert!(self.pending_payload_bytes >= i64::from(self.payload_length));

        let length = self.payload_length as usize;
        let input = match self.payload_in {
            Some(ref mut input) => input,
            None => bail!(IllegalState("payloads were not requested".into())),
        };
        if self.pending_payload_bytes > i64::from(self.payload_length) {
            let fp = input.file_pointer();
            input.seek(fp + self.pending_payload_bytes - i64::from(self.payload_length))?;
        }
        self.payload.resize(length, 0);
        input.read_bytes(&mut self.payload, 0, length)?;
        self.pending_payload_bytes = 0;
        Ok(self.payload.clone())
    }
}
